//! Fixture builders for unit tests: a small three-color card corpus in the
//! same annotated assembly form as the real templates.

use crate::data::GameData;

pub(crate) struct Attack {
    name: String,
    energy: String,
    damage: u32,
}

impl Attack {
    pub(crate) fn damage(name: &str, color: &str, count: u32, damage: u32) -> Self {
        Attack {
            name: name.to_string(),
            energy: format!("{}, {}", color, count),
            damage,
        }
    }

    pub(crate) fn effect(name: &str, color: &str, count: u32) -> Self {
        Self::damage(name, color, count, 0)
    }

    pub(crate) fn raw_energy(name: &str, energy: &str, damage: u32) -> Self {
        Attack {
            name: name.to_string(),
            energy: energy.to_string(),
            damage,
        }
    }

    pub(crate) fn empty() -> Self {
        Attack {
            name: "NONE".to_string(),
            energy: "0".to_string(),
            damage: 0,
        }
    }

    fn block(&self) -> String {
        let (desc, category, effect, anim) = if self.name == "NONE" {
            ("NONE".to_string(), "NONE", "NONE".to_string(), "ATK_ANIM_NONE")
        } else {
            (
                format!("{}Description", self.name),
                "DAMAGE_NORMAL",
                format!("{}EffectCommands", self.name),
                "ATK_ANIM_HIT",
            )
        };
        let name = if self.name == "NONE" {
            "NONE".to_string()
        } else {
            format!("{}Name", self.name)
        };
        format!(
            "\tenergy {} ; energies\n\
             \ttx {} ; name\n\
             \ttx {} ; description\n\
             \tdw NONE ; description (cont)\n\
             \tdb {} ; damage\n\
             \tdb {} ; category\n\
             \tdw {} ; effect commands\n\
             \tdb NONE ; flags 1\n\
             \tdb NONE ; flags 2\n\
             \tdb NONE ; flags 3\n\
             \tdb 0\n\
             \tdb {} ; animation\n",
            self.energy, name, desc, self.damage, category, effect, anim
        )
    }
}

pub(crate) fn pokemon_record(
    label: &str,
    name: &str,
    constant: &str,
    color: &str,
    stage: &str,
    pre_evo: Option<&str>,
    attacks: &[Attack],
) -> String {
    let empty = Attack::empty();
    let first = attacks.first().unwrap_or(&empty);
    let second = attacks.get(1).unwrap_or(&empty);
    format!(
        "{label}: ; CARD_NAME\n\
         \tdb TYPE_PKMN_{color} ; type\n\
         \tgfx {label}Gfx ; gfx\n\
         \ttx {name} ; name\n\
         \tdb CIRCLE ; RANDOMIZE_RARITY\n\
         \tdb COLOSSEUM | NONE ; RANDOMIZE_SET\n\
         \tdb {constant} ; id\n\
         \tdb 50 ; hp\n\
         \tdb {stage} ; stage\n\
         \ttx {pre} ; pre-evo name\n\
         \n\
         \t; attack 1\n\
         {first}\
         \n\
         \t; attack 2\n\
         {second}\
         \n\
         \tdb 1 ; retreat cost\n\
         \tdb WR_WATER ; weakness\n\
         \tdb NONE ; resistance\n\
         \ttx {name}Category ; category\n\
         \tdb 1 ; pokedex number\n\
         \tdb 0\n\
         \tdb 10 ; level\n\
         \tdb 0\n\
         \n",
        label = label,
        color = color,
        name = name,
        constant = constant,
        stage = stage,
        pre = pre_evo.unwrap_or("NONE"),
        first = first.block(),
        second = second.block(),
    )
}

pub(crate) fn trainer_record(label: &str, name: &str, constant: &str) -> String {
    format!(
        "{label}: ; CARD_NAME\n\
         \tdb TYPE_TRAINER ; type\n\
         \tgfx {label}Gfx ; gfx\n\
         \ttx {name} ; name\n\
         \tdb CIRCLE ; RANDOMIZE_RARITY\n\
         \tdb COLOSSEUM | NONE ; RANDOMIZE_SET\n\
         \tdb {constant} ; id\n\
         \tdw {label}EffectCommands ; effect commands\n\
         \n",
        label = label,
        name = name,
        constant = constant,
    )
}

pub(crate) fn energy_record(label: &str, name: &str, constant: &str, color: &str) -> String {
    let type_token = if color == "COLORLESS" {
        "TYPE_ENERGY_DOUBLE_COLORLESS".to_string()
    } else {
        format!("TYPE_ENERGY_{}", color)
    };
    format!(
        "{label}: ; CARD_NAME\n\
         \tdb {type_token} ; type\n\
         \tgfx {label}Gfx ; gfx\n\
         \ttx {name} ; name\n\
         \tdb CIRCLE ; RANDOMIZE_RARITY\n\
         \tdb COLOSSEUM | NONE ; RANDOMIZE_SET\n\
         \tdb {constant} ; id\n\
         \n",
        label = label,
        type_token = type_token,
        name = name,
        constant = constant,
    )
}

/// One chain of three, one chain of two and one lone Basic per color, each
/// Pokémon carrying a damage and a non-damage attack.
pub(crate) fn sample_corpus() -> String {
    const LINES: [(&str, [&str; 6]); 3] = [
        ("GRASS", ["Bulbasaur", "Ivysaur", "Venusaur", "Oddish", "Gloom", "Tangela"]),
        ("FIRE", ["Charmander", "Charmeleon", "Charizard", "Vulpix", "Ninetales", "Magmar"]),
        ("WATER", ["Squirtle", "Wartortle", "Blastoise", "Psyduck", "Golduck", "Lapras"]),
    ];

    let mut corpus = String::new();
    for (color, [b, s1, s2, b2, s12, lone]) in LINES {
        let chain: [(&str, &str, Option<&str>, u32); 6] = [
            (b, "BASIC", None, 1),
            (s1, "STAGE1", Some(b), 2),
            (s2, "STAGE2", Some(s1), 3),
            (b2, "BASIC", None, 1),
            (s12, "STAGE1", Some(b2), 2),
            (lone, "BASIC", None, 2),
        ];
        for (mon, stage, pre, cost) in chain {
            let pre_name = pre.map(|p| format!("{}Name", p));
            corpus.push_str(&pokemon_record(
                &format!("{}Card", mon),
                &format!("{}Name", mon),
                &mon.to_ascii_uppercase(),
                color,
                stage,
                pre_name.as_deref(),
                &[
                    Attack::damage(&format!("{}Strike", mon), color, cost, 10 * (cost + 1)),
                    Attack::effect(&format!("{}Growl", mon), "COLORLESS", cost),
                ],
            ));
        }
    }

    for (label, constant) in [
        ("Potion", "POTION"),
        ("Switch", "SWITCH"),
        ("Bill", "BILL"),
        ("ProfessorOak", "PROFESSOR_OAK"),
        ("EnergyRemoval", "ENERGY_REMOVAL"),
        ("MysteriousFossil", "MYSTERIOUS_FOSSIL"),
    ] {
        corpus.push_str(&trainer_record(
            &format!("{}Card", label),
            &format!("{}Name", label),
            constant,
        ));
    }

    for (label, constant, color) in [
        ("GrassEnergy", "GRASS_ENERGY", "GRASS"),
        ("FireEnergy", "FIRE_ENERGY", "FIRE"),
        ("WaterEnergy", "WATER_ENERGY", "WATER"),
        ("DoubleColorlessEnergy", "DOUBLE_COLORLESS_ENERGY", "COLORLESS"),
    ] {
        corpus.push_str(&energy_record(
            &format!("{}Card", label),
            &format!("{}Name", label),
            constant,
            color,
        ));
    }

    corpus
}

pub(crate) const SAMPLE_DATA_JSON: &str = r#"{
    "sets": ["COLOSSEUM", "EVOLUTION", "MYSTERY", "LABORATORY"],
    "decks": ["SAMS_PRACTICE_DECK_ID", "LIGHTNING_AND_FIRE_DECK_ID", "WATERFRONT_POKEMON_DECK_ID"],
    "music": ["MUSIC_DUEL_THEME_1", "MUSIC_DUEL_THEME_2", "MUSIC_DUEL_THEME_3"],
    "packs": ["COLOSSEUM_NEUTRAL", "EVOLUTION_FIRE", "MYSTERY_WATER", "LABORATORY_GRASS"],
    "colors": ["GRASS", "FIRE", "WATER"],
    "energies": {
        "GRASS": "GrassEnergyCard",
        "FIRE": "FireEnergyCard",
        "WATER": "WaterEnergyCard"
    },
    "npc_duels": {
        "Sam": { "id": 1, "prize": 2, "deck_id": "SAMS_PRACTICE_DECK_ID", "music_id": "MUSIC_DUEL_THEME_1" },
        "Aaron": { "id": 2, "prize": 4, "deck_id": "LIGHTNING_AND_FIRE_DECK_ID", "music_id": "MUSIC_DUEL_THEME_2" }
    },
    "npc_boosters": {
        "Sam": { "id": 1, "packs": ["COLOSSEUM_NEUTRAL"] },
        "Aaron": { "id": 2, "packs": ["EVOLUTION_FIRE", "MYSTERY_WATER", "LABORATORY_GRASS", "COLOSSEUM_NEUTRAL"] }
    }
}"#;

pub(crate) const SAMPLE_NPC_NAMES_JSON: &str =
    r#"["Ash", "Misty", "Brock", "Gary", "Erika", "Sabrina", "Blaine", "Giovanni"]"#;

pub(crate) fn sample_data() -> GameData {
    GameData::from_json(SAMPLE_DATA_JSON, SAMPLE_NPC_NAMES_JSON).unwrap()
}

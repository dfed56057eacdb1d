use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::cards::{Card, CardGraph, CardType};
use crate::data::GameData;
use crate::noise::{calc_range, pick, point3d, RAND_STARTER_DECKS};
use crate::{RandomiserError, RandomiserSettings, Result};

pub const DECK_SIZE: u32 = 60;

/// Upper bound on noise draws for a single admission loop.
pub const MAX_DRAW_ATTEMPTS: u32 = 100_000;

const DECK_NAME_COLORS: usize = 3;
const DECK_NAME_COLOR_LEN: usize = 6;

/// Card constant to copy count, kept in first-admission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deck {
    pub name: String,
    pub colors: Vec<String>,
    entries: Vec<(String, u32)>,
}

impl Deck {
    pub fn count(&self, constant: &str) -> u32 {
        self.entries
            .iter()
            .find(|(c, _)| c == constant)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, n)| n).sum()
    }

    pub fn entries(&self) -> &[(String, u32)] {
        &self.entries
    }

    /// `\tdb <count>, <CONSTANT>` per entry.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.entries
            .iter()
            .map(|(constant, count)| format!("\tdb {}, {}", count, constant))
    }

    fn add(&mut self, constant: &str) {
        match self.entries.iter_mut().find(|(c, _)| c == constant) {
            Some((_, n)) => *n += 1,
            None => self.entries.push((constant.to_string(), 1)),
        }
    }

    fn set(&mut self, constant: &str, count: u32) {
        match self.entries.iter_mut().find(|(c, _)| c == constant) {
            Some((_, n)) => *n = count,
            None => self.entries.push((constant.to_string(), count)),
        }
    }

    fn has_room_for(&self, card: &Card) -> bool {
        self.count(&card.constant) < card.limit
    }

    /// Admit one copy if the card is under its limit.
    fn admit(&mut self, card: &Card) -> bool {
        if self.has_room_for(card) {
            self.add(&card.constant);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeckConfig {
    pub min_trainer: u32,
    pub max_trainer: u32,
    pub min_pokemon: u32,
    pub max_pokemon: u32,
    pub color_min: u32,
    pub color_max: u32,
    pub colors: Vec<String>,
    /// Energy color to the label of its basic energy card.
    pub energies: BTreeMap<String, String>,
    pub forced_card: String,
    pub forced_count: u32,
}

impl DeckConfig {
    pub fn new(settings: &RandomiserSettings, data: &GameData) -> Self {
        DeckConfig {
            min_trainer: settings.min_trainer,
            max_trainer: settings.max_trainer,
            min_pokemon: settings.min_pokemon,
            max_pokemon: settings.max_pokemon,
            color_min: settings.starter_color_min,
            color_max: settings.starter_color_max,
            colors: data.colors.clone(),
            energies: data.energies.clone(),
            forced_card: data.forced_card.clone(),
            forced_count: data.forced_count,
        }
    }

    pub fn energy_label(&self, color: &str) -> Result<&str> {
        self.energies
            .get(color)
            .map(String::as_str)
            .ok_or_else(|| RandomiserError::Config(format!("no energy card for color {}", color)))
    }
}

/// Noise cursor along `(RAND_STARTER_DECKS, y, z)`. `y` starts at 10 and
/// advances before every draw but the first.
struct DeckDraws {
    seed: u64,
    y: u64,
    z: u64,
}

impl DeckDraws {
    fn new(seed: u64, z: u64) -> Self {
        DeckDraws { seed, y: 10, z }
    }

    fn current(&self) -> u32 {
        point3d(RAND_STARTER_DECKS, self.y, self.z, self.seed)
    }

    fn next(&mut self) -> u32 {
        self.y += 10;
        self.current()
    }
}

struct Attempts {
    what: &'static str,
    used: u32,
}

impl Attempts {
    fn new(what: &'static str) -> Self {
        Attempts { what, used: 0 }
    }

    fn tick(&mut self) -> Result<()> {
        self.used += 1;
        if self.used > MAX_DRAW_ATTEMPTS {
            return Err(RandomiserError::IllegalDeckState(format!(
                "gave up admitting {} after {} draws",
                self.what, MAX_DRAW_ATTEMPTS
            )));
        }
        Ok(())
    }
}

fn room_left(pool: &[&Card], deck: &Deck) -> bool {
    pool.iter().any(|card| deck.has_room_for(card))
}

/// Build one 60-card starter deck for slot coordinate `z`.
///
/// The sequence of noise draws is fixed: trainers, forced card, colors,
/// Pokémon per color, then energy fill.
pub fn generate_starter_deck(
    graph: &CardGraph,
    seed: u64,
    z: u64,
    config: &DeckConfig,
) -> Result<Deck> {
    let mut draws = DeckDraws::new(seed, z);
    let mut deck = Deck::default();

    let trainers = graph.by_type(CardType::Trainer);
    let mut remaining = calc_range(
        draws.current(),
        config.min_trainer as i64,
        config.max_trainer as i64,
    );
    let mut attempts = Attempts::new("trainers");
    while remaining > 0 {
        if !room_left(&trainers, &deck) {
            return Err(RandomiserError::IllegalDeckState(format!(
                "{} trainer cards still needed but every trainer is at its limit",
                remaining
            )));
        }
        attempts.tick()?;
        let card = pick(&trainers, draws.next(), "trainer cards")?;
        if deck.admit(card) {
            remaining -= 1;
        }
    }

    if config.forced_count > 0 {
        if graph.by_constant(&config.forced_card).is_none() {
            return Err(RandomiserError::MissingCardReference(config.forced_card.clone()));
        }
        deck.set(&config.forced_card, config.forced_count);
    }

    let color_count = calc_range(
        draws.next(),
        config.color_min as i64,
        config.color_max as i64,
    );
    if color_count <= 0 || color_count as usize > config.colors.len() {
        return Err(RandomiserError::IllegalDeckState(format!(
            "cannot choose {} of {} colors",
            color_count,
            config.colors.len()
        )));
    }
    let mut colors = config.colors.clone();
    let mut rng = StdRng::seed_from_u64(point3d(RAND_STARTER_DECKS, draws.y, z + 1, seed) as u64);
    colors.shuffle(&mut rng);
    colors.truncate(color_count as usize);

    deck.name = colors
        .iter()
        .take(DECK_NAME_COLORS)
        .map(|c| c.chars().take(DECK_NAME_COLOR_LEN).collect::<String>())
        .collect::<Vec<_>>()
        .join(", ");

    let per_color_min = (config.min_pokemon / color_count as u32) as i64;
    let per_color_max = (config.max_pokemon / color_count as u32) as i64;
    for color in &colors {
        let pool = graph.by_energy_color(color);
        let mut remaining = calc_range(draws.next(), per_color_min, per_color_max);
        let mut attempts = Attempts::new("pokemon");
        while remaining > 0 {
            if !room_left(&pool, &deck) {
                return Err(RandomiserError::IllegalDeckState(format!(
                    "{} more {} pokemon needed but none are under their limit",
                    remaining, color
                )));
            }
            attempts.tick()?;
            let card = pick(&pool, draws.next(), "pokemon of a deck color")?;
            if !deck.admit(card) {
                continue;
            }
            remaining -= 1;

            // Evolutions bring their line along, up to two levels back.
            let mut ancestor = graph.pre_evolution_of(card);
            for _ in 0..2 {
                let Some(pre) = ancestor else { break };
                if deck.admit(pre) {
                    remaining -= 1;
                }
                ancestor = graph.pre_evolution_of(pre);
            }
        }
    }

    let energies = colors
        .iter()
        .map(|color| {
            let label = config.energy_label(color)?;
            graph
                .by_label(label)
                .ok_or_else(|| RandomiserError::MissingCardReference(label.to_string()))
        })
        .collect::<Result<Vec<&Card>>>()?;

    let total = deck.total();
    if total > DECK_SIZE {
        return Err(RandomiserError::IllegalDeckState(format!(
            "{} cards before energies, over the {} card deck size",
            total, DECK_SIZE
        )));
    }
    let mut remaining = DECK_SIZE - total;
    let mut attempts = Attempts::new("energies");
    while remaining > 0 {
        if !room_left(&energies, &deck) {
            return Err(RandomiserError::IllegalDeckState(format!(
                "{} energy cards still needed but every energy is at its limit",
                remaining
            )));
        }
        attempts.tick()?;
        let card = pick(&energies, draws.next(), "deck energies")?;
        if deck.admit(card) {
            remaining -= 1;
        }
    }

    deck.colors = colors;
    check_deck(&deck, graph, config)?;
    Ok(deck)
}

fn check_deck(deck: &Deck, graph: &CardGraph, config: &DeckConfig) -> Result<()> {
    if deck.total() != DECK_SIZE {
        return Err(RandomiserError::IllegalDeckState(format!(
            "deck {} has {} cards",
            deck.name,
            deck.total()
        )));
    }
    for (constant, count) in deck.entries() {
        if *constant == config.forced_card {
            continue;
        }
        let card = graph
            .by_constant(constant)
            .ok_or_else(|| RandomiserError::MissingCardReference(constant.clone()))?;
        if *count > card.limit {
            return Err(RandomiserError::IllegalDeckState(format!(
                "{} copies of {} exceed its limit of {}",
                count, constant, card.limit
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::Stage;
    use crate::test_support::{sample_corpus, sample_data};

    fn config() -> DeckConfig {
        DeckConfig::new(&RandomiserSettings::default(), &sample_data())
    }

    #[test]
    fn decks_are_legal_across_seeds() {
        let graph = CardGraph::build(&sample_corpus()).unwrap();
        let config = config();
        for seed in 0..200u64 {
            for z in [10u64, 20, 30] {
                let deck = generate_starter_deck(&graph, seed, z, &config).unwrap();
                assert_eq!(deck.total(), DECK_SIZE);
                for (constant, count) in deck.entries() {
                    let card = graph.by_constant(constant).unwrap();
                    if *constant != config.forced_card {
                        assert!(*count <= card.limit, "{} x{} in seed {}", constant, count, seed);
                    }
                }
            }
        }
    }

    #[test]
    fn evolutions_come_with_their_pre_evolution() {
        let graph = CardGraph::build(&sample_corpus()).unwrap();
        let config = config();
        for seed in 0..200u64 {
            let deck = generate_starter_deck(&graph, seed, 10, &config).unwrap();
            for (constant, count) in deck.entries() {
                let card = graph.by_constant(constant).unwrap();
                if card.stage.is_evolution() && *count > 0 {
                    let pre = graph.pre_evolution_of(card).unwrap();
                    assert!(deck.count(&pre.constant) > 0, "{} without {}", constant, pre.constant);
                }
            }
        }
    }

    #[test]
    fn forced_card_count_is_exact() {
        let graph = CardGraph::build(&sample_corpus()).unwrap();
        let config = config();
        for seed in 0..50u64 {
            let deck = generate_starter_deck(&graph, seed, 10, &config).unwrap();
            assert_eq!(deck.count("MYSTERIOUS_FOSSIL"), 2);
        }
    }

    #[test]
    fn same_seed_same_deck() {
        let graph = CardGraph::build(&sample_corpus()).unwrap();
        let config = config();
        let a = generate_starter_deck(&graph, 4242, 20, &config).unwrap();
        let b = generate_starter_deck(&graph, 4242, 20, &config).unwrap();
        assert_eq!(a, b);
        let c = generate_starter_deck(&graph, 4242, 30, &config).unwrap();
        assert_eq!(c.total(), DECK_SIZE);
    }

    #[test]
    fn name_and_colors_follow_shuffle() {
        let graph = CardGraph::build(&sample_corpus()).unwrap();
        let mut config = config();
        config.color_min = 2;
        config.color_max = 2;
        let deck = generate_starter_deck(&graph, 77, 10, &config).unwrap();
        assert_eq!(deck.colors.len(), 2);
        let expected: Vec<String> = deck.colors.iter().map(|c| c.chars().take(6).collect()).collect();
        assert_eq!(deck.name, expected.join(", "));

        for (constant, _) in deck.entries() {
            let card = graph.by_constant(constant).unwrap();
            if card.card_type != CardType::Trainer {
                assert!(deck.colors.iter().any(|c| card.color.as_deref() == Some(c)));
            }
        }
    }

    #[test]
    fn lines_keep_admission_order() {
        let graph = CardGraph::build(&sample_corpus()).unwrap();
        let deck = generate_starter_deck(&graph, 5, 10, &config()).unwrap();
        let lines: Vec<String> = deck.lines().collect();
        assert_eq!(lines.len(), deck.entries().len());
        let (constant, count) = &deck.entries()[0];
        assert_eq!(lines[0], format!("\tdb {}, {}", count, constant));
        // Energies are filled last.
        let last = graph.by_constant(&deck.entries().last().unwrap().0).unwrap();
        assert_eq!(last.card_type, CardType::Energy);
        assert_eq!(last.stage, Stage::None);
    }

    #[test]
    fn impossible_quotas_fail_fast() {
        let graph = CardGraph::build(&sample_corpus()).unwrap();

        let mut config = config();
        config.min_pokemon = 200;
        config.max_pokemon = 200;
        assert!(matches!(
            generate_starter_deck(&graph, 1, 10, &config),
            Err(RandomiserError::IllegalDeckState(_))
        ));

        let mut config = self::config();
        config.min_trainer = 40;
        config.max_trainer = 40;
        assert!(matches!(
            generate_starter_deck(&graph, 1, 10, &config),
            Err(RandomiserError::IllegalDeckState(_))
        ));

        let mut config = self::config();
        config.color_min = 4;
        config.color_max = 4;
        assert!(matches!(
            generate_starter_deck(&graph, 1, 10, &config),
            Err(RandomiserError::IllegalDeckState(_))
        ));
    }

    #[test]
    fn energy_labels_come_from_the_color_table() {
        let config = config();
        assert_eq!(config.energy_label("FIRE").unwrap(), "FireEnergyCard");
        assert!(matches!(config.energy_label("PSYCHIC"), Err(RandomiserError::Config(_))));

        let graph = CardGraph::build(&sample_corpus()).unwrap();
        let mut config = config;
        config.energies.remove("FIRE");
        config.energies.remove("GRASS");
        config.energies.remove("WATER");
        assert!(matches!(
            generate_starter_deck(&graph, 1, 10, &config),
            Err(RandomiserError::Config(_))
        ));
    }

    #[test]
    fn missing_energy_card_is_reported() {
        let graph = CardGraph::build(&sample_corpus()).unwrap();
        let mut config = config();
        config.energies.insert("FIRE".to_string(), "LavaEnergyCard".to_string());
        config.energies.insert("GRASS".to_string(), "LavaEnergyCard".to_string());
        config.energies.insert("WATER".to_string(), "LavaEnergyCard".to_string());
        assert!(matches!(
            generate_starter_deck(&graph, 1, 10, &config),
            Err(RandomiserError::MissingCardReference(_))
        ));
    }
}

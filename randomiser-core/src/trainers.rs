use crate::data::GameData;
use crate::noise::{calc_offset, calc_range, pick, point3d, RAND_BOOSTERS, RAND_NPC_DECKS};
use crate::{RandomiserSettings, Result};

pub const NO_BOOSTER: &str = "NO_BOOSTER";
pub const BOOSTERS_PER_EVENT: usize = 3;

/// Prize count, opponent deck and music for one NPC duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelAssignment {
    pub npc: String,
    pub id: u64,
    pub prize: i64,
    pub deck_id: String,
    pub music_id: String,
}

impl DuelAssignment {
    pub fn line(&self) -> String {
        format!(
            "\tstart_duel PRIZES_{}, {}, {}",
            self.prize, self.deck_id, self.music_id
        )
    }
}

/// Booster packs an NPC hands out after a duel, padded to whole triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoosterAssignment {
    pub npc: String,
    pub id: u64,
    pub packs: Vec<String>,
}

impl BoosterAssignment {
    /// One `give_booster_packs` line per triple.
    pub fn lines(&self) -> Vec<String> {
        self.packs
            .chunks(BOOSTERS_PER_EVENT)
            .map(|triple| format!("\tgive_booster_packs {}", triple.join(", ")))
            .collect()
    }
}

pub fn assign_duel(npc: &str, data: &GameData, settings: &RandomiserSettings) -> Result<DuelAssignment> {
    let duel = data.npc_duel(npc)?;
    let seed = settings.seed;
    let y = duel.id * 10;

    let mut prize = duel.prize;
    if !settings.exclude_prize {
        let noise = point3d(RAND_NPC_DECKS, y, 10, seed);
        let (min, max) = (settings.prize_min, settings.prize_max);
        prize = if settings.prize_full_random {
            calc_range(noise, min, max)
        } else {
            calc_offset(prize, settings.prize_range, noise).clamp(min, max.max(min))
        };
    }

    let deck_id = if settings.exclude_decks {
        duel.deck_id.clone()
    } else {
        pick(&data.decks, point3d(RAND_NPC_DECKS, y, 20, seed), "decks")?.clone()
    };

    let music_id = if settings.exclude_music {
        duel.music_id.clone()
    } else {
        pick(&data.music, point3d(RAND_NPC_DECKS, y, 30, seed), "music")?.clone()
    };

    Ok(DuelAssignment {
        npc: npc.to_string(),
        id: duel.id,
        prize,
        deck_id,
        music_id,
    })
}

pub fn assign_boosters(
    npc: &str,
    data: &GameData,
    settings: &RandomiserSettings,
) -> Result<BoosterAssignment> {
    let baseline = data.npc_boosters(npc)?;
    let seed = settings.seed;
    let y = baseline.id * 10;

    let mut packs = if settings.exclude_boosters {
        baseline.packs.clone()
    } else {
        let mut z = 10;
        let count = if settings.booster_original_amount {
            baseline.packs.len()
        } else {
            let noise = point3d(RAND_BOOSTERS, y, z, seed);
            calc_range(noise, settings.booster_min as i64, settings.booster_max as i64).max(0) as usize
        };
        let mut packs = Vec::with_capacity(count);
        for _ in 0..count {
            z += 10;
            let noise = point3d(RAND_BOOSTERS, y, z, seed);
            packs.push(pick(&data.packs, noise, "booster packs")?.clone());
        }
        packs
    };

    let remainder = packs.len() % BOOSTERS_PER_EVENT;
    if remainder > 0 {
        packs.extend(std::iter::repeat(NO_BOOSTER.to_string()).take(BOOSTERS_PER_EVENT - remainder));
    }

    Ok(BoosterAssignment {
        npc: npc.to_string(),
        id: baseline.id,
        packs,
    })
}

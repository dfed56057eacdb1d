use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod asm;
pub mod attacks;
pub mod cards;
pub mod data;
pub mod deck;
pub mod noise;
pub mod rewriter;
pub mod trainers;

#[cfg(test)]
pub(crate) mod test_support;

use attacks::{AttackKind, AttackPool};
use cards::{CardGraph, Tier};
use data::GameData;
use rewriter::{Randomiser, MANIFEST};

pub const TEMPLATES_DIR: &str = "templates";
pub const DATA_DIR: &str = "data";
pub const CARDS_TEMPLATE: &str = "cards.asm";
pub const SPOILER_LOG: &str = "spoiler_log.txt";
const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomiserSettings {
    pub seed: u64,
    /// Draw card sets per evolution line rather than per card.
    pub group_by_evolution: bool,
    pub exclude_prize: bool,
    /// Draw prizes anywhere in `prize_min..=prize_max` instead of moving
    /// the original count by up to `prize_range`.
    pub prize_full_random: bool,
    pub prize_range: i64,
    pub prize_min: i64,
    pub prize_max: i64,
    pub exclude_decks: bool,
    pub exclude_music: bool,
    pub exclude_boosters: bool,
    pub booster_original_amount: bool,
    pub booster_min: u32,
    pub booster_max: u32,
    pub min_pokemon: u32,
    pub max_pokemon: u32,
    pub min_trainer: u32,
    pub max_trainer: u32,
    pub starter_color_min: u32,
    pub starter_color_max: u32,
    pub exclude_npcs: bool,
    pub debug: bool,
    /// Project root holding `templates/` and `data/`.
    pub project_path: PathBuf,
    /// Card corpus; defaults to `templates/cards.asm`.
    pub cards_path: Option<PathBuf>,
    /// Where the `src/` tree is written; defaults to the project root.
    pub output_path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct SettingsFile {
    seed: Option<u64>,
    #[serde(flatten)]
    settings: RandomiserSettings,
}

impl Default for RandomiserSettings {
    fn default() -> Self {
        RandomiserSettings {
            seed: 0,
            group_by_evolution: true,
            exclude_prize: true,
            prize_full_random: false,
            prize_range: 1,
            prize_min: 1,
            prize_max: 6,
            exclude_decks: false,
            exclude_music: false,
            exclude_boosters: false,
            booster_original_amount: true,
            booster_min: 1,
            booster_max: 6,
            min_pokemon: 36,
            max_pokemon: 36,
            min_trainer: 5,
            max_trainer: 10,
            starter_color_min: 3,
            starter_color_max: 3,
            exclude_npcs: false,
            debug: false,
            project_path: PathBuf::from("."),
            cards_path: None,
            output_path: None,
        }
    }
}

impl RandomiserSettings {
    /// Read settings from a JSON file. Missing keys keep their defaults.
    /// The file's seed comes back separately as it may leave it unset.
    pub fn load(path: &Path) -> Result<(Self, Option<u64>)> {
        let text = fs::read_to_string(path)?;
        let file: SettingsFile = serde_json::from_str(&text)?;
        Ok((file.settings, file.seed))
    }

    pub fn validate(&self) -> Result<()> {
        let ranges: [(&str, i64, i64); 5] = [
            ("prize", self.prize_min, self.prize_max),
            ("booster", self.booster_min as i64, self.booster_max as i64),
            ("pokemon", self.min_pokemon as i64, self.max_pokemon as i64),
            ("trainer", self.min_trainer as i64, self.max_trainer as i64),
            (
                "starter color",
                self.starter_color_min as i64,
                self.starter_color_max as i64,
            ),
        ];
        for (what, min, max) in ranges {
            if min > max {
                return Err(RandomiserError::Config(format!(
                    "{} range is inverted: {} > {}",
                    what, min, max
                )));
            }
        }
        if self.starter_color_min == 0 {
            return Err(RandomiserError::Config(
                "starter decks need at least one color".to_string(),
            ));
        }
        if self.prize_range < 0 {
            return Err(RandomiserError::Config(format!(
                "prize range must not be negative: {}",
                self.prize_range
            )));
        }
        Ok(())
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.project_path.join(TEMPLATES_DIR)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.project_path.join(DATA_DIR)
    }

    pub fn cards_file(&self) -> PathBuf {
        self.cards_path
            .clone()
            .unwrap_or_else(|| self.templates_dir().join(CARDS_TEMPLATE))
    }

    pub fn output_root(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| self.project_path.clone())
    }
}

#[derive(Debug, Error)]
pub enum RandomiserError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("corpus error on line {line}: {message}")]
    Corpus { line: usize, message: String },
    #[error("cannot pick from empty list of {0}")]
    EmptySelection(&'static str),
    #[error("attack pool exhausted for {tier:?} {kind:?} attacks")]
    PoolExhaustion { tier: Tier, kind: AttackKind },
    #[error("missing card reference: {0}")]
    MissingCardReference(String),
    #[error("unknown NPC: {0}")]
    MissingNpc(String),
    #[error("illegal deck: {0}")]
    IllegalDeckState(String),
}

pub type Result<T> = std::result::Result<T, RandomiserError>;

/// Randomise every template of the manifest. Nothing is written unless
/// all of them succeed.
pub fn run(settings: RandomiserSettings) -> Result<()> {
    settings.validate()?;

    if !settings.project_path.is_dir() {
        return Err(RandomiserError::Config(format!(
            "Project path does not exist: {}",
            settings.project_path.display()
        )));
    }

    info!("Randomising with seed {:06}", settings.seed);

    let templates_dir = settings.templates_dir();
    let mut data = GameData::load(&settings.data_dir())?;
    data.resolve_master_checks(&settings.project_path, &templates_dir)?;
    debug!("{} master check patches available", data.master_checks.len());

    let corpus = fs::read_to_string(settings.cards_file())?;
    let graph = CardGraph::build(&corpus)?;
    info!("Parsed {} cards", graph.len());

    let mut templates = Vec::with_capacity(MANIFEST.len());
    for (source, target) in MANIFEST {
        let text = fs::read_to_string(templates_dir.join(source))?;
        templates.push((source, target, text));
    }

    let cards_template = &templates[0].2;
    let pool = AttackPool::classify(cards_template, &graph, settings.seed)?;

    let mut randomiser = Randomiser::new(&settings, &data, &graph, pool);
    let mut outputs = Vec::with_capacity(templates.len());
    for (source, target, text) in &templates {
        debug!("Rewriting {}", source);
        let rewritten = randomiser.rewrite(text)?;
        outputs.push((*target, rewritten));
    }

    let out_root = settings.output_root();
    write_outputs(&out_root, &outputs)?;
    info!("Wrote {} files under {}", outputs.len(), out_root.display());

    if settings.debug {
        let log_path = out_root.join(SPOILER_LOG);
        fs::write(log_path, spoiler_log(&settings, &randomiser))?;
    }

    Ok(())
}

/// Write every output beside its destination first, then move them all into
/// place. A failed write removes what was staged.
fn write_outputs(out_root: &Path, outputs: &[(&str, String)]) -> Result<()> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(outputs.len());
    for (target, text) in outputs {
        let path = out_root.join(target);
        let tmp = staging_path(&path);
        let written = match path.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| fs::write(&tmp, text));

        if let Err(err) = written {
            for (tmp, _) in &staged {
                if let Err(cleanup) = fs::remove_file(tmp) {
                    warn!("Could not remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(err.into());
        }
        staged.push((tmp, path));
    }

    for (tmp, path) in &staged {
        fs::rename(tmp, path)?;
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

fn spoiler_log(settings: &RandomiserSettings, randomiser: &Randomiser<'_>) -> String {
    let mut log = String::new();
    log.push_str(&format!("seed: {:06}\n\n", settings.seed));

    log.push_str("starter decks:\n");
    for (slot, deck) in &randomiser.starter_decks {
        log.push_str(&format!("  {} ({}):\n", slot, deck.name));
        for (constant, count) in deck.entries() {
            log.push_str(&format!("    {} x{}\n", constant, count));
        }
    }

    log.push_str("\nnpc names:\n");
    for (from, to) in &randomiser.npc_names {
        log.push_str(&format!("  {} -> {}\n", from, to));
    }

    log.push_str("\nduels:\n");
    for duel in &randomiser.duels {
        log.push_str(&format!(
            "  {}: prizes {}, deck {}, music {}\n",
            duel.npc, duel.prize, duel.deck_id, duel.music_id
        ));
    }

    log.push_str("\nbooster rewards:\n");
    for boosters in &randomiser.boosters {
        log.push_str(&format!("  {}: {}\n", boosters.npc, boosters.packs.join(", ")));
    }

    log.push_str("\nmaster checks:\n");
    for patch in &randomiser.inserted_patches {
        log.push_str(&format!("  {}\n", patch.display()));
    }

    log
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = RandomiserSettings::default();
        settings.validate().unwrap();
        assert!(settings.group_by_evolution);
        assert!(settings.exclude_prize);
        assert_eq!((settings.min_pokemon, settings.max_pokemon), (36, 36));
        assert_eq!(settings.cards_file(), PathBuf::from("./templates/cards.asm"));
        assert_eq!(settings.output_root(), PathBuf::from("."));
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let settings = RandomiserSettings {
            min_trainer: 11,
            ..RandomiserSettings::default()
        };
        assert!(matches!(settings.validate(), Err(RandomiserError::Config(_))));

        let settings = RandomiserSettings {
            starter_color_min: 0,
            starter_color_max: 0,
            ..RandomiserSettings::default()
        };
        assert!(matches!(settings.validate(), Err(RandomiserError::Config(_))));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: RandomiserSettings =
            serde_json::from_str(r#"{ "seed": 42, "exclude_npcs": true }"#).unwrap();
        assert_eq!(settings.seed, 42);
        assert!(settings.exclude_npcs);
        assert_eq!(settings.max_trainer, 10);
        assert!(settings.booster_original_amount);
    }

    #[test]
    fn staged_files_sit_beside_their_target() {
        assert_eq!(
            staging_path(Path::new("out/src/data/cards.asm")),
            PathBuf::from("out/src/data/cards.asm.tmp")
        );
    }

    #[test]
    fn settings_file_reports_whether_it_names_a_seed() {
        let path = std::env::temp_dir().join(format!("ptcg-settings-{}.json", std::process::id()));

        fs::write(&path, r#"{ "seed": 77, "max_trainer": 8 }"#).unwrap();
        let (settings, seed) = RandomiserSettings::load(&path).unwrap();
        assert_eq!(seed, Some(77));
        assert_eq!(settings.max_trainer, 8);

        fs::write(&path, r#"{ "exclude_music": true }"#).unwrap();
        let (settings, seed) = RandomiserSettings::load(&path).unwrap();
        assert_eq!(seed, None);
        assert!(settings.exclude_music);
        assert_eq!(settings.min_trainer, 5);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn errors_render_their_context() {
        let err = RandomiserError::Corpus {
            line: 12,
            message: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "corpus error on line 12: bad");
        let err = RandomiserError::PoolExhaustion {
            tier: Tier::Stage2,
            kind: AttackKind::NonDamage,
        };
        assert!(err.to_string().contains("Stage2"));
    }
}

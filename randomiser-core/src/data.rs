use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{RandomiserError, Result};

pub const DATA_FILE: &str = "data.json";
pub const NPC_NAMES_FILE: &str = "npc_names.json";
pub const PATCHES_DIR: &str = "patches";
pub const MASTER_CHECK_SUFFIX: &str = "_check.asm";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcDuel {
    pub id: u64,
    pub prize: i64,
    pub deck_id: String,
    pub music_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcBoosters {
    pub id: u64,
    pub packs: Vec<String>,
}

/// Static game tables the rewriter picks from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub sets: Vec<String>,
    pub decks: Vec<String>,
    pub music: Vec<String>,
    pub packs: Vec<String>,
    pub colors: Vec<String>,
    /// Energy color to the label of its basic energy card.
    pub energies: BTreeMap<String, String>,
    pub npc_duels: BTreeMap<String, NpcDuel>,
    pub npc_boosters: BTreeMap<String, NpcBoosters>,
    /// Patch files for master checks. Relative paths are taken from the
    /// project root; empty means discover them under `templates/patches`.
    #[serde(default)]
    pub master_checks: Vec<PathBuf>,
    #[serde(default = "default_forced_card")]
    pub forced_card: String,
    #[serde(default = "default_forced_count")]
    pub forced_count: u32,
    #[serde(skip)]
    pub npc_names: Vec<String>,
}

fn default_forced_card() -> String {
    "MYSTERIOUS_FOSSIL".to_string()
}

fn default_forced_count() -> u32 {
    2
}

impl GameData {
    pub fn from_json(data: &str, npc_names: &str) -> Result<Self> {
        let mut game: GameData = serde_json::from_str(data)?;
        game.npc_names = serde_json::from_str(npc_names)?;
        Ok(game)
    }

    /// Read `data.json` and `npc_names.json` from `data_dir`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let data = fs::read_to_string(data_dir.join(DATA_FILE))?;
        let names = fs::read_to_string(data_dir.join(NPC_NAMES_FILE))?;
        Self::from_json(&data, &names)
    }

    /// Make every master-check path absolute, or fill the list from the
    /// patches directory when the tables name none.
    pub fn resolve_master_checks(&mut self, project_root: &Path, templates_dir: &Path) -> Result<()> {
        if self.master_checks.is_empty() {
            self.master_checks = discover_master_checks(&templates_dir.join(PATCHES_DIR))?;
            return Ok(());
        }
        for path in &mut self.master_checks {
            if path.is_relative() {
                *path = project_root.join(&*path);
            }
        }
        Ok(())
    }

    pub fn npc_duel(&self, npc: &str) -> Result<&NpcDuel> {
        self.npc_duels
            .get(npc)
            .ok_or_else(|| RandomiserError::MissingNpc(npc.to_string()))
    }

    pub fn npc_boosters(&self, npc: &str) -> Result<&NpcBoosters> {
        self.npc_boosters
            .get(npc)
            .ok_or_else(|| RandomiserError::MissingNpc(npc.to_string()))
    }
}

/// Every `*_check.asm` below `dir`, sorted by path. A missing directory
/// yields no patches.
pub fn discover_master_checks(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| RandomiserError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_check = entry
            .file_name()
            .to_str()
            .map(|name| name.ends_with(MASTER_CHECK_SUFFIX))
            .unwrap_or(false);
        if is_check {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

//! Single forward pass over a template, replacing every randomisation
//! marker with concrete values.

use log::{debug, warn};
use std::fs;
use std::path::PathBuf;

use crate::asm::{card_label, code_without_comment, split_comment};
use crate::attacks::{block_end, is_attack_header, AttackPool, AttackRecord};
use crate::cards::{CardGraph, CardType, Tier, COLORLESS};
use crate::data::GameData;
use crate::deck::{generate_starter_deck, Deck, DeckConfig};
use crate::noise::{calc_range, pick, point2d, RAND_CARDS, RAND_MASTERS, RAND_NPC_NAMES};
use crate::trainers::{assign_boosters, assign_duel, BoosterAssignment, DuelAssignment};
use crate::{RandomiserError, RandomiserSettings, Result};

/// Template file under `templates/` and where its output goes, relative to
/// the output root. Order matters: decks and NPC names must exist before
/// the text files that mention them.
pub const MANIFEST: [(&str, &str); 14] = [
    ("cards.asm", "src/data/cards.asm"),
    ("bank03.asm", "src/engine/bank03.asm"),
    ("bank04.asm", "src/engine/bank04.asm"),
    ("home.asm", "src/engine/home.asm"),
    ("decks.asm", "src/data/decks.asm"),
    ("text_offsets.asm", "src/text/text_offsets.asm"),
    ("text2.asm", "src/text/text2.asm"),
    ("text3.asm", "src/text/text3.asm"),
    ("text4.asm", "src/text/text4.asm"),
    ("text5.asm", "src/text/text5.asm"),
    ("text6.asm", "src/text/text6.asm"),
    ("text7.asm", "src/text/text7.asm"),
    ("text8.asm", "src/text/text8.asm"),
    ("text9.asm", "src/text/text9.asm"),
];

const HP_MIN: [i64; 6] = [50, 40, 60, 40, 60, 70];
const HP_MAX: [i64; 6] = [70, 50, 80, 50, 70, 100];
const RETREAT_MIN: [i64; 6] = [1, 0, 1, 0, 1, 2];
const RETREAT_MAX: [i64; 6] = [3, 1, 3, 1, 2, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker<'a> {
    RecordStart(&'a str),
    Set,
    Hp,
    Weakness,
    Resistance,
    RetreatCost,
    AttackPair,
    Duel(&'a str),
    Boosters(&'a str),
    MasterCheck,
    GenerateDeck(&'a str),
    NpcName(&'a str),
    StarterDeck,
    NpcCheck,
}

impl<'a> Marker<'a> {
    fn parse(line: &'a str) -> Option<Marker<'a>> {
        if is_attack_header(line) {
            return Some(Marker::AttackPair);
        }
        let (_, tag) = split_comment(line);
        let tag = tag?;
        if let Some(label) = card_label(line) {
            return (tag == "CARD_NAME").then_some(Marker::RecordStart(label));
        }
        if let Some(rest) = tag.strip_prefix("NPC_NAMES:") {
            // The payload is raw text and may itself contain `;`.
            let raw = line
                .split_once("NPC_NAMES:")
                .map_or(rest, |(_, after)| after.trim_end_matches(['\r', '\n']));
            return Some(Marker::NpcName(raw));
        }
        let marker = match tag {
            "RANDOMIZE_SET" => Marker::Set,
            "hp" => Marker::Hp,
            "weakness" => Marker::Weakness,
            "resistance" => Marker::Resistance,
            "retreat cost" => Marker::RetreatCost,
            "STARTER_DECK" => Marker::StarterDeck,
            _ if tag.starts_with("DUEL:") => Marker::Duel(tag["DUEL:".len()..].trim()),
            _ if tag.starts_with("BOOSTERS:") => Marker::Boosters(tag["BOOSTERS:".len()..].trim()),
            _ if tag.starts_with("MASTER_CHECK:") => Marker::MasterCheck,
            _ if tag.starts_with("GENERATE_DECK:") => {
                Marker::GenerateDeck(tag["GENERATE_DECK:".len()..].trim())
            }
            _ if tag.starts_with("MITCH_CHECK:") || tag.starts_with("ISAAC_CHECK:") => {
                Marker::NpcCheck
            }
            _ => return None,
        };
        Some(marker)
    }

    fn is_card_stat(self) -> bool {
        matches!(
            self,
            Marker::Set
                | Marker::Hp
                | Marker::Weakness
                | Marker::Resistance
                | Marker::RetreatCost
                | Marker::AttackPair
        )
    }
}

/// The card record being rewritten. `cursor` starts at the record's
/// coordinate band and moves up by ten for every stat drawn.
#[derive(Debug, Clone)]
struct ActiveRecord {
    base: u64,
    cursor: u64,
    tier: Tier,
    color: String,
}

/// Per-run rewriting state, shared by every template of the manifest.
pub struct Randomiser<'a> {
    settings: &'a RandomiserSettings,
    data: &'a GameData,
    graph: &'a CardGraph,
    pool: AttackPool,
    deck_config: DeckConfig,
    master_checks: Vec<PathBuf>,
    masters_checked: u64,
    deck_z: u64,
    npc_y: u64,
    npc_pool: Vec<String>,
    /// Starter deck slot name to its generated deck, in generation order.
    pub starter_decks: Vec<(String, Deck)>,
    /// Original NPC name to its replacement, in text order.
    pub npc_names: Vec<(String, String)>,
    pub duels: Vec<DuelAssignment>,
    pub boosters: Vec<BoosterAssignment>,
    pub inserted_patches: Vec<PathBuf>,
}

impl<'a> Randomiser<'a> {
    pub fn new(
        settings: &'a RandomiserSettings,
        data: &'a GameData,
        graph: &'a CardGraph,
        pool: AttackPool,
    ) -> Self {
        Randomiser {
            settings,
            data,
            graph,
            pool,
            deck_config: DeckConfig::new(settings, data),
            master_checks: data.master_checks.clone(),
            masters_checked: 0,
            deck_z: 10,
            npc_y: 10,
            npc_pool: data.npc_names.clone(),
            starter_decks: Vec::new(),
            npc_names: Vec::new(),
            duels: Vec::new(),
            boosters: Vec::new(),
            inserted_patches: Vec::new(),
        }
    }

    /// Rewrite one template. Every output line ends with a newline.
    pub fn rewrite(&mut self, template: &str) -> Result<String> {
        let lines: Vec<&str> = template.lines().collect();
        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        let mut record: Option<ActiveRecord> = None;

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            let line_no = i + 1;
            let marker = match Marker::parse(line) {
                Some(m) if m.is_card_stat() && record.is_none() => None,
                other => other,
            };
            let Some(marker) = marker else {
                out.push(line.to_string());
                i += 1;
                continue;
            };

            match marker {
                Marker::RecordStart(label) => {
                    record = Some(self.open_record(label)?);
                    out.push(split_comment(line).0.trim_end().to_string());
                }
                Marker::Set => {
                    if let Some(r) = &record {
                        let noise = point2d(RAND_CARDS, r.base, self.settings.seed);
                        let set = pick(&self.data.sets, noise, "sets")?;
                        out.push(format!("\tdb {} | NONE ; sets", set));
                    }
                }
                Marker::Hp => {
                    if let Some(r) = record.as_mut() {
                        r.cursor += 10;
                        let noise = point2d(RAND_CARDS, r.cursor, self.settings.seed);
                        let t = r.tier.index();
                        let hp = round_to_ten(calc_range(noise, HP_MIN[t], HP_MAX[t]));
                        out.push(format!("\tdb {} ; hp", hp));
                    }
                }
                Marker::Weakness => out.push("\tdb NONE ; weakness".to_string()),
                Marker::Resistance => out.push("\tdb NONE ; resistance".to_string()),
                Marker::RetreatCost => {
                    if let Some(r) = record.as_mut() {
                        r.cursor += 10;
                        let noise = point2d(RAND_CARDS, r.cursor, self.settings.seed);
                        let t = r.tier.index();
                        let cost = calc_range(noise, RETREAT_MIN[t], RETREAT_MAX[t]);
                        out.push(format!("\tdb {} ; retreat cost", cost));
                    }
                }
                Marker::AttackPair => {
                    if let Some(r) = &record {
                        i = self.rewrite_attacks(&lines, i, r, &mut out)?;
                        continue;
                    }
                }
                Marker::Duel(npc) => {
                    let duel = assign_duel(npc, self.data, self.settings)?;
                    out.push(duel.line());
                    self.duels.push(duel);
                }
                Marker::Boosters(npc) => {
                    let boosters = assign_boosters(npc, self.data, self.settings)?;
                    out.extend(boosters.lines());
                    self.boosters.push(boosters);
                }
                Marker::MasterCheck => {
                    self.insert_master_check(&mut out)?;
                    if let Some(code) = code_without_comment(line) {
                        out.push(code.to_string());
                    }
                }
                Marker::GenerateDeck(name) => {
                    let deck = generate_starter_deck(
                        self.graph,
                        self.settings.seed,
                        self.deck_z,
                        &self.deck_config,
                    )?;
                    debug!("Generated starter deck {} ({}) at z={}", name, deck.name, self.deck_z);
                    self.deck_z += 10;
                    out.extend(deck.lines());
                    self.starter_decks.push((name.to_string(), deck));
                    if let Some(code) = code_without_comment(line) {
                        out.push(code.to_string());
                    }
                }
                Marker::NpcName(payload) => out.push(self.rename_npc(payload)?),
                Marker::StarterDeck => {
                    let code = split_comment(line).0.trim_end();
                    out.push(self.fill_deck_names(code, line_no)?);
                }
                Marker::NpcCheck => {
                    let npc = self.npc_on_line(line)?;
                    let code = split_comment(line).0.trim_end();
                    out.push(code.replacen("{}", npc, 1));
                }
            }
            i += 1;
        }

        let mut text = out.join("\n");
        text.push('\n');
        Ok(text)
    }

    fn open_record(&self, label: &str) -> Result<ActiveRecord> {
        let card = self
            .graph
            .by_label(label)
            .ok_or_else(|| RandomiserError::MissingCardReference(label.to_string()))?;
        let key = if self.settings.group_by_evolution {
            card.group
        } else {
            card.id
        };
        let base = key as u64 * 10;
        let color = match card.card_type {
            CardType::Pokemon => card.color.clone().unwrap_or_else(|| COLORLESS.to_string()),
            _ => COLORLESS.to_string(),
        };
        Ok(ActiveRecord {
            base,
            cursor: base,
            tier: self.graph.tier(card),
            color,
        })
    }

    /// Consume both attack slots starting at the header on line `start`
    /// and emit the assigned pair. Returns the index of the first line
    /// after the pair.
    fn rewrite_attacks(
        &mut self,
        lines: &[&str],
        start: usize,
        record: &ActiveRecord,
        out: &mut Vec<String>,
    ) -> Result<usize> {
        let first_end = block_end(lines, start + 1);
        let first = AttackRecord::parse(&lines[start + 1..first_end], start + 2)?;

        let second_header = first_end + 1;
        if second_header >= lines.len() || !is_attack_header(lines[second_header]) {
            return Err(RandomiserError::Corpus {
                line: second_header.min(lines.len()) + 1,
                message: "expected a second attack slot".to_string(),
            });
        }
        let second_end = block_end(lines, second_header + 1);
        let second = AttackRecord::parse(&lines[second_header + 1..second_end], second_header + 2)?;

        let [one, two] = self
            .pool
            .assign_two_attacks([first, second], record.tier, &record.color)?;
        for (n, attack) in [(1, one), (2, two)] {
            out.push(format!("\t; attack {}", n));
            out.extend(attack.lines().iter().cloned());
            out.push(String::new());
        }

        // The blank line closing the second block was emitted above.
        Ok((second_end + 1).min(lines.len()))
    }

    fn insert_master_check(&mut self, out: &mut Vec<String>) -> Result<()> {
        if self.master_checks.is_empty() {
            warn!("No master check patches left to insert");
            return Ok(());
        }
        let noise = point2d(RAND_MASTERS, self.masters_checked, self.settings.seed);
        let idx = noise as usize % self.master_checks.len();
        let patch = self.master_checks.remove(idx);
        let text = fs::read_to_string(&patch)?;
        debug!("Inserting master check {}", patch.display());
        out.extend(text.lines().map(str::to_string));
        self.inserted_patches.push(patch);
        self.masters_checked += 10;
        Ok(())
    }

    fn rename_npc(&mut self, payload: &str) -> Result<String> {
        let original = quoted(payload).map(str::to_string);
        if self.settings.exclude_npcs {
            if let Some(name) = original {
                self.npc_names.push((name.clone(), name));
            }
            return Ok(payload.to_string());
        }

        if self.npc_pool.is_empty() {
            return Err(RandomiserError::EmptySelection("npc names"));
        }
        let noise = point2d(RAND_NPC_NAMES, self.npc_y, self.settings.seed);
        let npc = self.npc_pool.remove(noise as usize % self.npc_pool.len());
        self.npc_y += 10;
        if let Some(name) = original {
            self.npc_names.push((name, npc.clone()));
        }
        Ok(format!("\ttext \"{}\"", npc))
    }

    /// Replacement name of the first renamed NPC whose original name
    /// appears on `line`.
    fn npc_on_line(&self, line: &str) -> Result<&str> {
        self.npc_names
            .iter()
            .find(|(from, _)| line.contains(from.as_str()))
            .map(|(_, to)| to.as_str())
            .ok_or_else(|| RandomiserError::MissingNpc(line.trim().to_string()))
    }

    /// Substitute `{slot}` placeholders with starter deck names.
    fn fill_deck_names(&self, code: &str, line_no: usize) -> Result<String> {
        let mut out = String::with_capacity(code.len());
        let mut rest = code;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| RandomiserError::Corpus {
                line: line_no,
                message: "unclosed deck name placeholder".to_string(),
            })?;
            let key = &after[..close];
            let (_, deck) = self
                .starter_decks
                .iter()
                .find(|(name, _)| name == key)
                .ok_or_else(|| RandomiserError::Corpus {
                    line: line_no,
                    message: format!("unknown starter deck '{}'", key),
                })?;
            out.push_str(&deck.name);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Python-style rounding to a multiple of ten: halves go to the even ten.
fn round_to_ten(value: i64) -> i64 {
    let tens = value.div_euclid(10);
    match value.rem_euclid(10) {
        r if r < 5 => tens * 10,
        r if r > 5 => (tens + 1) * 10,
        _ if tens % 2 == 0 => tens * 10,
        _ => (tens + 1) * 10,
    }
}

/// First double-quoted string of `text`.
fn quoted(text: &str) -> Option<&str> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(&text[start..start + len])
}

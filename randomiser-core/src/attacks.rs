use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::asm::{card_label, energy_pairs, indentation, operand, split_comment};
use crate::cards::{CardGraph, CardType, Tier, COLORLESS};
use crate::noise::{scalar, RAND_ATTACKS};
use crate::{RandomiserError, Result};

/// Minimum queue length `ensure_supply` builds a bucket up to.
pub const SUPPLY_FLOOR: usize = 300;

/// Chance that a free draw comes from the damage bucket.
pub const DAMAGE_BIAS: f64 = 0.7;

pub const EMPTY_ATTACK_NAME: &str = "NONE";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AttackKind {
    Damage,
    NonDamage,
}

impl AttackKind {
    pub fn opposite(self) -> AttackKind {
        match self {
            AttackKind::Damage => AttackKind::NonDamage,
            AttackKind::NonDamage => AttackKind::Damage,
        }
    }

    fn index(self) -> usize {
        match self {
            AttackKind::Damage => 0,
            AttackKind::NonDamage => 1,
        }
    }
}

/// One attack stat block: its verbatim lines plus the fields the pool
/// needs to sort and pair attacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackRecord {
    lines: Vec<String>,
    pub energy: Vec<(String, u32)>,
    pub name: String,
    pub damage: u32,
    pub category: String,
    pub effect: String,
    pub animation: String,
}

impl AttackRecord {
    /// Parse the lines of one block. `first_line` is the 1-based line
    /// number of `lines[0]` for error reporting.
    pub fn parse(lines: &[&str], first_line: usize) -> Result<Self> {
        let mut record = AttackRecord {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            energy: Vec::new(),
            name: String::new(),
            damage: 0,
            category: String::new(),
            effect: String::new(),
            animation: String::new(),
        };
        for (offset, line) in lines.iter().enumerate() {
            let (code, tag) = split_comment(line);
            let value = operand(code);
            let corpus_error = |message: String| RandomiserError::Corpus {
                line: first_line + offset,
                message,
            };
            match tag {
                Some("energies") => {
                    record.energy = energy_pairs(value)
                        .map_err(corpus_error)?
                        .into_iter()
                        .map(|(color, count)| (color.to_string(), count))
                        .collect();
                }
                Some("name") => record.name = value.to_string(),
                Some("damage") => {
                    record.damage = value
                        .parse()
                        .map_err(|_| corpus_error(format!("bad attack damage '{}'", value)))?;
                }
                Some("category") => record.category = value.to_string(),
                Some("effect commands") => record.effect = value.to_string(),
                Some("animation") => record.animation = value.to_string(),
                _ => {}
            }
        }
        Ok(record)
    }

    /// Stand-in attack for a tier whose damage bucket has nothing to offer.
    pub fn tier_default(tier: Tier) -> Self {
        let (cost, name, damage, animation) = match tier {
            Tier::BasicNoEvolution | Tier::BasicOneEvolution | Tier::BasicTwoEvolutions => {
                (1, "TackleName", 10, "ATK_ANIM_HIT")
            }
            Tier::Stage1OfOne | Tier::Stage1OfTwo => (2, "PoundName", 20, "ATK_ANIM_HIT"),
            Tier::Stage2 => (3, "SlashName", 20, "ATK_ANIM_SLASH"),
        };
        let lines = vec![
            format!("\tenergy {}, {} ; energies", COLORLESS, cost),
            format!("\ttx {} ; name", name),
            "\tdw NONE ; description".to_string(),
            "\tdw NONE ; description (cont)".to_string(),
            format!("\tdb {} ; damage", damage),
            "\tdb DAMAGE_NORMAL ; category".to_string(),
            "\tdw NONE ; effect commands".to_string(),
            "\tdb NONE ; flags 1".to_string(),
            "\tdb NONE ; flags 2".to_string(),
            "\tdb NONE ; flags 3".to_string(),
            "\tdb 0".to_string(),
            format!("\tdb {} ; animation", animation),
        ];
        AttackRecord {
            lines,
            energy: vec![(COLORLESS.to_string(), cost)],
            name: name.to_string(),
            damage,
            category: "DAMAGE_NORMAL".to_string(),
            effect: "NONE".to_string(),
            animation: animation.to_string(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() || self.name == EMPTY_ATTACK_NAME
    }

    pub fn kind(&self) -> AttackKind {
        if self.damage == 0 {
            AttackKind::NonDamage
        } else {
            AttackKind::Damage
        }
    }

    pub fn total_cost(&self) -> u32 {
        self.energy.iter().map(|(_, n)| n).sum()
    }

    /// Rewrite every colored energy requirement to `color`. Colorless
    /// requirements are kept, and colors that end up repeated are merged.
    pub fn recolored(&self, color: &str) -> AttackRecord {
        let mut energy: Vec<(String, u32)> = Vec::new();
        for (token, count) in &self.energy {
            let token = if token == COLORLESS { COLORLESS } else { color };
            match energy.iter_mut().find(|(c, _)| c == token) {
                Some((_, total)) => *total += count,
                None => energy.push((token.to_string(), *count)),
            }
        }

        let mut record = self.clone();
        for line in &mut record.lines {
            let (code, tag) = split_comment(line);
            if tag != Some("energies") || energy.is_empty() {
                continue;
            }
            let pairs: Vec<String> = energy
                .iter()
                .map(|(c, n)| format!("{}, {}", c, n))
                .collect();
            *line = format!("{}energy {} ; energies", indentation(code), pairs.join(", "));
        }
        record.energy = energy;
        record
    }
}

/// `\t; attack N` header line.
pub(crate) fn is_attack_header(line: &str) -> bool {
    let (code, tag) = split_comment(line);
    code.trim().is_empty()
        && tag.map_or(false, |t| t == "attack" || t.starts_with("attack "))
}

/// Index one past the last line of the block starting at `start`: the
/// block runs up to the next blank line or the end of input.
pub(crate) fn block_end(lines: &[&str], start: usize) -> usize {
    lines[start..]
        .iter()
        .position(|l| l.trim().is_empty())
        .map_or(lines.len(), |p| start + p)
}

type Buckets = [[Vec<AttackRecord>; 2]; 6];

/// Per-tier damage and non-damage attack queues, consumed by popping and
/// refilled from the catalog of every attack found in the card templates.
#[derive(Debug, Clone)]
pub struct AttackPool {
    catalog: Buckets,
    queues: Buckets,
    rng: StdRng,
}

impl AttackPool {
    pub fn new(seed: u64) -> Self {
        AttackPool {
            catalog: Default::default(),
            queues: Default::default(),
            rng: StdRng::seed_from_u64(scalar(RAND_ATTACKS as u128, seed) as u64),
        }
    }

    /// Collect every non-empty attack of `template`, bucketed by the tier of
    /// the card it belongs to, and stock every queue.
    pub fn classify(template: &str, graph: &CardGraph, seed: u64) -> Result<Self> {
        let mut pool = Self::new(seed);
        let lines: Vec<&str> = template.lines().collect();
        let mut tier = Tier::BasicNoEvolution;

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if let Some(label) = card_label(line) {
                tier = match graph.by_label(label) {
                    Some(card) if card.card_type == CardType::Pokemon => graph.tier(card),
                    _ => Tier::BasicNoEvolution,
                };
            } else if is_attack_header(line) {
                let end = block_end(&lines, i + 1);
                let record = AttackRecord::parse(&lines[i + 1..end], i + 2)?;
                if !record.is_empty() {
                    pool.add(tier, record);
                }
                i = end;
                continue;
            }
            i += 1;
        }

        for tier in Tier::ALL {
            pool.ensure_supply(tier, AttackKind::Damage);
            pool.ensure_supply(tier, AttackKind::NonDamage);
        }
        Ok(pool)
    }

    pub fn add(&mut self, tier: Tier, record: AttackRecord) {
        self.catalog[tier.index()][record.kind().index()].push(record);
    }

    pub fn catalog_len(&self, tier: Tier, kind: AttackKind) -> usize {
        self.catalog[tier.index()][kind.index()].len()
    }

    pub fn queue_len(&self, tier: Tier, kind: AttackKind) -> usize {
        self.queues[tier.index()][kind.index()].len()
    }

    fn fallback(&self, tier: Tier, kind: AttackKind) -> Vec<AttackRecord> {
        let own = &self.catalog[tier.index()][kind.index()];
        if !own.is_empty() {
            return own.clone();
        }
        match kind {
            AttackKind::Damage => vec![AttackRecord::tier_default(tier)],
            AttackKind::NonDamage => Tier::ALL
                .iter()
                .filter(|t| **t != tier)
                .flat_map(|t| self.catalog[t.index()][kind.index()].iter().cloned())
                .collect(),
        }
    }

    /// Grow a bucket to at least `SUPPLY_FLOOR` entries by doubling it after
    /// each shuffle, then shuffle once more. An empty bucket is first seeded
    /// from the catalog or its fallback; one with no source stays empty.
    pub fn ensure_supply(&mut self, tier: Tier, kind: AttackKind) {
        if self.queues[tier.index()][kind.index()].is_empty() {
            let seed = self.fallback(tier, kind);
            self.queues[tier.index()][kind.index()] = seed;
        }
        let queue = &mut self.queues[tier.index()][kind.index()];
        if queue.is_empty() {
            return;
        }
        while queue.len() < SUPPLY_FLOOR {
            queue.shuffle(&mut self.rng);
            let copy = queue.clone();
            queue.extend(copy);
        }
        queue.shuffle(&mut self.rng);
    }

    pub fn draw(&mut self, tier: Tier, kind: AttackKind) -> Result<AttackRecord> {
        if self.queues[tier.index()][kind.index()].is_empty() {
            self.ensure_supply(tier, kind);
        }
        self.queues[tier.index()][kind.index()]
            .pop()
            .ok_or(RandomiserError::PoolExhaustion { tier, kind })
    }

    /// Damage with probability `DAMAGE_BIAS`, otherwise non-damage.
    pub fn draw_biased(&mut self, tier: Tier) -> Result<AttackRecord> {
        let kind = if self.rng.gen_bool(DAMAGE_BIAS) {
            AttackKind::Damage
        } else {
            AttackKind::NonDamage
        };
        self.draw(tier, kind)
    }

    /// Resolve the two attack slots of a card of `tier` and `color`.
    ///
    /// A lone empty slot is kept as is in its position. An empty first slot
    /// pairs with a damage attack, since the empty record counts as
    /// non-damage. Otherwise the result holds two populated attacks, the
    /// cheaper one first.
    pub fn assign_two_attacks(
        &mut self,
        slots: [AttackRecord; 2],
        tier: Tier,
        color: &str,
    ) -> Result<[AttackRecord; 2]> {
        let [first, second] = slots;
        match (first.is_empty(), second.is_empty()) {
            (false, false) => {
                let a = self.draw_biased(tier)?.recolored(color);
                let b = self.draw(tier, a.kind().opposite())?.recolored(color);
                Ok(weaker_first(a, b))
            }
            (true, false) => {
                let b = self.draw(tier, first.kind().opposite())?.recolored(color);
                Ok([first, b])
            }
            (false, true) => Ok([self.draw_biased(tier)?.recolored(color), second]),
            (true, true) => {
                let a = self.draw_biased(tier)?.recolored(color);
                let b = match a.kind() {
                    AttackKind::NonDamage => AttackRecord::tier_default(tier),
                    AttackKind::Damage => self.draw(tier, AttackKind::NonDamage)?.recolored(color),
                };
                Ok(weaker_first(a, b))
            }
        }
    }
}

fn weaker_first(a: AttackRecord, b: AttackRecord) -> [AttackRecord; 2] {
    if (a.total_cost(), a.damage) > (b.total_cost(), b.damage) {
        [b, a]
    } else {
        [a, b]
    }
}

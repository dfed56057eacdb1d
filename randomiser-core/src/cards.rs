use std::collections::HashMap;

use crate::asm::{card_label, energy_pairs, energy_tokens, operand, split_comment};
use crate::{RandomiserError, Result};

pub const COLORLESS: &str = "COLORLESS";

pub const ENERGY_LIMIT: u32 = 60;
pub const TERMINAL_STAGE2_LIMIT: u32 = 1;
pub const EVOLVING_BASIC_LIMIT: u32 = 4;
pub const DEFAULT_LIMIT: u32 = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CardType {
    Pokemon,
    Energy,
    Trainer,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Stage {
    Basic,
    Stage1,
    Stage2,
    None,
}

impl Stage {
    fn from_token(token: &str) -> Stage {
        match token {
            "BASIC" => Stage::Basic,
            "STAGE1" => Stage::Stage1,
            "STAGE2" => Stage::Stage2,
            _ => Stage::None,
        }
    }

    pub fn is_evolution(self) -> bool {
        matches!(self, Stage::Stage1 | Stage::Stage2)
    }
}

/// Evolution category used to bucket attacks and look up stat ranges.
/// The discriminants index the stat tables.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Tier {
    BasicNoEvolution = 0,
    BasicOneEvolution = 1,
    Stage1OfOne = 2,
    BasicTwoEvolutions = 3,
    Stage1OfTwo = 4,
    Stage2 = 5,
}

impl Tier {
    pub const ALL: [Tier; 6] = [
        Tier::BasicNoEvolution,
        Tier::BasicOneEvolution,
        Tier::Stage1OfOne,
        Tier::BasicTwoEvolutions,
        Tier::Stage1OfTwo,
        Tier::Stage2,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn stage(self) -> Stage {
        match self {
            Tier::BasicNoEvolution | Tier::BasicOneEvolution | Tier::BasicTwoEvolutions => {
                Stage::Basic
            }
            Tier::Stage1OfOne | Tier::Stage1OfTwo => Stage::Stage1,
            Tier::Stage2 => Stage::Stage2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Card {
    /// 1-based declaration order. Also the arena slot plus one.
    pub id: u32,
    pub label: String,
    pub name: String,
    pub constant: String,
    pub group: u32,
    pub card_type: CardType,
    /// Pokémon type color or energy color; `None` for trainers.
    pub color: Option<String>,
    pub stage: Stage,
    /// Color to count, accumulated over every energy line of the record in
    /// first-seen order.
    pub energy: Vec<(String, u32)>,
    pub uses_attacks: bool,
    pub limit: u32,
    pub has_evolution: bool,
    pub pre_evolution: Option<usize>,
}

impl Card {
    fn new(id: u32, label: &str) -> Self {
        Card {
            id,
            label: label.to_string(),
            name: String::new(),
            constant: String::new(),
            group: id,
            card_type: CardType::Trainer,
            color: None,
            stage: Stage::None,
            energy: Vec::new(),
            uses_attacks: false,
            limit: DEFAULT_LIMIT,
            has_evolution: false,
            pre_evolution: None,
        }
    }

    fn index(&self) -> usize {
        self.id as usize - 1
    }

    fn add_energy(&mut self, color: &str, count: u32) {
        if let Some((_, total)) = self.energy.iter_mut().find(|(c, _)| c == color) {
            *total += count;
        } else {
            self.energy.push((color.to_string(), count));
        }
    }
}

/// Every card of the corpus, stored in declaration order and linked to its
/// pre-evolution by arena index.
#[derive(Debug, Clone)]
pub struct CardGraph {
    cards: Vec<Card>,
    by_label: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    by_constant: HashMap<String, usize>,
    evolutions: Vec<Vec<usize>>,
    /// Pre-evolution display names awaiting resolution, one per card.
    pending: Vec<Option<String>>,
}

impl CardGraph {
    /// Parse a corpus and resolve its evolution groups.
    pub fn build(corpus: &str) -> Result<Self> {
        let mut graph = Self::parse(corpus)?;
        graph.resolve_groups()?;
        Ok(graph)
    }

    fn parse(corpus: &str) -> Result<Self> {
        let mut graph = CardGraph {
            cards: Vec::new(),
            by_label: HashMap::new(),
            by_name: HashMap::new(),
            by_constant: HashMap::new(),
            evolutions: Vec::new(),
            pending: Vec::new(),
        };

        for (idx, line) in corpus.lines().enumerate() {
            let line_no = idx + 1;

            if let Some(label) = card_label(line) {
                if graph.by_label.contains_key(label) {
                    return Err(RandomiserError::Corpus {
                        line: line_no,
                        message: format!("duplicate card label {}", label),
                    });
                }
                let id = graph.cards.len() as u32 + 1;
                graph.by_label.insert(label.to_string(), graph.cards.len());
                graph.cards.push(Card::new(id, label));
                graph.pending.push(None);
                continue;
            }

            let Some(card) = graph.cards.last_mut() else {
                continue;
            };
            let (code, tag) = split_comment(line);
            let Some(tag) = tag else {
                continue;
            };
            let value = operand(code);

            match tag {
                "type" => {
                    let (card_type, color) = parse_card_type(value).ok_or_else(|| {
                        RandomiserError::Corpus {
                            line: line_no,
                            message: format!("unknown card type '{}'", value),
                        }
                    })?;
                    card.card_type = card_type;
                    card.color = color;
                }
                "name" if card.name.is_empty() => {
                    card.name = value.to_string();
                }
                "stage" => card.stage = Stage::from_token(value),
                "id" => card.constant = value.to_string(),
                "pre-evo name" => {
                    let slot = graph.pending.len() - 1;
                    graph.pending[slot] = match value {
                        "" | "NONE" => None,
                        name => Some(name.to_string()),
                    };
                }
                "energies" => {
                    let pairs = energy_pairs(value).map_err(|message| RandomiserError::Corpus {
                        line: line_no,
                        message,
                    })?;
                    for (color, count) in pairs {
                        card.add_energy(color, count);
                    }
                    if energy_tokens(value).len() >= 2 {
                        card.uses_attacks = true;
                    }
                }
                _ => {}
            }
        }

        for idx in 0..graph.cards.len() {
            if graph.cards[idx].constant.is_empty() {
                graph.cards[idx].constant = constant_from_label(&graph.cards[idx].label);
            }
            let card = &graph.cards[idx];
            if !card.name.is_empty() {
                graph.by_name.entry(card.name.clone()).or_insert(idx);
            }
            graph.by_constant.entry(card.constant.clone()).or_insert(idx);
        }
        graph.evolutions = vec![Vec::new(); graph.cards.len()];

        Ok(graph)
    }

    /// Link every evolution card to its pre-evolution, then give each card
    /// the group of its chain root and its legal copy limit.
    pub fn resolve_groups(&mut self) -> Result<()> {
        for idx in 0..self.cards.len() {
            if !self.cards[idx].stage.is_evolution() {
                continue;
            }
            let Some(name) = self.pending[idx].take() else {
                if self.cards[idx].pre_evolution.is_some() {
                    continue;
                }
                return Err(RandomiserError::MissingCardReference(format!(
                    "{} evolves from nothing",
                    self.cards[idx].label
                )));
            };
            let parent = *self
                .by_name
                .get(&name)
                .ok_or_else(|| RandomiserError::MissingCardReference(name.clone()))?;
            if parent == idx {
                return Err(RandomiserError::MissingCardReference(format!(
                    "{} evolves from itself",
                    self.cards[idx].label
                )));
            }
            self.cards[idx].pre_evolution = Some(parent);
            self.cards[parent].has_evolution = true;
            self.evolutions[parent].push(idx);
        }
        for list in &mut self.evolutions {
            list.sort_unstable();
            list.dedup();
        }

        for idx in 0..self.cards.len() {
            let root = self.chain_root(idx)?;
            self.cards[idx].group = self.cards[root].id;
        }

        for card in &mut self.cards {
            card.limit = match (card.card_type, card.stage) {
                (CardType::Energy, _) => ENERGY_LIMIT,
                (CardType::Pokemon, Stage::Stage2) if !card.has_evolution => {
                    TERMINAL_STAGE2_LIMIT
                }
                (CardType::Pokemon, Stage::Basic) if card.has_evolution => EVOLVING_BASIC_LIMIT,
                _ => DEFAULT_LIMIT,
            };
        }

        Ok(())
    }

    fn chain_root(&self, start: usize) -> Result<usize> {
        let mut current = start;
        let mut steps = 0usize;
        while let Some(parent) = self.cards[current].pre_evolution {
            current = parent;
            steps += 1;
            if steps > self.cards.len() {
                return Err(RandomiserError::MissingCardReference(format!(
                    "evolution cycle through {}",
                    self.cards[start].label
                )));
            }
        }
        Ok(current)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn by_label(&self, label: &str) -> Option<&Card> {
        self.by_label.get(label).map(|&i| &self.cards[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&Card> {
        self.by_name.get(name).map(|&i| &self.cards[i])
    }

    pub fn by_constant(&self, constant: &str) -> Option<&Card> {
        self.by_constant.get(constant).map(|&i| &self.cards[i])
    }

    pub fn pre_evolution_of(&self, card: &Card) -> Option<&Card> {
        card.pre_evolution.map(|i| &self.cards[i])
    }

    pub fn evolutions_of(&self, card: &Card) -> impl Iterator<Item = &Card> {
        self.evolutions[card.index()].iter().map(move |&i| &self.cards[i])
    }

    pub fn by_type(&self, card_type: CardType) -> Vec<&Card> {
        self.cards.iter().filter(|c| c.card_type == card_type).collect()
    }

    /// Pokémon that do (or do not) evolve into something.
    pub fn by_evolution_status(&self, has_evolution: bool) -> Vec<&Card> {
        self.pokemon()
            .filter(|c| c.has_evolution == has_evolution)
            .collect()
    }

    pub fn by_stage(&self, stage: Stage) -> Vec<&Card> {
        self.pokemon().filter(|c| c.stage == stage).collect()
    }

    pub fn by_energy_color(&self, color: &str) -> Vec<&Card> {
        self.pokemon()
            .filter(|c| c.color.as_deref() == Some(color))
            .collect()
    }

    /// Cards whose attacks only ever ask for colorless energy.
    pub fn colorless_single_energy(&self) -> Vec<&Card> {
        self.cards
            .iter()
            .filter(|c| c.energy.len() == 1 && c.energy[0].0 == COLORLESS)
            .collect()
    }

    fn pokemon(&self) -> impl Iterator<Item = &Card> {
        self.cards
            .iter()
            .filter(|c| c.card_type == CardType::Pokemon)
    }

    pub fn tier(&self, card: &Card) -> Tier {
        if card.card_type != CardType::Pokemon {
            return Tier::BasicNoEvolution;
        }
        let first_evolution = self.evolutions_of(card).next();
        let evolves_twice = first_evolution
            .map(|evo| self.evolutions_of(evo).next().is_some())
            .unwrap_or(false);

        match card.stage {
            Stage::Basic if evolves_twice => Tier::BasicTwoEvolutions,
            Stage::Basic if first_evolution.is_some() => Tier::BasicOneEvolution,
            Stage::Basic | Stage::None => Tier::BasicNoEvolution,
            Stage::Stage1 if first_evolution.is_some() => Tier::Stage1OfTwo,
            Stage::Stage1 => Tier::Stage1OfOne,
            Stage::Stage2 => Tier::Stage2,
        }
    }
}

fn parse_card_type(token: &str) -> Option<(CardType, Option<String>)> {
    if let Some(color) = token.strip_prefix("TYPE_PKMN_") {
        return Some((CardType::Pokemon, Some(color.to_string())));
    }
    if token == "TYPE_ENERGY_DOUBLE_COLORLESS" {
        return Some((CardType::Energy, Some(COLORLESS.to_string())));
    }
    if let Some(color) = token.strip_prefix("TYPE_ENERGY_") {
        return Some((CardType::Energy, Some(color.to_string())));
    }
    if token.starts_with("TYPE_TRAINER") {
        return Some((CardType::Trainer, None));
    }
    None
}

/// `MrMimeCard` -> `MR_MIME`.
fn constant_from_label(label: &str) -> String {
    let base = label.strip_suffix("Card").unwrap_or(label);
    let mut out = String::with_capacity(base.len() + 4);
    let mut prev_lower = false;
    for ch in base.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_uppercase());
    }
    out
}

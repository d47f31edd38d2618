//! The project document: the in-memory shape the persistence layer
//! (de)serializes.
//!
//! The byte format is the host's business; this module only guarantees that
//! `capture` followed by `into_roster` reproduces the same characters (ids,
//! order, sprites, positions, reset points, facing) and the same rule lists.
//!
//! Loading revalidates everything, because a document may have been edited by
//! hand or written by an older editor. A document that fails validation is
//! rejected as a whole.
//!
//! # Example
//!
//! ```
//! use rulegrid_world::prelude::*;
//!
//! let config = SimulationConfig::default();
//! let mut roster = Roster::new(config.grid);
//! let hero = roster.spawn(CharacterDraft::new("hero")).unwrap();
//! roster.place(hero, 2, 3).unwrap();
//!
//! let doc = ProjectDocument::capture(&config, &roster);
//! let json = serde_json::to_string(&doc).unwrap();
//! let back: ProjectDocument = serde_json::from_str(&json).unwrap();
//! let (_, loaded) = back.into_roster().unwrap();
//! assert_eq!(loaded.character(hero).unwrap().position, Some(Position::new(2, 3)));
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::character::{Character, CharacterId, IdAllocator};
use crate::config::SimulationConfig;
use crate::grid::Position;
use crate::roster::Roster;
use crate::rule::Rule;
use crate::WorldError;

/// The ordered rule list of one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleList {
    pub owner: CharacterId,
    pub rules: Vec<Rule>,
}

/// A complete, serializable project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub config: SimulationConfig,
    /// Characters in processing order.
    pub characters: Vec<Character>,
    /// Rule lists, in character processing order. Characters without rules
    /// are omitted.
    pub rules: Vec<RuleList>,
    /// The id the next authored rule will receive.
    pub next_rule_id: u64,
    /// Id allocator state, so ids issued after a load match the ones the
    /// saved project would have issued.
    pub ids: IdAllocator,
}

impl ProjectDocument {
    /// Capture `roster` under `config`. The roster's grid wins over
    /// `config.grid`.
    pub fn capture(config: &SimulationConfig, roster: &Roster) -> Self {
        let characters: Vec<Character> = roster.characters().cloned().collect();
        let rules = characters
            .iter()
            .filter(|c| !roster.rules(c.id).is_empty())
            .map(|c| RuleList {
                owner: c.id,
                rules: roster.rules(c.id).to_vec(),
            })
            .collect();
        Self {
            config: SimulationConfig {
                grid: roster.grid(),
                ..config.clone()
            },
            characters,
            rules,
            next_rule_id: roster.next_rule_id(),
            ids: roster.allocator().clone(),
        }
    }

    /// Validate the document and turn it into a live roster.
    pub fn into_roster(self) -> Result<(SimulationConfig, Roster), WorldError> {
        let grid = self.config.grid;
        grid.validate()?;

        let mut seen = HashSet::new();
        let mut slots: HashMap<u32, CharacterId> = HashMap::new();
        let mut exclusive: HashMap<Position, CharacterId> = HashMap::new();
        let mut reserved: HashMap<Position, CharacterId> = HashMap::new();
        for c in &self.characters {
            if !seen.insert(c.id) {
                return Err(WorldError::DuplicateCharacter { id: c.id });
            }
            if let Some(&first) = slots.get(&c.id.index()) {
                return Err(WorldError::SlotCollision {
                    first,
                    second: c.id,
                });
            }
            slots.insert(c.id.index(), c.id);
            if c.position.is_some() != c.initial_position.is_some() {
                return Err(WorldError::HalfPlaced { id: c.id });
            }
            let square = c.pixels.is_empty()
                || (c.pixels.len() == c.size as usize
                    && c.pixels.iter().all(|row| row.len() == c.size as usize));
            if !square {
                return Err(WorldError::SpriteShape { size: c.size });
            }
            for pos in [c.position, c.initial_position].into_iter().flatten() {
                if !grid.contains(pos) {
                    return Err(WorldError::OutOfBounds {
                        x: pos.x,
                        y: pos.y,
                        width: grid.width,
                        height: grid.height,
                    });
                }
            }
            if let (Some(pos), false) = (c.position, c.allow_overlap) {
                if let Some(&occupant) = exclusive.get(&pos) {
                    return Err(WorldError::CellOccupied {
                        x: pos.x,
                        y: pos.y,
                        occupant,
                    });
                }
                exclusive.insert(pos, c.id);
            }
            if let (Some(pos), false) = (c.initial_position, c.allow_overlap) {
                if let Some(&owner) = reserved.get(&pos) {
                    return Err(WorldError::ReservedCell {
                        x: pos.x,
                        y: pos.y,
                        owner,
                    });
                }
                reserved.insert(pos, c.id);
            }
        }
        let ids: Vec<CharacterId> = self.characters.iter().map(|c| c.id).collect();
        self.ids.check_live(&ids)?;

        let mut next_rule_id = self.next_rule_id.max(1);
        let mut rule_ids = HashSet::new();
        let mut rules: HashMap<CharacterId, Vec<Rule>> = HashMap::new();
        for list in self.rules {
            if !seen.contains(&list.owner) {
                return Err(WorldError::UnknownCharacter { id: list.owner });
            }
            for rule in &list.rules {
                rule.validate()?;
                if !rule_ids.insert(rule.id) {
                    return Err(WorldError::DuplicateRule { rule: rule.id });
                }
                let after = rule
                    .id
                    .0
                    .checked_add(1)
                    .ok_or(WorldError::RuleIdsExhausted)?;
                next_rule_id = next_rule_id.max(after);
            }
            rules.entry(list.owner).or_default().extend(list.rules);
        }

        tracing::debug!(
            characters = self.characters.len(),
            rules = rule_ids.len(),
            "project document validated"
        );

        let roster = Roster::from_parts(grid, self.ids, self.characters, rules, next_rule_id);
        Ok((self.config, roster))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

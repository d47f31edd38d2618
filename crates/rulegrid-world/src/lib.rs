//! Rulegrid World -- grid, characters, rules, and occupancy for the rule
//! simulation.
//!
//! This crate is the data model of a "place characters on a grid, define
//! before/after pattern rules, run the simulation" game. It holds no clock and
//! evaluates no triggers; that is the job of `rulegrid-engine`.
//!
//! - [`grid`]: bounded coordinate space.
//! - [`character`]: generational character ids and character data.
//! - [`template`] / [`rule`]: 3×3 patterns and the rules built from them.
//! - [`roster`]: the store owning characters and their ordered rule lists.
//! - [`spatial`]: per-tick occupancy cache with range and line-of-sight
//!   queries.
//! - [`document`]: the serializable project shape.
//!
//! # Quick Start
//!
//! ```
//! use rulegrid_world::prelude::*;
//!
//! let grid = Grid::new(8, 8).unwrap();
//! let mut roster = Roster::new(grid);
//! let hero = roster.spawn(CharacterDraft::new("hero")).unwrap();
//! roster.place(hero, 3, 3).unwrap();
//!
//! roster
//!     .add_rule(
//!         hero,
//!         RuleDraft::new(
//!             Trigger::Always,
//!             &Template::surrounded_by_nothing(),
//!             &Template::actor_at(Offset::new(1, 0)),
//!         ),
//!     )
//!     .unwrap();
//!
//! let index = SpatialIndex::build(grid, &roster);
//! assert_eq!(index.occupants_at(3, 3)[0].id, hero);
//! ```

#![deny(unsafe_code)]

pub mod character;
pub mod config;
pub mod document;
pub mod grid;
pub mod roster;
pub mod rule;
pub mod spatial;
pub mod template;

use character::CharacterId;
use rule::RuleId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Caller-misuse errors. Every operation returning one leaves the world
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("position ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    #[error("cell ({x}, {y}) is occupied by character {occupant}, which does not allow overlap")]
    CellOccupied {
        x: i32,
        y: i32,
        occupant: CharacterId,
    },

    #[error("character {id} does not exist (removed or never created)")]
    UnknownCharacter { id: CharacterId },

    #[error("character {owner} has no {rule}")]
    UnknownRule { owner: CharacterId, rule: RuleId },

    #[error("template must be 3x3, got {rows} rows of up to {cols} cells")]
    MalformedTemplate { rows: usize, cols: usize },

    #[error("proximity range must be at least 1, got {range}")]
    InvalidProximity { range: u32 },

    #[error("key-press trigger needs a non-empty key")]
    EmptyTriggerKey,

    #[error("template marks the acting character {count} times, at most one is allowed")]
    MultipleActorCells { count: usize },

    #[error("the center of a before-template must be the acting character")]
    ActorNotAtCenter,

    #[error("index {index} out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("grid dimensions {width}x{height} are not usable")]
    InvalidGrid { width: u32, height: u32 },

    #[error("sprite pixels must form a {size}x{size} square")]
    SpriteShape { size: u32 },

    #[error("character {id} would be left outside a {width}x{height} grid")]
    StrandedCharacter { id: CharacterId, width: u32, height: u32 },

    #[error("character {id} appears more than once in the document")]
    DuplicateCharacter { id: CharacterId },

    #[error("{rule} appears more than once in the document")]
    DuplicateRule { rule: RuleId },

    #[error("cell ({x}, {y}) is the reset point of character {owner}, which does not allow overlap")]
    ReservedCell { x: i32, y: i32, owner: CharacterId },

    #[error("characters {first} and {second} share id slot {}", .first.index())]
    SlotCollision {
        first: CharacterId,
        second: CharacterId,
    },

    #[error("character {id} has a position without a reset point, or the reverse")]
    HalfPlaced { id: CharacterId },

    #[error("id allocator state is inconsistent: {details}")]
    InconsistentIds { details: String },

    #[error("rule ids are exhausted")]
    RuleIdsExhausted,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::character::{Character, CharacterDraft, CharacterId, Direction};
    pub use crate::config::{clamp_speed, SimulationConfig, MAX_SPEED_MS, MIN_SPEED_MS};
    pub use crate::document::{ProjectDocument, RuleList};
    pub use crate::grid::{Grid, Offset, Position};
    pub use crate::roster::Roster;
    pub use crate::rule::{Rule, RuleDraft, RuleId, Trigger};
    pub use crate::spatial::{Occupant, SpatialIndex};
    pub use crate::template::{Cell, Template};
    pub use crate::WorldError;
}

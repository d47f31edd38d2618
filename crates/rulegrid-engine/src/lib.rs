//! Rulegrid Engine -- host-driven tick loop for the rule simulation.
//!
//! This crate builds on [`rulegrid_world`] to run the simulation: a clock
//! paced by host timestamps, trigger evaluation against live input, structural
//! pattern matching, and first-match rule resolution with sequential commit.
//!
//! - [`trigger`]: input state, shared timer, and trigger checks.
//! - [`pattern`]: `before` template matching.
//! - [`resolve`]: picks and applies at most one rule per character per tick.
//! - [`clock`]: running flag, speed, and tick counter.
//! - [`simulation`]: the [`Simulation`](simulation::Simulation) the host talks to.
//! - [`snapshot`] / [`replay`]: hashed snapshots and deterministic replay.
//!
//! # Quick Start
//!
//! ```
//! use rulegrid_engine::prelude::*;
//!
//! let mut sim = Simulation::default();
//! let hero = sim.spawn(CharacterDraft::new("hero")).unwrap();
//! sim.place(hero, 3, 3).unwrap();
//! sim.add_rule(
//!     hero,
//!     RuleDraft::new(
//!         Trigger::key_press("ArrowDown"),
//!         &Template::surrounded_by_nothing(),
//!         &Template::actor_at(Offset::new(0, 1)),
//!     ),
//! )
//! .unwrap();
//!
//! sim.start(0);
//! sim.on_key_down("ArrowDown");
//! let report = sim.tick(500).unwrap();
//! assert!(report.resolution_for(hero).unwrap().moved());
//! assert_eq!(sim.character(hero).unwrap().direction, Direction::Down);
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod pattern;
pub mod replay;
pub mod resolve;
pub mod simulation;
pub mod snapshot;
pub mod trigger;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the world crate for convenience.
pub use rulegrid_world;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use rulegrid_world::prelude::*;

    pub use crate::clock::SimulationClock;
    pub use crate::replay::{
        replay, HostCall, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::resolve::{resolve, BlockReason, Outcome, Resolution};
    pub use crate::simulation::{Simulation, TickReport};
    pub use crate::snapshot::SimulationSnapshot;
    pub use crate::trigger::{InputState, SharedTimer, TriggerEvaluator};
}

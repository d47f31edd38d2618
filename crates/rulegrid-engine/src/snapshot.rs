//! Simulation snapshot and restore with BLAKE3 hashing.
//!
//! A [`SimulationSnapshot`] is the full simulation state (project document,
//! clock, input and timer) plus a BLAKE3 digest of it. Snapshots back the
//! host's undo/redo and let two runs be compared cheaply by hash.
//!
//! ```
//! use rulegrid_engine::prelude::*;
//!
//! let mut sim = Simulation::default();
//! let hero = sim.spawn(CharacterDraft::new("hero")).unwrap();
//! sim.place(hero, 0, 0).unwrap();
//! sim.add_rule(
//!     hero,
//!     RuleDraft::new(
//!         Trigger::Always,
//!         &Template::surrounded_by_nothing(),
//!         &Template::actor_at(Offset::new(1, 0)),
//!     ),
//! )
//! .unwrap();
//!
//! let snapshot = sim.capture_snapshot();
//! assert_eq!(snapshot.hash.len(), 64);
//!
//! sim.start(0);
//! sim.tick(sim.speed()).unwrap();
//! assert_ne!(sim.state_hash(), snapshot.hash);
//!
//! sim.restore_from_snapshot(&snapshot).unwrap();
//! assert_eq!(sim.state_hash(), snapshot.hash);
//! assert_eq!(sim.character(hero).unwrap().position, Some(Position::new(0, 0)));
//! ```
//!
//! # What Is NOT Serialized
//!
//! - **Spatial index**: a cache, rebuilt from the restored roster.
//! - **In-pass marker** of the trigger evaluator: snapshots are only taken
//!   between ticks.

use rulegrid_world::config::{clamp_speed, SimulationConfig};
use rulegrid_world::document::ProjectDocument;
use rulegrid_world::spatial::SpatialIndex;
use serde::{Deserialize, Serialize};

use crate::clock::SimulationClock;
use crate::simulation::Simulation;
use crate::trigger::TriggerEvaluator;

// ---------------------------------------------------------------------------
// SimulationSnapshot
// ---------------------------------------------------------------------------

/// A serializable snapshot of the full simulation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Characters, rules, and configuration.
    pub document: ProjectDocument,
    /// Running flag, speed, last tick, tick counter.
    pub clock: SimulationClock,
    /// Held keys, pending click, and shared timer.
    pub triggers: TriggerEvaluator,
    /// BLAKE3 hex digest (64 lowercase hex chars) of the three fields above.
    pub hash: String,
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

fn compute_hash(
    document: &ProjectDocument,
    clock: &SimulationClock,
    triggers: &TriggerEvaluator,
) -> String {
    #[derive(Serialize)]
    struct HashableState<'a> {
        document: &'a ProjectDocument,
        clock: &'a SimulationClock,
        triggers: &'a TriggerEvaluator,
    }

    let json_bytes = serde_json::to_vec(&HashableState {
        document,
        clock,
        triggers,
    })
    .expect("simulation state should always be JSON-serializable");

    blake3::hash(&json_bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Simulation snapshot/restore methods
// ---------------------------------------------------------------------------

impl Simulation {
    /// Capture the complete simulation state.
    pub fn capture_snapshot(&self) -> SimulationSnapshot {
        let document = self.to_document();
        let hash = compute_hash(&document, &self.clock, &self.triggers);
        SimulationSnapshot {
            document,
            clock: self.clock.clone(),
            triggers: self.triggers.clone(),
            hash,
        }
    }

    /// Restore a previously captured state.
    ///
    /// The hash is verified and the document revalidated before anything is
    /// touched, so on error the simulation is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the hash does not match the snapshot's contents
    /// (corruption or tampering), if the recorded speed is outside the allowed
    /// bounds, or if the document fails validation.
    pub fn restore_from_snapshot(
        &mut self,
        snapshot: &SimulationSnapshot,
    ) -> Result<(), anyhow::Error> {
        let expected_hash = compute_hash(&snapshot.document, &snapshot.clock, &snapshot.triggers);
        if expected_hash != snapshot.hash {
            tracing::warn!(
                recorded = %snapshot.hash,
                recomputed = %expected_hash,
                "snapshot rejected"
            );
            return Err(anyhow::anyhow!(
                "snapshot hash mismatch: recorded {} but recomputed {}. \
                 The snapshot may be corrupted or tampered with.",
                snapshot.hash,
                expected_hash
            ));
        }

        let speed = snapshot.clock.speed();
        if clamp_speed(speed) != speed {
            return Err(anyhow::anyhow!(
                "snapshot has invalid speed: {speed} ms is outside the allowed range"
            ));
        }

        let (config, roster): (SimulationConfig, _) = snapshot
            .document
            .clone()
            .into_roster()
            .map_err(|e| anyhow::anyhow!("failed to restore project from snapshot: {e}"))?;

        self.index = SpatialIndex::build(roster.grid(), &roster);
        self.roster = roster;
        self.config = SimulationConfig {
            speed_ms: speed,
            ..config
        };
        self.clock = snapshot.clock.clone();
        self.triggers = snapshot.triggers.clone();

        tracing::debug!(
            tick = self.clock.tick_count(),
            hash = %snapshot.hash,
            "snapshot restored"
        );
        Ok(())
    }

    /// BLAKE3 digest of the current state, equal to
    /// `capture_snapshot().hash`.
    pub fn state_hash(&self) -> String {
        compute_hash(&self.to_document(), &self.clock, &self.triggers)
    }

    /// Same as [`capture_snapshot`](Self::capture_snapshot), named for
    /// branching workflows where the snapshot marks a divergence point.
    pub fn fork_snapshot(&self) -> SimulationSnapshot {
        self.capture_snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

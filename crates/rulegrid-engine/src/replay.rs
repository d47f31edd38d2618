//! Deterministic replay of recorded host calls with checkpoint verification.
//!
//! Everything that can change a running simulation reaches it through a small
//! set of host calls: key presses, clicks, lifecycle calls, speed changes,
//! and `tick(now)`. A [`ReplayRecorder`] applies those calls to a
//! [`Simulation`] and writes them down together with periodic state-hash
//! checkpoints taken after executed ticks. [`replay`] restores the initial
//! snapshot of a [`ReplayLog`], feeds the same calls again, and reports the
//! first checkpoint whose hash differs.
//!
//! Authoring calls (spawn, place, rule edits) are not host calls; they belong
//! in the initial snapshot.
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
//!         Trigger::key_press("d"),
//!         &Template::surrounded_by_nothing(),
//!         &Template::actor_at(Offset::new(1, 0)),
//!     ),
//! )
//! .unwrap();
//!
//! let mut recorder = ReplayRecorder::new(sim.capture_snapshot(), 1);
//! recorder.apply(&mut sim, HostCall::Start { now: 0 });
//! recorder.apply(&mut sim, HostCall::KeyDown { key: "d".into() });
//! for now in [500, 1000, 1500] {
//!     recorder.apply(&mut sim, HostCall::Tick { now });
//! }
//! let log = recorder.finish();
//!
//! let mut fresh = Simulation::default();
//! let result = replay(&mut fresh, &log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! assert_eq!(fresh.character(hero).unwrap().position, Some(Position::new(3, 0)));
//! ```

use serde::{Deserialize, Serialize};

use crate::simulation::{Simulation, TickReport};
use crate::snapshot::SimulationSnapshot;

// ---------------------------------------------------------------------------
// HostCall
// ---------------------------------------------------------------------------

/// One call from the host into a running simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    /// [`Simulation::on_key_down`].
    KeyDown { key: String },
    /// [`Simulation::on_key_up`].
    KeyUp { key: String },
    /// [`Simulation::on_click`] on cell `(x, y)`.
    Click { x: i32, y: i32 },
    /// [`Simulation::start`] at host time `now`.
    Start { now: u64 },
    /// [`Simulation::stop`].
    Stop,
    /// [`Simulation::reset`].
    Reset,
    /// [`Simulation::set_speed`] with the requested, unclamped value.
    SetSpeed { ms: u64 },
    /// [`Simulation::tick`] at host time `now`. Recorded whether or not a
    /// tick was due.
    Tick { now: u64 },
}

impl HostCall {
    /// Apply the call. Returns the tick report for an executed tick.
    pub fn apply(&self, sim: &mut Simulation) -> Option<TickReport> {
        match self {
            HostCall::KeyDown { key } => sim.on_key_down(key),
            HostCall::KeyUp { key } => sim.on_key_up(key),
            HostCall::Click { x, y } => sim.on_click(*x, *y),
            HostCall::Start { now } => sim.start(*now),
            HostCall::Stop => sim.stop(),
            HostCall::Reset => sim.reset(),
            HostCall::SetSpeed { ms } => {
                sim.set_speed(*ms);
            }
            HostCall::Tick { now } => return sim.tick(*now),
        }
        None
    }
}

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// Initial snapshot plus the ordered calls and checkpoints that followed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Replay begins by restoring this snapshot.
    pub initial_snapshot: SimulationSnapshot,
    /// Number of `Call` entries. Checked against the entries on replay.
    pub total_calls: u64,
    /// Calls and checkpoints in recording order.
    pub entries: Vec<ReplayEntry>,
}

/// A single entry of a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// A host call, replayed as-is.
    Call(HostCall),
    /// State hash taken right after the preceding call executed tick `tick`.
    Checkpoint { tick: u64, state_hash: String },
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

/// The outcome of replaying a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Every call was replayed and every checkpoint matched.
    pub completed: bool,
    /// Calls applied before replay finished or stopped at a divergence.
    pub calls_replayed: u64,
    /// How many of those calls executed a tick.
    pub ticks_executed: u64,
    /// `None` if all checkpoints matched.
    pub first_divergence: Option<ReplayDivergence>,
}

/// A checkpoint whose replayed hash differs from the recorded one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    /// Tick number of the mismatching checkpoint.
    pub tick: u64,
    /// Hash stored in the log.
    pub expected_hash: String,
    /// Hash of the replayed state at the same point.
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records host calls into a [`ReplayLog`].
///
/// A checkpoint is written after every executed tick whose number is a
/// multiple of `checkpoint_interval`; an interval of 0 disables automatic
/// checkpoints.
pub struct ReplayRecorder {
    log: ReplayLog,
    checkpoint_interval: u64,
}

impl ReplayRecorder {
    pub fn new(snapshot: SimulationSnapshot, checkpoint_interval: u64) -> Self {
        Self {
            log: ReplayLog {
                initial_snapshot: snapshot,
                total_calls: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
        }
    }

    /// Apply `call` to `sim` and record it.
    pub fn apply(&mut self, sim: &mut Simulation, call: HostCall) -> Option<TickReport> {
        let report = call.apply(sim);
        self.log.entries.push(ReplayEntry::Call(call));
        self.log.total_calls += 1;

        if let Some(report) = &report {
            if self.checkpoint_interval != 0 && report.tick % self.checkpoint_interval == 0 {
                self.checkpoint(sim);
            }
        }
        report
    }

    /// Write a checkpoint of the current state, regardless of the interval.
    pub fn checkpoint(&mut self, sim: &Simulation) {
        self.log.entries.push(ReplayEntry::Checkpoint {
            tick: sim.tick_count(),
            state_hash: sim.state_hash(),
        });
    }

    pub fn finish(self) -> ReplayLog {
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay `log` on `sim`, verifying every checkpoint.
///
/// Replay stops at the first divergence and reports how far it got.
///
/// # Errors
///
/// Returns an error if the log is malformed (call count mismatch, checkpoint
/// ticks going backwards) or its initial snapshot cannot be restored. The log
/// is validated before `sim` is touched.
pub fn replay(sim: &mut Simulation, log: &ReplayLog) -> Result<ReplayResult, anyhow::Error> {
    let calls = log
        .entries
        .iter()
        .filter(|e| matches!(e, ReplayEntry::Call(_)))
        .count() as u64;
    if calls != log.total_calls {
        return Err(anyhow::anyhow!(
            "replay log declares {} calls but contains {calls}",
            log.total_calls
        ));
    }

    let mut last_checkpoint: Option<u64> = None;
    for entry in &log.entries {
        if let ReplayEntry::Checkpoint { tick, .. } = entry {
            if last_checkpoint.is_some_and(|prev| *tick < prev) {
                return Err(anyhow::anyhow!(
                    "replay log checkpoint at tick {tick} follows a later checkpoint"
                ));
            }
            last_checkpoint = Some(*tick);
        }
    }

    sim.restore_from_snapshot(&log.initial_snapshot)
        .map_err(|e| anyhow::anyhow!("failed to restore initial snapshot for replay: {e}"))?;

    let mut calls_replayed = 0;
    let mut ticks_executed = 0;
    for entry in &log.entries {
        match entry {
            ReplayEntry::Call(call) => {
                if call.apply(sim).is_some() {
                    ticks_executed += 1;
                }
                calls_replayed += 1;
            }
            ReplayEntry::Checkpoint { tick, state_hash } => {
                let actual_hash = sim.state_hash();
                if sim.tick_count() != *tick || actual_hash != *state_hash {
                    tracing::warn!(
                        tick,
                        replayed_tick = sim.tick_count(),
                        expected = %state_hash,
                        actual = %actual_hash,
                        "replay diverged"
                    );
                    return Ok(ReplayResult {
                        completed: false,
                        calls_replayed,
                        ticks_executed,
                        first_divergence: Some(ReplayDivergence {
                            tick: *tick,
                            expected_hash: state_hash.clone(),
                            actual_hash,
                        }),
                    });
                }
            }
        }
    }

    Ok(ReplayResult {
        completed: true,
        calls_replayed,
        ticks_executed,
        first_divergence: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

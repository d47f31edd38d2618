//! Trigger evaluation: does a rule's precondition hold for this character,
//! in this tick?
//!
//! The [`TriggerEvaluator`] owns the live input state (held keys, pending
//! click) and the shared timer. Each tick is one *evaluation pass*:
//!
//! 1. [`begin_pass`](TriggerEvaluator::begin_pass) decides whether the shared
//!    timer is due at `now`.
//! 2. [`evaluate`](TriggerEvaluator::evaluate) is called for candidate rules.
//! 3. [`end_pass`](TriggerEvaluator::end_pass) consumes the click and, if any
//!    timer rule fired, restarts the timer from `now`.
//!
//! # Shared timer
//!
//! All `Timer` rules of a simulation share a single timer, so every timer rule
//! fires in the same passes. This is a deliberate simplification; there is no
//! per-rule cadence.

use std::collections::BTreeSet;

use rulegrid_world::character::Character;
use rulegrid_world::grid::Position;
use rulegrid_world::rule::Trigger;
use rulegrid_world::spatial::SpatialIndex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// InputState
// ---------------------------------------------------------------------------

/// Raw input fed by the host between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    /// Held keys, lowercased.
    pressed: BTreeSet<String>,
    /// Last click not yet seen by an evaluation pass.
    click: Option<Position>,
}

impl InputState {
    /// Record a key press. Returns `false` if the key was already held.
    pub fn key_down(&mut self, key: &str) -> bool {
        self.pressed.insert(key.to_lowercase())
    }

    /// Record a key release. Returns `false` if the key was not held.
    pub fn key_up(&mut self, key: &str) -> bool {
        self.pressed.remove(&key.to_lowercase())
    }

    pub fn is_pressed(&self, key: &str) -> bool {
        self.pressed.contains(&key.to_lowercase())
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = &str> {
        self.pressed.iter().map(String::as_str)
    }

    /// Record a click. A later click before the next pass replaces it.
    pub fn click(&mut self, pos: Position) {
        self.click = Some(pos);
    }

    pub fn pending_click(&self) -> Option<Position> {
        self.click
    }

    /// Forget held keys and the pending click.
    pub fn clear(&mut self) {
        self.pressed.clear();
        self.click = None;
    }
}

// ---------------------------------------------------------------------------
// SharedTimer
// ---------------------------------------------------------------------------

/// The single timer behind every `Timer` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTimer {
    interval_ms: u64,
    /// When the timer last fired (or was restarted).
    reference: u64,
    /// Decided at the start of the current pass.
    due: bool,
    /// Whether a timer rule observed `due` during the current pass.
    fired: bool,
}

impl SharedTimer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            reference: 0,
            due: false,
            fired: false,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn reference(&self) -> u64 {
        self.reference
    }

    pub fn restart(&mut self, now: u64) {
        self.reference = now;
        self.due = false;
        self.fired = false;
    }
}

// ---------------------------------------------------------------------------
// TriggerEvaluator
// ---------------------------------------------------------------------------

/// Decides whether rule triggers fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvaluator {
    input: InputState,
    timer: SharedTimer,
    #[serde(skip)]
    in_pass: bool,
}

impl TriggerEvaluator {
    pub fn new(timer_interval_ms: u64) -> Self {
        Self {
            input: InputState::default(),
            timer: SharedTimer::new(timer_interval_ms),
            in_pass: false,
        }
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn timer(&self) -> &SharedTimer {
        &self.timer
    }

    /// Restart the shared timer from `now` (simulation start or reset).
    pub fn restart_timer(&mut self, now: u64) {
        self.timer.restart(now);
    }

    /// Open an evaluation pass at `now`.
    pub fn begin_pass(&mut self, now: u64) {
        debug_assert!(!self.in_pass, "begin_pass called twice without end_pass");
        self.in_pass = true;
        self.timer.due = now.saturating_sub(self.timer.reference) >= self.timer.interval_ms;
        self.timer.fired = false;
    }

    /// Close the pass: the click is consumed and a fired timer restarts.
    pub fn end_pass(&mut self, now: u64) {
        self.in_pass = false;
        self.input.click = None;
        if self.timer.fired {
            tracing::trace!(now, "shared timer fired");
            self.timer.restart(now);
        }
        self.timer.due = false;
    }

    /// Whether `trigger` holds for `actor` in the current pass.
    ///
    /// Spatial triggers never fire for an unplaced actor.
    pub fn evaluate(&mut self, trigger: &Trigger, actor: &Character, index: &SpatialIndex) -> bool {
        match trigger {
            Trigger::Always => true,
            Trigger::KeyPress { key } => self.input.is_pressed(key),
            Trigger::Collision { target } => actor.position.is_some_and(|pos| {
                index
                    .occupants_at(pos.x, pos.y)
                    .iter()
                    .filter(|o| o.id != actor.id)
                    .any(|o| target.as_ref().map_or(true, |kind| o.kind == *kind))
            }),
            Trigger::Proximity { range } => actor.position.is_some_and(|pos| {
                index
                    .characters_in_range(pos.x, pos.y, *range)
                    .iter()
                    .any(|o| o.id != actor.id)
            }),
            Trigger::Timer => {
                if self.timer.due {
                    self.timer.fired = true;
                }
                self.timer.due
            }
            Trigger::Click => actor.position.is_some() && self.input.click == actor.position,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

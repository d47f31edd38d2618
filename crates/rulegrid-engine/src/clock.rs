//! Host-driven simulation clock.
//!
//! The clock owns no timer of its own. The host calls
//! [`Simulation::tick`](crate::simulation::Simulation::tick) with a monotonic
//! millisecond timestamp as often as it likes; the clock decides whether that
//! call is due (at least `speed_ms` since the previous executed tick) and
//! counts executed ticks.
//!
//! ```
//! use rulegrid_engine::clock::SimulationClock;
//!
//! let mut clock = SimulationClock::new(500);
//! assert!(!clock.is_due(10_000), "stopped clocks never tick");
//!
//! clock.start(1_000);
//! assert!(!clock.is_due(1_499));
//! assert!(clock.is_due(1_500));
//! assert_eq!(clock.advance(1_500), 1);
//! assert!(!clock.is_due(1_600));
//! ```

use rulegrid_world::config::clamp_speed;
use serde::{Deserialize, Serialize};

/// Running flag, pacing, and tick counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationClock {
    running: bool,
    /// Milliseconds between executed ticks, always within the speed bounds.
    speed_ms: u64,
    /// Timestamp of the last executed tick (or of `start`).
    last_tick: u64,
    /// Number of ticks executed since creation.
    tick_counter: u64,
}

impl SimulationClock {
    /// A stopped clock. `speed_ms` is clamped.
    pub fn new(speed_ms: u64) -> Self {
        Self {
            running: false,
            speed_ms: clamp_speed(speed_ms),
            last_tick: 0,
            tick_counter: 0,
        }
    }

    /// Start running. The first tick becomes due `speed_ms` after `now`.
    ///
    /// Returns `false` if the clock was already running, in which case the
    /// pacing reference is left alone.
    pub fn start(&mut self, now: u64) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.last_tick = now;
        true
    }

    /// Stop running. Returns `false` if the clock was already stopped.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Change the pacing. Returns the clamped value actually applied.
    pub fn set_speed(&mut self, ms: u64) -> u64 {
        self.speed_ms = clamp_speed(ms);
        self.speed_ms
    }

    pub fn speed(&self) -> u64 {
        self.speed_ms
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Whether a tick should execute at `now`.
    ///
    /// A timestamp earlier than the last tick (a host clock going backwards)
    /// is never due.
    pub fn is_due(&self, now: u64) -> bool {
        self.running && now.saturating_sub(self.last_tick) >= self.speed_ms
    }

    /// Record an executed tick at `now` and return its 1-based number.
    pub fn advance(&mut self, now: u64) -> u64 {
        self.last_tick = now;
        self.tick_counter += 1;
        self.tick_counter
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(rulegrid_world::config::SimulationConfig::default().speed_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rulegrid_world::config::{MAX_SPEED_MS, MIN_SPEED_MS};

    #[test]
    fn new_clock_is_stopped_and_clamped() {
        let clock = SimulationClock::new(5);
        assert!(!clock.is_running());
        assert_eq!(clock.speed(), MIN_SPEED_MS);
        assert_eq!(clock.tick_count(), 0);
    }

    #[test]
    fn set_speed_clamps_both_ends() {
        let mut clock = SimulationClock::default();
        assert_eq!(clock.set_speed(50), 100);
        assert_eq!(clock.set_speed(9999), 2000);
        assert_eq!(clock.set_speed(750), 750);
        assert_eq!(clock.set_speed(0), MIN_SPEED_MS);
        assert_eq!(clock.set_speed(u64::MAX), MAX_SPEED_MS);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut clock = SimulationClock::new(200);
        assert!(clock.start(100));
        assert!(!clock.start(900), "second start is a no-op");
        assert_eq!(clock.last_tick(), 100);

        assert!(clock.stop());
        assert!(!clock.stop());
        assert!(!clock.is_due(10_000));
    }

    #[test]
    fn pacing_is_measured_from_last_executed_tick() {
        let mut clock = SimulationClock::new(200);
        clock.start(0);
        assert!(!clock.is_due(199));
        assert!(clock.is_due(250));
        clock.advance(250);
        assert!(!clock.is_due(449));
        assert!(clock.is_due(450));
        assert_eq!(clock.advance(450), 2);
    }

    #[test]
    fn backwards_timestamps_are_never_due() {
        let mut clock = SimulationClock::new(100);
        clock.start(5_000);
        assert!(!clock.is_due(0));
    }
}

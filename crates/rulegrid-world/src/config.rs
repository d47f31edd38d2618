//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::grid::Grid;

/// Fastest allowed pacing, in milliseconds between ticks.
pub const MIN_SPEED_MS: u64 = 100;
/// Slowest allowed pacing, in milliseconds between ticks.
pub const MAX_SPEED_MS: u64 = 2000;

/// Clamp a requested tick interval into `[MIN_SPEED_MS, MAX_SPEED_MS]`.
#[inline]
pub fn clamp_speed(ms: u64) -> u64 {
    ms.clamp(MIN_SPEED_MS, MAX_SPEED_MS)
}

/// Configuration for one simulation run.
///
/// Travels inside the project document so a saved project reopens with the
/// same grid and pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub grid: Grid,
    /// Minimum milliseconds between ticks. Clamped on use.
    pub speed_ms: u64,
    /// Period of the shared timer that drives every `Timer` rule.
    pub timer_interval_ms: u64,
}

impl Default for SimulationConfig {
    /// 16×16 grid, a tick every 500 ms, timer rules once per second.
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            speed_ms: 500,
            timer_interval_ms: 1000,
        }
    }
}

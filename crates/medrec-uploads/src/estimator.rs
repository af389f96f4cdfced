//! Estimated progress for local uploads, which report none of their own.

use std::time::Duration;

pub const DEFAULT_TICK: Duration = Duration::from_millis(200);
pub const DEFAULT_CEILING: u8 = 89;
pub const DEFAULT_STEP_FRACTION: f32 = 0.15;

/// Cosmetic progress for transports that report none.
///
/// Each tick closes a fixed fraction of the gap to `ceiling`, so the estimate
/// slows down as it approaches it and never reaches 90%. Completion is only
/// ever signalled by the real response.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEstimator {
    pub tick: Duration,
    pub ceiling: u8,
    pub step_fraction: f32,
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            ceiling: DEFAULT_CEILING,
            step_fraction: DEFAULT_STEP_FRACTION,
        }
    }
}

impl ProgressEstimator {
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn next(&self, current: u8) -> u8 {
        let ceiling = self.ceiling.min(DEFAULT_CEILING);
        if current >= ceiling {
            return current;
        }
        let gap = f32::from(ceiling - current);
        let step = ((gap * self.step_fraction).ceil() as u8).max(1);
        current.saturating_add(step).min(ceiling)
    }
}

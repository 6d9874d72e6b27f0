//! Pacing between page loads
//!
//! This module decides how long the harvest loop rests:
//! - A short jittered delay after every page
//! - Extra time after a skipped page or a session recycle
//! - A long pause every N pages

use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;

/// Returns a uniformly random duration in `[min, max]`
///
/// `max` below `min` is treated as `min`.
pub fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Computes the delays of the harvest loop
#[derive(Debug, Clone)]
pub struct Pacer {
    config: PacingConfig,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    /// Delay after a committed page
    pub fn page_delay(&self) -> Duration {
        random_between(
            Duration::from_millis(self.config.min_delay_ms),
            Duration::from_millis(self.config.max_delay_ms),
        )
    }

    /// Delay after a page that was skipped
    pub fn failure_delay(&self) -> Duration {
        self.page_delay() + Duration::from_millis(self.config.failure_extra_delay_ms)
    }

    /// Extra delay after a session recycle
    pub fn recycle_delay(&self) -> Duration {
        Duration::from_millis(self.config.recycle_extra_delay_ms)
    }

    /// Returns true if a long pause is due after `page`
    pub fn long_pause_due(&self, page: u32) -> bool {
        let every = self.config.long_pause_every_pages;
        every > 0 && page > 0 && page % every == 0
    }

    pub fn long_pause(&self) -> Duration {
        random_between(
            Duration::from_secs(self.config.long_pause_min_secs),
            Duration::from_secs(self.config.long_pause_max_secs),
        )
    }
}

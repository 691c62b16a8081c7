//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::IncrementConfig;

/// Delay schedule for retried attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    pub fn from_config(config: &IncrementConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_delay_ms)
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential_base = 2u64.saturating_pow(attempt - 1);
        let capped_delay = self.base_ms.saturating_mul(exponential_base).min(self.max_ms);

        // Up to 50% extra so racing writers drift apart.
        let jitter_range = capped_delay / 2;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }
}

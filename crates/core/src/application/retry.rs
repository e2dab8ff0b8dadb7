// Retry backoff for transport attempts

use crate::application::constants::{BACKOFF_BASE_DELAY, BACKOFF_MAX_DELAY};
use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay
    Retry(Duration),
    /// Retry budget exhausted
    Exhausted,
}

/// Exponential backoff: `min(base * 2^attempt, max)`, no jitter
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BACKOFF_BASE_DELAY, BACKOFF_MAX_DELAY)
    }
}

impl BackoffPolicy {
    /// # Arguments
    /// * `base_delay` - Delay after the first failed attempt
    /// * `max_delay` - Ceiling for any single delay
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay after the failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide what follows the failed attempt `attempt` out of `max_retries`
    /// retries (so `max_retries + 1` attempts in total).
    pub fn decide(&self, attempt: u32, max_retries: u32) -> RetryDecision {
        if attempt >= max_retries {
            warn!(
                attempt = attempt + 1,
                max_retries = max_retries,
                "Retry budget exhausted"
            );
            return RetryDecision::Exhausted;
        }

        let delay = self.delay_for(attempt);
        info!(
            attempt = attempt + 1,
            max_retries = max_retries,
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );
        RetryDecision::Retry(delay)
    }
}

//! Retry policy with exponential backoff
//!
//! Every processing failure is retryable up to the attempt cap; failure
//! kinds are not differentiated. Delays are scheduled off-worker, so a
//! waiting retry never holds a worker slot.

use std::time::Duration;

/// Exponential backoff: `base_delay * multiplier^(attempt - 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2,
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after `failed_attempt` (1-based) fails, or `None`
    /// when attempts are exhausted and the order must go terminal.
    pub fn delay_after(&self, failed_attempt: u32) -> Option<Duration> {
        if failed_attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.saturating_pow(failed_attempt.saturating_sub(1));
        Some(self.base_delay.saturating_mul(factor))
    }
}

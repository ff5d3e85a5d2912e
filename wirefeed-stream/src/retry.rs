//! Exponential backoff between renewal attempts.

use std::time::Duration;

use wirefeed::config::RenewalConfig;

/// Bounded exponential backoff.
///
/// The wait after failed attempt `n` is `base_delay * 2^(n-1)`. There is no
/// wait after the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Attempts before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay following failed attempt `attempt` (1-based), regardless of the bound.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Delay before the next attempt, or `None` once `attempt` was the last.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.delay_for(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RenewalConfig::default().into()
    }
}

impl From<RenewalConfig> for RetryPolicy {
    fn from(config: RenewalConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }
}

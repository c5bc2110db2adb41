use std::time::Duration;

/// Retry schedule for rating backend calls
///
/// Only HTTP 500 responses are retried. The delay doubles on every attempt,
/// so the defaults wait 500ms and then 1000ms before giving up.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    pub fn should_retry(&self, status: reqwest::StatusCode, attempt: u32) -> bool {
        status == reqwest::StatusCode::INTERNAL_SERVER_ERROR && attempt < self.max_retries
    }
}

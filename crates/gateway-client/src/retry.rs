//! Retry policy: eligibility and backoff, independent of transport
//! mechanics.

use std::time::Duration;

use mw_domain::Error;

/// Decides whether a failed attempt is retried and how long to wait.
///
/// Kept as a swappable strategy so alternative policies (pure
/// exponential, jittered, circuit-breaker-aware) can be substituted
/// without touching the transport.
pub trait RetryPolicy: Send + Sync {
    /// True iff the attempt at `attempt` (0-indexed) may be retried.
    fn should_retry(&self, error: &Error, attempt: u32) -> bool;

    /// Delay before retrying after the failure of attempt `attempt`.
    fn delay_for(&self, attempt: u32) -> Duration;
}

/// Linear backoff: `base_delay * (attempt + 1)`.
///
/// The legacy client called this formula "exponential" in places; it
/// never was. It is linear in the attempt index and named accordingly.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    /// Base delay; attempt n waits `base_delay * (n + 1)`.
    pub base_delay: Duration,
    /// Retries after the initial attempt (`max_retries + 1` total tries).
    pub max_retries: u32,
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_retries: 3,
        }
    }
}

impl RetryPolicy for LinearBackoff {
    fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }
}

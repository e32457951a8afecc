//! Bounded retry with exponential backoff for I/O-bound operations.
//!
//! Every language-model and embedding call goes through a [`RetryPolicy`] so
//! transient API failures are absorbed locally instead of surfacing to callers.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy: bounded attempts with exponential backoff.
///
/// The delay doubles on every failed attempt, starting at `base_delay` and
/// capped at `max_delay`. The last error is surfaced once attempts run out;
/// there is no infinite retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with a custom attempt count and the default backoff.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// Returns the first `Ok` value, or the last error once `max_attempts`
    /// have failed.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, "operation failed, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff delay after the given (1-based) failed attempt.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

//! Bounded retry with a fixed delay between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Retries an operation a fixed number of times.
///
/// There is no jitter and no notion of retryable errors: every `Err` is
/// treated as transient. Outcomes that must not be retried belong in the
/// `Ok` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default number of attempts.
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    /// Default pause between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

    /// Create a policy.
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// Each attempt calls `op` again, so a queued operation re-enters the
    /// queue on every retry.
    ///
    /// # Errors
    /// Returns the error of the final attempt unchanged.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= attempts => {
                    warn!(attempt, error = %e, "operation failed, giving up");
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "operation failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

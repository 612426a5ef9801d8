//! FIFO queue enforcing a minimum spacing between dispatches.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Serializes outbound work with a minimum gap between dispatch starts.
///
/// Waiters are served in submission order (tokio's mutex is fair). The gap
/// is measured from one dispatch start to the next; a dispatched unit does
/// not have to finish before the next one starts, and its failure does not
/// hold up the queue.
#[derive(Debug)]
pub struct RateLimitedQueue {
    spacing: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimitedQueue {
    /// Default gap between dispatches.
    pub const DEFAULT_SPACING: Duration = Duration::from_millis(1000);

    /// Create an empty queue.
    #[must_use]
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Minimum gap between dispatch starts.
    #[must_use]
    pub const fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for this entry's turn, then run `work` to completion.
    ///
    /// `work` is not polled before dispatch. Dropping the returned future
    /// while it waits removes the entry from the queue.
    pub async fn submit<F: Future>(&self, work: F) -> F::Output {
        {
            let mut last = self.last_dispatch.lock().await;
            if let Some(previous) = *last {
                let ready_at = previous + self.spacing;
                if ready_at > Instant::now() {
                    debug!(wait_ms = (ready_at - Instant::now()).as_millis(), "rate limited");
                    tokio::time::sleep_until(ready_at).await;
                }
            }
            *last = Some(Instant::now());
        }

        work.await
    }
}

impl Default for RateLimitedQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPACING)
    }
}

//! Bounded retry for status queries
//!
//! Only `get_status` is retried. Submissions go straight through: repeating
//! one could create a second remote run.

use std::time::Duration;

use async_trait::async_trait;
use batchrun_core::{JobPayload, RunHandle, RunId, RunStatus, RunTransport, TransportError};
use tracing::warn;

const MAX_DELAY: Duration = Duration::from_secs(30);

/// Wraps a transport and repeats failed status queries with exponential backoff
pub struct RetryingTransport<T> {
    inner: T,
    max_retries: u32,
    initial_delay: Duration,
}

impl<T: RunTransport> RetryingTransport<T> {
    pub fn new(inner: T, max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            initial_delay,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: RunTransport> RunTransport for RetryingTransport<T> {
    async fn submit(&self, payload: &JobPayload) -> Result<RunHandle, TransportError> {
        self.inner.submit(payload).await
    }

    async fn get_status(&self, run_id: &RunId) -> Result<RunStatus, TransportError> {
        let mut delay = self.initial_delay;
        let mut attempt = 0;

        loop {
            match self.inner.get_status(run_id).await {
                Ok(status) => return Ok(status),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Status query for run {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        run_id,
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

//! Polling policy shared by the blocking waits

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{JobError, Result};

/// Default pause between two polling passes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long and how often a wait polls the remote system
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    /// Upper bound on the whole wait; `None` waits until done or cancelled
    pub deadline: Option<Duration>,
    pub cancel: CancellationToken,
}

impl WaitPolicy {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn start(&self) -> WaitClock<'_> {
        WaitClock {
            policy: self,
            deadline: self.deadline.map(|d| Instant::now() + d),
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// A running wait: tracks the absolute deadline of one call
pub(crate) struct WaitClock<'a> {
    policy: &'a WaitPolicy,
    deadline: Option<Instant>,
}

impl WaitClock<'_> {
    /// Fails if the wait was cancelled or ran out of time
    pub(crate) fn check(&self) -> Result<()> {
        if self.policy.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        match (self.deadline, self.policy.deadline) {
            (Some(at), Some(limit)) if Instant::now() >= at => {
                Err(JobError::DeadlineExceeded(limit))
            }
            _ => Ok(()),
        }
    }

    /// Sleeps one poll interval, waking early on cancellation or deadline
    pub(crate) async fn pause(&self) -> Result<()> {
        let mut sleep_for = self.policy.poll_interval;
        if let Some(at) = self.deadline {
            sleep_for = sleep_for.min(at.saturating_duration_since(Instant::now()));
        }

        tokio::select! {
            _ = self.policy.cancel.cancelled() => Err(JobError::Cancelled),
            _ = tokio::time::sleep(sleep_for) => self.check(),
        }
    }
}

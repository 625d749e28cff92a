//! Run identity and lifecycle state types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local identifier of a job inside a run manager
///
/// Assigned when the job is created, long before the remote system hands out
/// a [`RunId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(Uuid);

impl JobKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a remote run, assigned by the job-execution API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for RunId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state reported by the remote system for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunLifecycleState {
    Queued,
    Pending,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    Blocked,
    WaitingForRetry,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RunLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Queued => "QUEUED",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::Skipped => "SKIPPED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Blocked => "BLOCKED",
            Self::WaitingForRetry => "WAITING_FOR_RETRY",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Terminal disposition of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultOutcome {
    Success,
    Failed,
    #[serde(rename = "TIMEDOUT")]
    TimedOut,
    Canceled,
    Excluded,
    SuccessWithFailures,
    UpstreamFailed,
    UpstreamCanceled,
    MaximumConcurrentRunsReached,
    Disabled,
    #[serde(other)]
    Unknown,
}

impl ResultOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for ResultOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMEDOUT",
            Self::Canceled => "CANCELED",
            Self::Excluded => "EXCLUDED",
            Self::SuccessWithFailures => "SUCCESS_WITH_FAILURES",
            Self::UpstreamFailed => "UPSTREAM_FAILED",
            Self::UpstreamCanceled => "UPSTREAM_CANCELED",
            Self::MaximumConcurrentRunsReached => "MAXIMUM_CONCURRENT_RUNS_REACHED",
            Self::Disabled => "DISABLED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Snapshot of a run as returned by one status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub lifecycle_state: RunLifecycleState,
    pub result_state: Option<ResultOutcome>,
    pub run_page_url: Option<String>,
    pub state_message: Option<String>,
}

impl RunStatus {
    pub fn new(lifecycle_state: RunLifecycleState) -> Self {
        Self {
            lifecycle_state,
            result_state: None,
            run_page_url: None,
            state_message: None,
        }
    }

    pub fn with_result(mut self, outcome: ResultOutcome) -> Self {
        self.result_state = Some(outcome);
        self
    }

    pub fn with_run_page_url(mut self, url: impl Into<String>) -> Self {
        self.run_page_url = Some(url.into());
        self
    }

    /// Local state this remote snapshot maps to
    pub fn job_state(&self) -> JobState {
        match self.lifecycle_state {
            RunLifecycleState::Queued
            | RunLifecycleState::Pending
            | RunLifecycleState::Blocked
            | RunLifecycleState::WaitingForRetry => JobState::Pending,
            RunLifecycleState::Running | RunLifecycleState::Terminating => JobState::Running,
            RunLifecycleState::Terminated
            | RunLifecycleState::Skipped
            | RunLifecycleState::InternalError
            | RunLifecycleState::Unknown => JobState::Terminated {
                outcome: self.result_state,
            },
        }
    }
}

/// Local lifecycle state of a job
///
/// Moves forward only: `NotSubmitted -> Pending -> Running -> Terminated`,
/// with `Pending -> Terminated` allowed. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    NotSubmitted,
    Pending,
    Running,
    Terminated { outcome: Option<ResultOutcome> },
}

impl JobState {
    fn rank(&self) -> u8 {
        match self {
            Self::NotSubmitted => 0,
            Self::Pending => 1,
            Self::Running => 2,
            Self::Terminated { .. } => 3,
        }
    }

    /// Apply a reported state, ignoring anything that would move backward
    pub fn advance(self, next: JobState) -> JobState {
        if self.is_terminal() || next.rank() < self.rank() {
            self
        } else {
            next
        }
    }

    /// Whether the job is still submitted and not terminal
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }

    pub fn outcome(&self) -> Option<ResultOutcome> {
        match self {
            Self::Terminated { outcome } => *outcome,
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSubmitted => write!(f, "not submitted"),
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Terminated { outcome: Some(o) } => write!(f, "terminated ({})", o),
            Self::Terminated { outcome: None } => write!(f, "terminated"),
        }
    }
}

//! Job domain type
//!
//! A job is one remote notebook run seen from the client side: its payload,
//! the run id handed out by the remote system, and the last state observed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::payload::JobPayload;
use crate::domain::status::{JobKey, JobState, ResultOutcome, RunId, RunStatus};
use crate::error::{JobError, Result};
use crate::transport::RunTransport;
use crate::wait::WaitPolicy;

/// One remote computation and its lifecycle
#[derive(Clone)]
pub struct Job {
    key: JobKey,
    run_id: Option<RunId>,
    payload: Option<JobPayload>,
    state: JobState,
    run_page_url: Option<String>,
    dashboard_fetched: bool,
    submitted_at: Option<DateTime<Utc>>,
    terminated_at: Option<DateTime<Utc>>,
    transport: Option<Arc<dyn RunTransport>>,
}

impl Job {
    /// Creates an empty job with no payload and no workspace
    pub fn new() -> Self {
        Self {
            key: JobKey::new(),
            run_id: None,
            payload: None,
            state: JobState::NotSubmitted,
            run_page_url: None,
            dashboard_fetched: false,
            submitted_at: None,
            terminated_at: None,
            transport: None,
        }
    }

    /// Creates a job ready to be registered
    pub fn with_payload(payload: JobPayload) -> Self {
        let mut job = Self::new();
        job.payload = Some(payload);
        job
    }

    pub fn with_transport(mut self, transport: Arc<dyn RunTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn key(&self) -> JobKey {
        self.key
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn payload(&self) -> Option<&JobPayload> {
        self.payload.as_ref()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn outcome(&self) -> Option<ResultOutcome> {
        self.state.outcome()
    }

    /// Dashboard URL if it has already been seen; see [`Job::fetch_dashboard_url`]
    pub fn cached_dashboard_url(&self) -> Option<&str> {
        self.run_page_url.as_deref()
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn terminated_at(&self) -> Option<DateTime<Utc>> {
        self.terminated_at
    }

    pub fn is_submitted(&self) -> bool {
        self.run_id.is_some()
    }

    pub fn is_workspace_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// Sets the work to perform. Frozen once the job is submitted.
    pub fn set_payload(&mut self, payload: JobPayload) -> Result<()> {
        if let Some(run_id) = &self.run_id {
            return Err(JobError::Configuration(format!(
                "payload cannot change after submission (run {})",
                run_id
            )));
        }

        self.payload = Some(payload);
        Ok(())
    }

    /// Sets the workspace this job is submitted to
    pub fn set_transport(&mut self, transport: Arc<dyn RunTransport>) {
        self.transport = Some(transport);
    }

    /// Creates the remote run
    ///
    /// On a transport failure the job is left untouched and may be submitted
    /// again.
    pub async fn submit(&mut self) -> Result<&RunId> {
        if let Some(run_id) = &self.run_id {
            return Err(JobError::AlreadySubmitted(run_id.clone()));
        }

        let transport = self
            .transport
            .as_ref()
            .ok_or(JobError::WorkspaceNotConfigured)?;

        let payload = self.payload.as_ref().ok_or_else(|| {
            JobError::Configuration("payload must be set before submitting".to_string())
        })?;
        payload.validate()?;

        let handle = transport.submit(payload).await?;

        info!(
            "Submitted {} as run {}",
            payload.notebook_task.notebook_path, handle.run_id
        );

        self.state = JobState::Pending;
        self.submitted_at = Some(Utc::now());
        Ok(&*self.run_id.insert(handle.run_id))
    }

    /// Queries the remote run and folds the answer into the local state
    ///
    /// A terminated job is final and is not queried again.
    pub async fn refresh_status(&mut self) -> Result<JobState> {
        let run_id = self.run_id.as_ref().ok_or(JobError::NotSubmitted)?;

        if self.state.is_terminal() {
            return Ok(self.state);
        }

        let transport = self
            .transport
            .as_ref()
            .ok_or(JobError::WorkspaceNotConfigured)?;

        let status = transport.get_status(run_id).await?;
        debug!(
            "Run {} reported {} (result: {:?})",
            run_id, status.lifecycle_state, status.result_state
        );

        self.apply_status(status);
        Ok(self.state)
    }

    /// Polls until the run terminates and returns its outcome
    pub async fn wait_until_terminal(
        &mut self,
        policy: &WaitPolicy,
    ) -> Result<Option<ResultOutcome>> {
        let clock = policy.start();

        loop {
            clock.check()?;

            if self.refresh_status().await?.is_terminal() {
                break;
            }

            clock.pause().await?;
        }

        if let Some(run_id) = &self.run_id {
            info!("run {} finished with status: {}", run_id, self.state);
        }
        Ok(self.outcome())
    }

    /// Returns the run's dashboard URL, querying the remote system the first
    /// time it is needed
    ///
    /// At most one query is sent per job, even when the reply carries no URL.
    pub async fn fetch_dashboard_url(&mut self) -> Result<Option<&str>> {
        if self.run_page_url.is_none() && !self.dashboard_fetched {
            let run_id = self.run_id.as_ref().ok_or(JobError::NotSubmitted)?;
            let transport = self
                .transport
                .as_ref()
                .ok_or(JobError::WorkspaceNotConfigured)?;

            let status = transport.get_status(run_id).await?;
            self.run_page_url = status.run_page_url;
            self.dashboard_fetched = true;
        }

        Ok(self.run_page_url.as_deref())
    }

    fn apply_status(&mut self, status: RunStatus) {
        let next = self.state.advance(status.job_state());

        if next.is_terminal() && !self.state.is_terminal() {
            self.terminated_at = Some(Utc::now());
        }
        self.state = next;

        if self.run_page_url.is_none() {
            self.run_page_url = status.run_page_url;
        }
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("key", &self.key)
            .field("run_id", &self.run_id)
            .field("payload", &self.payload)
            .field("state", &self.state)
            .field("run_page_url", &self.run_page_url)
            .field("workspace_configured", &self.transport.is_some())
            .finish()
    }
}

//! Run manager
//!
//! Tracks a batch of jobs in three buckets:
//! - queued: registered, not yet submitted
//! - executing: submitted, not terminal
//! - completed: terminal
//!
//! A job is in exactly one bucket at any time. It moves queued -> executing
//! on a successful submission and executing -> completed once a status
//! refresh reports a terminal state. Nothing else moves or drops jobs.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::job::Job;
use crate::domain::status::{JobKey, RunId, RunStatus};
use crate::error::{JobError, Result, TransportError};
use crate::transport::RunTransport;
use crate::wait::WaitPolicy;

/// Bucket a registered job currently sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Queued,
    Executing,
    Completed,
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bucket::Queued => write!(f, "queued"),
            Bucket::Executing => write!(f, "executing"),
            Bucket::Completed => write!(f, "completed"),
        }
    }
}

/// Outcome of one submission pass
#[derive(Debug, Default)]
pub struct SubmitReport {
    /// Jobs moved to executing, in submission order
    pub submitted: Vec<JobKey>,
    /// Jobs left in queued because their submission failed
    pub failed: Vec<(JobKey, JobError)>,
}

impl SubmitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of one reconciliation pass
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Jobs moved to completed during this pass
    pub completed: Vec<JobKey>,
    /// Jobs left in executing because their status query failed
    pub failed: Vec<(JobKey, TransportError)>,
    /// Size of the executing bucket after the pass
    pub still_executing: usize,
}

/// Owns a batch of jobs and drives them to completion
pub struct RunManager {
    transport: Arc<dyn RunTransport>,
    queued: Vec<Job>,
    executing: Vec<Job>,
    completed: Vec<Job>,
}

impl RunManager {
    /// Creates a manager submitting through `transport`
    pub fn new(transport: Arc<dyn RunTransport>) -> Self {
        Self {
            transport,
            queued: Vec::new(),
            executing: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn transport(&self) -> &Arc<dyn RunTransport> {
        &self.transport
    }

    // =============================================================================
    // Registration
    // =============================================================================

    /// Adds one job to the queued bucket
    ///
    /// Rejects a job whose key is already registered, a job that already has
    /// a remote run, and a job without a valid payload.
    pub fn register_one(&mut self, job: Job) -> Result<JobKey> {
        self.check_admissible(&job)?;

        let key = job.key();
        debug!("Registered job {}", key);
        self.queued.push(job);
        Ok(key)
    }

    /// Adds several jobs to the queued bucket, keeping their order
    ///
    /// The batch is checked as a whole first: if any job is rejected, none
    /// is registered.
    pub fn register_many<I>(&mut self, jobs: I) -> Result<Vec<JobKey>>
    where
        I: IntoIterator<Item = Job>,
    {
        let jobs: Vec<Job> = jobs.into_iter().collect();

        let mut keys = Vec::with_capacity(jobs.len());
        let mut seen = HashSet::new();
        for job in &jobs {
            self.check_admissible(job)?;
            if !seen.insert(job.key()) {
                return Err(JobError::DuplicateJob(job.key()));
            }
            keys.push(job.key());
        }

        debug!("Registered {} job(s)", jobs.len());
        self.queued.extend(jobs);
        Ok(keys)
    }

    fn check_admissible(&self, job: &Job) -> Result<()> {
        if self.bucket_of(job.key()).is_some() {
            return Err(JobError::DuplicateJob(job.key()));
        }

        if let Some(run_id) = job.run_id() {
            return Err(JobError::AlreadySubmitted(run_id.clone()));
        }

        job.payload()
            .ok_or_else(|| {
                JobError::Configuration("payload must be set before registering".to_string())
            })?
            .validate()
    }

    // =============================================================================
    // Submission & Reconciliation
    // =============================================================================

    /// Submits every queued job in registration order
    ///
    /// A failed submission leaves that job queued, is recorded in the report
    /// and the pass continues with the next job.
    pub async fn submit_all(&mut self) -> Result<SubmitReport> {
        let mut report = SubmitReport::default();
        let mut index = 0;

        while index < self.queued.len() {
            let job = &mut self.queued[index];
            if !job.is_workspace_configured() {
                job.set_transport(Arc::clone(&self.transport));
            }

            let result = job.submit().await.map(|_| ());
            match result {
                Ok(()) => {
                    let job = self.queued.remove(index);
                    report.submitted.push(job.key());
                    self.executing.push(job);
                }
                Err(e) => {
                    warn!("Failed to submit job {}: {}", job.key(), e);
                    report.failed.push((job.key(), e));
                    index += 1;
                }
            }
        }

        info!(
            "Submitted {} job(s), {} failed",
            report.submitted.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Refreshes every executing job and moves terminal ones to completed
    ///
    /// Status queries run concurrently, one per job. Bucket moves happen once
    /// all queries of the pass have answered.
    pub async fn reconcile(&mut self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        if self.executing.is_empty() {
            return Ok(report);
        }

        let results = join_all(self.executing.iter_mut().map(|job| async move {
            let key = job.key();
            (key, job.refresh_status().await)
        }))
        .await;

        let mut first_error = None;
        for (key, result) in results {
            match result {
                Ok(_) => {}
                Err(JobError::Transport(e)) => {
                    warn!("Failed to refresh job {}: {}", key, e);
                    report.failed.push((key, e));
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        let (still_active, finished): (Vec<Job>, Vec<Job>) = std::mem::take(&mut self.executing)
            .into_iter()
            .partition(|job| job.state().is_active());
        self.executing = still_active;

        for job in finished {
            if let Some(run_id) = job.run_id() {
                info!("run {} finished with status: {}", run_id, job.state());
            }
            report.completed.push(job.key());
            self.completed.push(job);
        }
        report.still_executing = self.executing.len();

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Queries one run by id without touching any bucket
    pub async fn status_of(&self, run_id: &RunId) -> Result<RunStatus> {
        Ok(self.transport.get_status(run_id).await?)
    }

    // =============================================================================
    // Waiting
    // =============================================================================

    /// Reconciles until no job is executing
    pub async fn await_all(&mut self, policy: &WaitPolicy) -> Result<()> {
        let clock = policy.start();

        while !self.executing.is_empty() {
            clock.check()?;
            self.reconcile().await?;

            if self.executing.is_empty() {
                break;
            }
            clock.pause().await?;
        }

        Ok(())
    }

    /// Reconciles until `key` leaves the executing bucket and returns the
    /// bucket it ends up in
    ///
    /// A job that was never submitted returns [`Bucket::Queued`] without
    /// waiting.
    pub async fn await_one(&mut self, key: JobKey, policy: &WaitPolicy) -> Result<Bucket> {
        let clock = policy.start();

        loop {
            let bucket = self.bucket_of(key).ok_or(JobError::UnknownJob(key))?;
            if bucket != Bucket::Executing {
                return Ok(bucket);
            }

            clock.check()?;
            self.reconcile().await?;

            if self.bucket_of(key) == Some(Bucket::Executing) {
                clock.pause().await?;
            }
        }
    }

    // =============================================================================
    // Inspection
    // =============================================================================

    pub fn list_queued(&self) -> Vec<Job> {
        self.queued.clone()
    }

    pub fn list_executing(&self) -> Vec<Job> {
        self.executing.clone()
    }

    pub fn list_completed(&self) -> Vec<Job> {
        self.completed.clone()
    }

    pub fn bucket_of(&self, key: JobKey) -> Option<Bucket> {
        let has = |jobs: &[Job]| jobs.iter().any(|job| job.key() == key);

        if has(&self.queued) {
            Some(Bucket::Queued)
        } else if has(&self.executing) {
            Some(Bucket::Executing)
        } else if has(&self.completed) {
            Some(Bucket::Completed)
        } else {
            None
        }
    }

    pub fn job(&self, key: JobKey) -> Option<&Job> {
        self.queued
            .iter()
            .chain(&self.executing)
            .chain(&self.completed)
            .find(|job| job.key() == key)
    }

    /// Number of registered jobs across all buckets
    pub fn len(&self) -> usize {
        self.queued.len() + self.executing.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RunManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunManager")
            .field("queued", &self.queued.len())
            .field("executing", &self.executing.len())
            .field("completed", &self.completed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::domain::status::{JobState, ResultOutcome};
    use crate::testing::{ScriptedTransport, Step, finished, payload, pending, running};

    fn fast() -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(1))
    }

    fn manager(transport: &Arc<ScriptedTransport>) -> RunManager {
        RunManager::new(transport.clone())
    }

    fn jobs(notebooks: &[&str]) -> Vec<Job> {
        notebooks
            .iter()
            .map(|nb| Job::with_payload(payload(nb)))
            .collect()
    }

    fn assert_partitioned(manager: &RunManager, keys: &[JobKey]) {
        let mut seen = HashSet::new();
        for job in manager
            .list_queued()
            .iter()
            .chain(&manager.list_executing())
            .chain(&manager.list_completed())
        {
            assert!(seen.insert(job.key()), "job {} in two buckets", job.key());
        }
        assert_eq!(seen.len(), keys.len());
        for key in keys {
            assert!(seen.contains(key), "job {} lost", key);
        }
    }

    #[tokio::test]
    async fn test_submit_all_moves_jobs_to_executing() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);

        let keys = manager.register_many(jobs(&["/nb/a", "/nb/b", "/nb/c"])).unwrap();
        assert_eq!(manager.list_queued().len(), 3);

        let report = manager.submit_all().await.unwrap();

        assert_eq!(report.submitted, keys);
        assert!(manager.list_queued().is_empty());
        let executing = manager.list_executing();
        assert_eq!(executing.len(), 3);
        assert!(
            executing
                .iter()
                .all(|job| job.run_id().is_some_and(|id| !id.as_str().is_empty()))
        );
        assert_eq!(transport.submitted(), vec!["/nb/a", "/nb/b", "/nb/c"]);
        assert_partitioned(&manager, &keys);
    }

    #[tokio::test]
    async fn test_job_progresses_to_completed_over_passes() {
        let transport = Arc::new(ScriptedTransport::new().script(
            "/nb/a",
            vec![pending(), running(), finished(ResultOutcome::Success)],
        ));
        let mut manager = manager(&transport);
        let key = manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();
        manager.submit_all().await.unwrap();

        manager.reconcile().await.unwrap();
        assert_eq!(manager.bucket_of(key), Some(Bucket::Executing));
        manager.reconcile().await.unwrap();
        assert_eq!(manager.bucket_of(key), Some(Bucket::Executing));

        let report = manager.reconcile().await.unwrap();
        assert_eq!(report.completed, vec![key]);
        assert_eq!(report.still_executing, 0);
        assert_eq!(manager.bucket_of(key), Some(Bucket::Completed));
        assert_eq!(
            manager.job(key).unwrap().outcome(),
            Some(ResultOutcome::Success)
        );
    }

    #[tokio::test]
    async fn test_reconcile_with_nothing_executing_is_noop() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        let key = manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();

        let report = manager.reconcile().await.unwrap();

        assert!(report.completed.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(manager.bucket_of(key), Some(Bucket::Queued));
    }

    #[tokio::test]
    async fn test_register_many_keeps_every_job() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);

        let batch: Vec<Job> = (0..4)
            .map(|i| Job::with_payload(payload(&format!("/nb/{}", i))))
            .collect();
        let expected: Vec<JobKey> = batch.iter().map(Job::key).collect();

        let keys = manager.register_many(batch).unwrap();

        assert_eq!(keys, expected);
        let queued: Vec<JobKey> = manager.list_queued().iter().map(Job::key).collect();
        assert_eq!(queued, expected);
    }

    #[tokio::test]
    async fn test_submit_transport_failure_is_isolated() {
        let transport = Arc::new(ScriptedTransport::new().fail_submit("/nb/b"));
        let mut manager = manager(&transport);
        let keys = manager.register_many(jobs(&["/nb/a", "/nb/b", "/nb/c"])).unwrap();

        let report = manager.submit_all().await.unwrap();

        assert_eq!(report.submitted, vec![keys[0], keys[2]]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, keys[1]);
        assert_eq!(manager.bucket_of(keys[1]), Some(Bucket::Queued));
        assert!(!manager.job(keys[1]).unwrap().is_submitted());
        assert_partitioned(&manager, &keys);

        transport.allow_submit("/nb/b");
        let report = manager.submit_all().await.unwrap();
        assert_eq!(report.submitted, vec![keys[1]]);
        assert_eq!(manager.list_executing().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_job_is_rejected_at_registration() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        let good = manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();

        assert!(matches!(
            manager.register_one(Job::new()),
            Err(JobError::Configuration(_))
        ));
        assert!(matches!(
            manager.register_one(Job::with_payload(payload(""))),
            Err(JobError::Configuration(_))
        ));
        let after = manager.register_one(Job::with_payload(payload("/nb/c"))).unwrap();
        assert_eq!(manager.len(), 2);

        let report = manager.submit_all().await.unwrap();
        assert_eq!(report.submitted, vec![good, after]);
        assert!(report.is_complete());
        assert_partitioned(&manager, &[good, after]);
    }

    #[tokio::test]
    async fn test_failed_job_does_not_block_later_registrations() {
        let transport = Arc::new(ScriptedTransport::new().fail_submit("/nb/bad"));
        let mut manager = manager(&transport);
        let bad = manager.register_one(Job::with_payload(payload("/nb/bad"))).unwrap();
        manager.submit_all().await.unwrap();

        let mut later = Vec::new();
        for i in 0..3 {
            let key = manager
                .register_one(Job::with_payload(payload(&format!("/nb/later-{}", i))))
                .unwrap();
            let report = manager.submit_all().await.unwrap();

            assert_eq!(report.submitted, vec![key]);
            assert_eq!(report.failed.len(), 1);
            assert_eq!(report.failed[0].0, bad);
            later.push(key);
        }

        assert_eq!(manager.list_executing().len(), 3);
        assert_eq!(manager.bucket_of(bad), Some(Bucket::Queued));
        later.push(bad);
        assert_partitioned(&manager, &later);
    }

    #[tokio::test]
    async fn test_already_submitted_job_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut job = Job::with_payload(payload("/nb/a")).with_transport(transport.clone());
        job.submit().await.unwrap();

        let mut manager = manager(&transport);

        assert!(matches!(
            manager.register_one(job),
            Err(JobError::AlreadySubmitted(_))
        ));
        assert!(manager.is_empty());
        assert_eq!(transport.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_listed_copy_cannot_be_registered_again() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        let key = manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();
        manager.submit_all().await.unwrap();

        let copy = manager.list_executing().remove(0);
        assert!(matches!(
            manager.register_one(copy),
            Err(JobError::DuplicateJob(k)) if k == key
        ));
        assert_eq!(manager.bucket_of(key), Some(Bucket::Executing));
        assert!(manager.list_queued().is_empty());

        let later = manager.register_one(Job::with_payload(payload("/nb/b"))).unwrap();
        let report = manager.submit_all().await.unwrap();
        assert_eq!(report.submitted, vec![later]);
        assert_partitioned(&manager, &[key, later]);
    }

    #[tokio::test]
    async fn test_register_many_rejects_whole_batch() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        let first = manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();
        let known = manager.list_queued().remove(0);

        let fresh = Job::with_payload(payload("/nb/b"));
        assert!(matches!(
            manager.register_many(vec![fresh.clone(), known]),
            Err(JobError::DuplicateJob(k)) if k == first
        ));
        assert!(matches!(
            manager.register_many(vec![fresh.clone(), fresh.clone()]),
            Err(JobError::DuplicateJob(k)) if k == fresh.key()
        ));

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.bucket_of(fresh.key()), None);
    }

    #[tokio::test]
    async fn test_job_keeps_its_own_transport() {
        let shared = Arc::new(ScriptedTransport::new());
        let own = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&shared);
        manager.register_one(Job::with_payload(payload("/nb/own")).with_transport(own.clone())).unwrap();
        manager.register_one(Job::with_payload(payload("/nb/shared"))).unwrap();

        manager.submit_all().await.unwrap();

        assert_eq!(own.submitted(), vec!["/nb/own"]);
        assert_eq!(shared.submitted(), vec!["/nb/shared"]);
    }

    #[tokio::test]
    async fn test_reconcile_transport_failure_is_isolated() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("/nb/a", vec![Step::Fail, finished(ResultOutcome::Success)])
                .script("/nb/b", vec![finished(ResultOutcome::Failed)]),
        );
        let mut manager = manager(&transport);
        let keys = manager.register_many(jobs(&["/nb/a", "/nb/b"])).unwrap();
        manager.submit_all().await.unwrap();

        let report = manager.reconcile().await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, keys[0]);
        assert_eq!(report.completed, vec![keys[1]]);
        assert_eq!(manager.bucket_of(keys[0]), Some(Bucket::Executing));
        assert_eq!(manager.job(keys[0]).unwrap().state(), JobState::Pending);

        manager.reconcile().await.unwrap();
        assert_eq!(manager.bucket_of(keys[0]), Some(Bucket::Completed));
        assert_partitioned(&manager, &keys);
    }

    #[tokio::test]
    async fn test_await_all_waits_for_every_job() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("/nb/fast", vec![finished(ResultOutcome::Success)])
                .script(
                    "/nb/slow",
                    vec![running(), running(), running(), finished(ResultOutcome::Canceled)],
                ),
        );
        let mut manager = manager(&transport);
        let keys = manager.register_many(jobs(&["/nb/fast", "/nb/slow"])).unwrap();
        manager.submit_all().await.unwrap();

        manager.await_all(&fast()).await.unwrap();

        assert!(manager.list_executing().is_empty());
        assert_eq!(manager.list_completed().len(), 2);
        assert_eq!(
            manager.job(keys[1]).unwrap().outcome(),
            Some(ResultOutcome::Canceled)
        );
        let slow_run = manager.job(keys[1]).unwrap().run_id().unwrap().clone();
        assert_eq!(transport.status_calls(&slow_run), 4);
    }

    #[tokio::test]
    async fn test_await_all_can_be_cancelled() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        let key = manager.register_one(Job::with_payload(payload("/nb/forever"))).unwrap();
        manager.submit_all().await.unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let policy = fast().with_cancellation(cancel);
        assert!(matches!(
            manager.await_all(&policy).await,
            Err(JobError::Cancelled)
        ));
        assert_eq!(manager.bucket_of(key), Some(Bucket::Executing));
    }

    #[tokio::test]
    async fn test_await_all_deadline() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        manager.register_one(Job::with_payload(payload("/nb/forever"))).unwrap();
        manager.submit_all().await.unwrap();

        let policy = fast().with_deadline(Duration::from_millis(20));
        assert!(matches!(
            manager.await_all(&policy).await,
            Err(JobError::DeadlineExceeded(_))
        ));
    }

    #[tokio::test]
    async fn test_await_one_returns_final_bucket() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("/nb/a", vec![running(), finished(ResultOutcome::Success)]),
        );
        let mut manager = manager(&transport);
        let key = manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();
        let other = manager.register_one(Job::with_payload(payload("/nb/other"))).unwrap();
        manager.submit_all().await.unwrap();

        let bucket = manager.await_one(key, &fast()).await.unwrap();

        assert_eq!(bucket, Bucket::Completed);
        assert_eq!(manager.bucket_of(other), Some(Bucket::Executing));
    }

    #[tokio::test]
    async fn test_await_one_on_queued_job_returns_immediately() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        let key = manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();

        let policy = WaitPolicy::new(Duration::from_secs(3600));
        assert_eq!(manager.await_one(key, &policy).await.unwrap(), Bucket::Queued);
    }

    #[tokio::test]
    async fn test_await_one_unknown_job() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        let stranger = Job::new().key();

        assert!(matches!(
            manager.await_one(stranger, &fast()).await,
            Err(JobError::UnknownJob(k)) if k == stranger
        ));
    }

    #[tokio::test]
    async fn test_listed_jobs_are_copies() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut manager = manager(&transport);
        manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();

        let mut listed = manager.list_queued();
        listed.clear();
        listed.push(Job::new());

        assert_eq!(manager.list_queued().len(), 1);
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_status_of_run() {
        let transport = Arc::new(
            ScriptedTransport::new().script("/nb/a", vec![finished(ResultOutcome::Success)]),
        );
        let mut manager = manager(&transport);
        let key = manager.register_one(Job::with_payload(payload("/nb/a"))).unwrap();
        manager.submit_all().await.unwrap();
        let run_id = manager.job(key).unwrap().run_id().unwrap().clone();

        let status = manager.status_of(&run_id).await.unwrap();

        assert_eq!(status.result_state, Some(ResultOutcome::Success));
        assert_eq!(manager.bucket_of(key), Some(Bucket::Executing));
    }
}

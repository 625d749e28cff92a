//! Run command handler
//!
//! Registers one job per notebook, submits them all and waits for the batch
//! to finish, printing a summary at the end.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use batchrun_core::domain::payload::DEFAULT_TIMEOUT_SECONDS;
use batchrun_core::{ClusterSpec, Job, JobError, JobPayload, RunManager, WaitPolicy};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::colorize_outcome;
use crate::config::Config;
use crate::types::Parameter;

/// Arguments of `batchrun run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Notebook to run (repeat for several runs)
    #[arg(long = "notebook", required = true)]
    notebooks: Vec<String>,

    /// Existing cluster to run on
    #[arg(long, conflicts_with = "new_cluster", required_unless_present = "new_cluster")]
    cluster_id: Option<String>,

    /// JSON file with new cluster settings
    #[arg(long)]
    new_cluster: Option<PathBuf>,

    /// Notebook parameter as key=value (applies to every run)
    #[arg(long = "param", value_parser = Parameter::parse)]
    params: Vec<Parameter>,

    /// Maximum execution time of each run in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    timeout_seconds: u64,

    /// Seconds between two status passes
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,

    /// Give up waiting after this many seconds
    #[arg(long)]
    deadline: Option<u64>,

    /// Submit and exit without waiting
    #[arg(long)]
    no_wait: bool,
}

impl RunArgs {
    fn cluster(&self) -> Result<ClusterSpec> {
        match (&self.cluster_id, &self.new_cluster) {
            (Some(id), _) => Ok(ClusterSpec::ExistingClusterId(id.clone())),
            (None, Some(path)) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let settings = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid cluster JSON in {}", path.display()))?;
                Ok(ClusterSpec::NewCluster(settings))
            }
            (None, None) => anyhow::bail!("either --cluster-id or --new-cluster is required"),
        }
    }

    fn payloads(&self) -> Result<Vec<JobPayload>> {
        let cluster = self.cluster()?;

        Ok(self
            .notebooks
            .iter()
            .map(|notebook| {
                JobPayload::new(notebook, cluster.clone())
                    .with_timeout_seconds(self.timeout_seconds)
                    .with_parameters(self.params.iter().map(|p| (p.key.clone(), p.value.clone())))
            })
            .collect())
    }

    fn wait_policy(&self, cancel: CancellationToken) -> WaitPolicy {
        let policy = WaitPolicy::new(Duration::from_secs(self.poll_interval)).with_cancellation(cancel);

        match self.deadline {
            Some(secs) => policy.with_deadline(Duration::from_secs(secs)),
            None => policy,
        }
    }
}

/// Submit the requested notebooks and wait for them
pub async fn handle_run_command(args: RunArgs, config: &Config) -> Result<()> {
    let payloads = args.payloads()?;
    let mut manager = RunManager::new(config.connect()?);

    manager
        .register_many(payloads.into_iter().map(Job::with_payload))
        .context("Invalid run settings")?;

    let report = manager
        .submit_all()
        .await
        .context("Failed to submit runs")?;

    println!(
        "{}",
        format!("Submitted {} run(s):", report.submitted.len()).bold()
    );
    for job in manager.list_executing() {
        print_submitted(&job);
    }
    for (key, error) in &report.failed {
        let notebook = manager
            .job(*key)
            .and_then(|job| job.payload())
            .map(|payload| payload.notebook_task.notebook_path.clone())
            .unwrap_or_default();
        println!("  {} {}: {}", "✗".red(), notebook, error);
    }

    if args.no_wait {
        return finish(report.failed.len(), 0);
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    println!();
    println!("{}", "Waiting for runs to finish...".dimmed());

    match manager.await_all(&args.wait_policy(cancel)).await {
        Ok(()) => {}
        Err(e @ (JobError::Cancelled | JobError::DeadlineExceeded(_))) => {
            warn!("Stopped waiting: {}", e);
            println!(
                "{}",
                format!(
                    "Stopped waiting ({}); {} run(s) still executing",
                    e,
                    manager.list_executing().len()
                )
                .yellow()
            );
        }
        Err(e) => return Err(e).context("Failed while waiting for runs"),
    }

    println!();
    println!("{}", "Finished runs:".bold());
    let mut unsuccessful = 0;
    for mut job in manager.list_completed() {
        if !job.outcome().is_some_and(|o| o.is_success()) {
            unsuccessful += 1;
        }
        if let Err(e) = job.fetch_dashboard_url().await {
            warn!("Failed to fetch dashboard URL: {}", e);
        }
        print_finished(&job);
    }

    finish(report.failed.len(), unsuccessful + manager.list_executing().len())
}

fn finish(failed_submissions: usize, unsuccessful: usize) -> Result<()> {
    if failed_submissions > 0 || unsuccessful > 0 {
        anyhow::bail!(
            "{} submission(s) failed, {} run(s) did not succeed",
            failed_submissions,
            unsuccessful
        );
    }
    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

fn notebook_of(job: &Job) -> &str {
    job.payload()
        .map(|payload| payload.notebook_task.notebook_path.as_str())
        .unwrap_or("<no payload>")
}

fn print_submitted(job: &Job) {
    let run_id = job.run_id().map(|id| id.to_string()).unwrap_or_default();
    println!("  {} {} {}", "▸".cyan(), notebook_of(job), run_id.dimmed());
}

fn print_finished(job: &Job) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        notebook_of(job),
        colorize_outcome(job.outcome())
    );

    if let (Some(started), Some(ended)) = (job.submitted_at(), job.terminated_at()) {
        let seconds = ended.signed_duration_since(started).num_seconds();
        println!("    Duration:  {}s", seconds);
    }
    if let Some(url) = job.cached_dashboard_url() {
        println!("    Dashboard: {}", url.underline());
    }
}

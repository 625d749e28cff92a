//! Scripted transport used by the unit tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::payload::{ClusterSpec, JobPayload};
use crate::domain::status::{ResultOutcome, RunId, RunLifecycleState, RunStatus};
use crate::error::TransportError;
use crate::transport::{RunHandle, RunTransport};

/// One scripted answer to a status query
#[derive(Debug, Clone)]
pub enum Step {
    Status(RunStatus),
    Fail,
}

pub fn pending() -> Step {
    Step::Status(RunStatus::new(RunLifecycleState::Pending))
}

pub fn running() -> Step {
    Step::Status(RunStatus::new(RunLifecycleState::Running))
}

pub fn finished(outcome: ResultOutcome) -> Step {
    Step::Status(RunStatus::new(RunLifecycleState::Terminated).with_result(outcome))
}

pub fn payload(notebook: &str) -> JobPayload {
    JobPayload::new(notebook, ClusterSpec::ExistingClusterId("cluster-1".to_string()))
}

#[derive(Default)]
struct State {
    next_id: u64,
    scripts: HashMap<String, VecDeque<Step>>,
    runs: HashMap<RunId, String>,
    failing_submits: HashSet<String>,
    submits: Vec<String>,
    status_calls: HashMap<RunId, usize>,
    no_urls: bool,
}

/// Transport answering from per-notebook scripts
///
/// The last step of a script repeats forever. Notebooks without a script
/// report `RUNNING`.
#[derive(Default)]
pub struct ScriptedTransport {
    state: Mutex<State>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, notebook: &str, steps: Vec<Step>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(notebook.to_string(), steps.into());
        self
    }

    pub fn fail_submit(self, notebook: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_submits
            .insert(notebook.to_string());
        self
    }

    /// Status replies carry no dashboard URL
    pub fn without_urls(self) -> Self {
        self.state.lock().unwrap().no_urls = true;
        self
    }

    pub fn allow_submit(&self, notebook: &str) {
        self.state.lock().unwrap().failing_submits.remove(notebook);
    }

    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submits.clone()
    }

    pub fn status_calls(&self, run_id: &RunId) -> usize {
        self.state
            .lock()
            .unwrap()
            .status_calls
            .get(run_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RunTransport for ScriptedTransport {
    async fn submit(&self, payload: &JobPayload) -> Result<RunHandle, TransportError> {
        let mut state = self.state.lock().unwrap();
        let notebook = payload.notebook_task.notebook_path.clone();

        if state.failing_submits.contains(&notebook) {
            return Err(TransportError::with_status(500, "submit rejected"));
        }

        state.next_id += 1;
        let run_id = RunId::new(format!("run-{}", state.next_id));
        state.runs.insert(run_id.clone(), notebook.clone());
        state.submits.push(notebook);

        Ok(RunHandle { run_id })
    }

    async fn get_status(&self, run_id: &RunId) -> Result<RunStatus, TransportError> {
        let mut state = self.state.lock().unwrap();
        *state.status_calls.entry(run_id.clone()).or_default() += 1;

        let notebook = state
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| TransportError::with_status(404, format!("no run {}", run_id)))?;

        let step = match state.scripts.get_mut(&notebook) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        }
        .unwrap_or_else(running);

        match step {
            Step::Status(status) if state.no_urls => Ok(status),
            Step::Status(status) => Ok(status.with_run_page_url(format!(
                "https://workspace.example/#job/runs/{}",
                run_id
            ))),
            Step::Fail => Err(TransportError::with_status(503, "unavailable")),
        }
    }
}

//! Run submission payload
//!
//! The payload is serialized as a single flat JSON object: the cluster entry
//! sits next to the run name, timeout and notebook task.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{JobError, Result};

/// Default maximum execution time of a run
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 3600;

/// Cluster that executes the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSpec {
    /// Reuse an already running cluster
    ExistingClusterId(String),
    /// Spin up a cluster for this run only (settings passed through as-is)
    NewCluster(serde_json::Value),
}

/// Notebook executed by the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookTask {
    pub notebook_path: String,
    /// Values readable through the notebook's widgets
    pub base_parameters: BTreeMap<String, String>,
}

/// Everything the remote system needs to create a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    #[serde(flatten)]
    pub cluster: ClusterSpec,
    pub run_name: String,
    pub timeout_seconds: u64,
    pub notebook_task: NotebookTask,
}

impl JobPayload {
    /// Creates a notebook payload with the default run name and timeout
    pub fn new(notebook_path: impl Into<String>, cluster: ClusterSpec) -> Self {
        let notebook_path = notebook_path.into();
        Self {
            cluster,
            run_name: format!("Notebook {}", notebook_path),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            notebook_task: NotebookTask {
                notebook_path,
                base_parameters: BTreeMap::new(),
            },
        }
    }

    pub fn with_run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run_name = run_name.into();
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.notebook_task
            .base_parameters
            .insert(key.into(), value.into());
        self
    }

    pub fn with_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.notebook_task
            .base_parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Checks the payload is complete enough to submit
    pub fn validate(&self) -> Result<()> {
        if self.notebook_task.notebook_path.trim().is_empty() {
            return Err(JobError::Configuration(
                "notebook_path cannot be empty".to_string(),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(JobError::Configuration(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        match &self.cluster {
            ClusterSpec::ExistingClusterId(id) if id.trim().is_empty() => Err(
                JobError::Configuration("existing_cluster_id cannot be empty".to_string()),
            ),
            ClusterSpec::NewCluster(settings) if !settings.is_object() => Err(
                JobError::Configuration("new_cluster must be a JSON object".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

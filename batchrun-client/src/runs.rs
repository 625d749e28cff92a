//! Run-related API endpoints

use async_trait::async_trait;
use batchrun_core::dto::run::{GetRunResponse, SubmitRunResponse};
use batchrun_core::{JobPayload, RunHandle, RunId, RunStatus, RunTransport, TransportError};
use tracing::debug;

use crate::WorkspaceClient;
use crate::error::Result;

impl WorkspaceClient {
    // =============================================================================
    // Run Lifecycle
    // =============================================================================

    /// Submit a one-time run
    ///
    /// # Arguments
    /// * `payload` - Cluster, notebook and parameters of the run
    ///
    /// # Returns
    /// The id of the created run
    pub async fn submit_run(&self, payload: &JobPayload) -> Result<SubmitRunResponse> {
        let url = format!("{}/jobs/runs/submit", self.base_url);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(payload).send().await?;

        self.handle_response(response).await
    }

    /// Get a run by ID
    ///
    /// # Arguments
    /// * `run_id` - The run id returned on submission
    ///
    /// # Returns
    /// The run's state and dashboard URL
    pub async fn get_run(&self, run_id: &RunId) -> Result<GetRunResponse> {
        let url = format!("{}/jobs/runs/get", self.base_url);
        debug!("GET {}?run_id={}", url, run_id);
        let response = self
            .client
            .get(&url)
            .query(&[("run_id", run_id.as_str())])
            .send()
            .await?;

        self.handle_response(response).await
    }
}

#[async_trait]
impl RunTransport for WorkspaceClient {
    async fn submit(&self, payload: &JobPayload) -> std::result::Result<RunHandle, TransportError> {
        Ok(self.submit_run(payload).await?.into())
    }

    async fn get_status(&self, run_id: &RunId) -> std::result::Result<RunStatus, TransportError> {
        Ok(self.get_run(run_id).await?.into())
    }
}

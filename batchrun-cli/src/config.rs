//! Configuration module
//!
//! Handles CLI configuration: workspace connection settings and the
//! transport built from them.

use std::sync::Arc;

use anyhow::{Context, Result};
use batchrun_client::{RetryingTransport, WorkspaceClient, WorkspaceConfig};
use batchrun_core::RunTransport;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace the runs are submitted to
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Builds the shared transport used by every job of this invocation
    ///
    /// Status queries are retried according to the workspace settings;
    /// submissions are not.
    pub fn connect(&self) -> Result<Arc<dyn RunTransport>> {
        let client =
            WorkspaceClient::new(&self.workspace).context("Failed to create workspace client")?;

        Ok(Arc::new(RetryingTransport::new(
            client,
            self.workspace.status_retries,
            self.workspace.retry_delay,
        )))
    }
}

//! Boundary between the lifecycle core and the remote job-execution API
//!
//! The HTTP adapter lives in `batchrun-client`; tests use scripted
//! implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::payload::JobPayload;
use crate::domain::status::{RunId, RunStatus};
use crate::error::TransportError;

/// Response to a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: RunId,
}

/// Capability to create runs and query their status
///
/// Implementations are shared read-only between every job submitted through
/// one run manager.
#[async_trait]
pub trait RunTransport: Send + Sync {
    /// Creates one remote run. Never retried by the core.
    async fn submit(&self, payload: &JobPayload) -> Result<RunHandle, TransportError>;

    /// Fetches the current status of a run
    async fn get_status(&self, run_id: &RunId) -> Result<RunStatus, TransportError>;
}

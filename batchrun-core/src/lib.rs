//! Batchrun Core
//!
//! Client-side lifecycle tracking for remote notebook runs.
//!
//! This crate contains:
//! - Domain types: the [`Job`](domain::job::Job) state machine, its payload and run states
//! - DTOs: wire shapes of the runs API
//! - The [`RunTransport`](transport::RunTransport) seam implemented by HTTP adapters
//! - The [`RunManager`](manager::RunManager) that submits and tracks batches of jobs

pub mod domain;
pub mod dto;
pub mod error;
pub mod manager;
pub mod transport;
pub mod wait;

#[cfg(test)]
mod testing;

pub use domain::job::Job;
pub use domain::payload::{ClusterSpec, JobPayload};
pub use domain::status::{JobKey, JobState, ResultOutcome, RunId, RunLifecycleState, RunStatus};
pub use error::{JobError, Result, TransportError};
pub use manager::{Bucket, ReconcileReport, RunManager, SubmitReport};
pub use transport::{RunHandle, RunTransport};
pub use wait::WaitPolicy;

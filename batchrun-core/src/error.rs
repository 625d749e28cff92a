//! Error types for job lifecycle operations

use std::time::Duration;

use thiserror::Error;

use crate::domain::status::{JobKey, RunId};

/// Result type alias for job and run manager operations
pub type Result<T> = std::result::Result<T, JobError>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by [`Job`](crate::domain::job::Job) and
/// [`RunManager`](crate::manager::RunManager)
///
/// Everything except `Transport` is a usage error: it is returned as soon as
/// it is detected and never retried.
#[derive(Debug, Error)]
pub enum JobError {
    /// Payload or workspace misconfigured
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The job already has a remote run
    #[error("job has already been submitted as run {0}")]
    AlreadySubmitted(RunId),

    /// Status was requested before the job was submitted
    #[error("job was not submitted")]
    NotSubmitted,

    /// No transport was attached to the job
    #[error("workspace must be set before submitting")]
    WorkspaceNotConfigured,

    /// The key does not belong to this run manager
    #[error("job {0} is not registered")]
    UnknownJob(JobKey),

    /// The key is already held by this run manager
    #[error("job {0} is already registered")]
    DuplicateJob(JobKey),

    /// The remote API call failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wait was cancelled by its token
    #[error("wait cancelled")]
    Cancelled,

    /// A wait ran past its deadline
    #[error("wait exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

impl JobError {
    /// Check if this error came from the remote API
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Opaque failure reported by a [`RunTransport`](crate::transport::RunTransport)
#[derive(Debug, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
    status: Option<u16>,
    permanent: bool,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Create a transport error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            permanent: false,
            source: None,
        }
    }

    /// Create a transport error that repeating the request cannot fix,
    /// such as a reply that does not decode
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            permanent: true,
            ..Self::new(message)
        }
    }

    /// Create a transport error for a non-success HTTP status
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: format!("status {}: {}", status, message.into()),
            status: Some(status),
            permanent: false,
            source: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// HTTP status code, if the failure was a rejected request
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether repeating the same idempotent request may succeed
    ///
    /// Network failures, throttling and server errors are retryable;
    /// any other rejected request or permanent failure is not.
    pub fn is_retryable(&self) -> bool {
        if self.permanent {
            return false;
        }
        match self.status {
            None => true,
            Some(status) => status == 429 || status >= 500,
        }
    }
}

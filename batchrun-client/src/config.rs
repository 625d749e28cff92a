//! Workspace configuration
//!
//! Connection settings for one remote workspace: where it lives, how to
//! authenticate, and how patient the client is with it.

use std::time::Duration;

use crate::error::{ClientError, Result};

/// Workspace connection settings
#[derive(Clone)]
pub struct WorkspaceConfig {
    /// Workspace URL (e.g., "https://example.cloud.databricks.com")
    pub host: String,

    /// Personal access token sent as a bearer token
    pub token: String,

    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,

    /// How many times a failed status query is repeated
    pub status_retries: u32,

    /// Delay before the first repeated status query, doubled each time
    pub retry_delay: Duration,
}

impl WorkspaceConfig {
    /// Creates a configuration with defaults
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            request_timeout: Duration::from_secs(30),
            status_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DATABRICKS_HOST (required)
    /// - DATABRICKS_TOKEN (required)
    /// - BATCHRUN_REQUEST_TIMEOUT (optional, seconds, default: 30)
    /// - BATCHRUN_STATUS_RETRIES (optional, default: 3)
    /// - BATCHRUN_RETRY_DELAY_MS (optional, milliseconds, default: 500)
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("DATABRICKS_HOST").map_err(|_| {
            ClientError::InvalidConfig("DATABRICKS_HOST environment variable not set".to_string())
        })?;

        let token = std::env::var("DATABRICKS_TOKEN").map_err(|_| {
            ClientError::InvalidConfig("DATABRICKS_TOKEN environment variable not set".to_string())
        })?;

        let mut config = Self::new(host, token);

        if let Some(timeout) = env_parse::<u64>("BATCHRUN_REQUEST_TIMEOUT") {
            config.request_timeout = Duration::from_secs(timeout);
        }

        if let Some(retries) = env_parse::<u32>("BATCHRUN_STATUS_RETRIES") {
            config.status_retries = retries;
        }

        if let Some(delay) = env_parse::<u64>("BATCHRUN_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(delay);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ClientError::InvalidConfig("host cannot be empty".to_string()));
        }

        if !self.host.starts_with("http://") && !self.host.starts_with("https://") {
            return Err(ClientError::InvalidConfig(
                "host must start with http:// or https://".to_string(),
            ));
        }

        if self.token.is_empty() {
            return Err(ClientError::InvalidConfig("token cannot be empty".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for WorkspaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceConfig")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("status_retries", &self.status_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

//! Batchrun HTTP Client
//!
//! A type-safe HTTP client for the remote runs API, and the
//! [`RunTransport`](batchrun_core::RunTransport) adapter that lets the
//! lifecycle core submit and poll runs through it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use batchrun_client::{WorkspaceClient, WorkspaceConfig};
//! use batchrun_core::{ClusterSpec, Job, JobPayload, RunManager, WaitPolicy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WorkspaceConfig::from_env()?;
//!     let client = WorkspaceClient::new(&config)?;
//!
//!     let mut manager = RunManager::new(Arc::new(client));
//!     manager.register_one(Job::with_payload(JobPayload::new(
//!         "/Shared/etl",
//!         ClusterSpec::ExistingClusterId("0101-abc".to_string()),
//!     )))?;
//!
//!     manager.submit_all().await?;
//!     manager.await_all(&WaitPolicy::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
mod retry;
mod runs;

// Re-export commonly used types
pub use config::WorkspaceConfig;
pub use error::{ClientError, Result};
pub use retry::RetryingTransport;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

/// Version prefix of the runs API
const API_PREFIX: &str = "api/2.0";

/// HTTP client for one workspace's runs API
#[derive(Debug, Clone)]
pub struct WorkspaceClient {
    /// API root (e.g., "https://example.cloud.databricks.com/api/2.0")
    base_url: String,
    /// HTTP client instance, carrying the bearer token
    client: Client,
}

impl WorkspaceClient {
    /// Create a new workspace client
    ///
    /// # Arguments
    /// * `config` - Workspace host, token and request timeout
    ///
    /// # Example
    /// ```
    /// use batchrun_client::{WorkspaceClient, WorkspaceConfig};
    ///
    /// let config = WorkspaceConfig::new("https://example.cloud.databricks.com", "dapi123");
    /// let client = WorkspaceClient::new(&config).unwrap();
    /// assert_eq!(client.base_url(), "https://example.cloud.databricks.com/api/2.0");
    /// ```
    pub fn new(config: &WorkspaceConfig) -> Result<Self> {
        config.validate()?;

        let mut token = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| ClientError::InvalidConfig(format!("token is not a valid header: {}", e)))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self::with_client(&config.host, client))
    }

    /// Create a new workspace client with a custom HTTP client
    ///
    /// The given client must already carry any authentication headers.
    ///
    /// # Arguments
    /// * `host` - The workspace URL
    /// * `client` - A configured reqwest Client
    pub fn with_client(host: &str, client: Client) -> Self {
        Self {
            base_url: format!("{}/{}", host.trim_end_matches('/'), API_PREFIX),
            client,
        }
    }

    /// Get the API root this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

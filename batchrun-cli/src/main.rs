//! Batchrun CLI
//!
//! Command-line interface for submitting notebook runs to a remote workspace
//! and waiting for them to finish.

mod commands;
mod config;
mod types;

use std::time::Duration;

use anyhow::Result;
use batchrun_client::WorkspaceConfig;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "batchrun")]
#[command(about = "Submit and track remote notebook runs", long_about = None)]
struct Cli {
    /// Workspace URL
    #[arg(long, env = "DATABRICKS_HOST")]
    host: String,

    /// Personal access token
    #[arg(long, env = "DATABRICKS_TOKEN", hide_env_values = true)]
    token: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "BATCHRUN_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// How many times a failed status query is repeated
    #[arg(long, env = "BATCHRUN_STATUS_RETRIES", default_value_t = 3)]
    status_retries: u32,

    /// Milliseconds before the first repeated status query, doubled each time
    #[arg(long, env = "BATCHRUN_RETRY_DELAY_MS", default_value_t = 500)]
    retry_delay_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn workspace(&self) -> WorkspaceConfig {
        let mut workspace = WorkspaceConfig::new(&self.host, &self.token);
        workspace.request_timeout = Duration::from_secs(self.request_timeout);
        workspace.status_retries = self.status_retries;
        workspace.retry_delay = Duration::from_millis(self.retry_delay_ms);
        workspace
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batchrun=info,batchrun_core=info,batchrun_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        workspace: cli.workspace(),
    };

    handle_command(cli.command, &config).await
}

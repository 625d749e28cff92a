//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod run;
mod status;

pub use run::RunArgs;

use anyhow::Result;
use batchrun_core::ResultOutcome;
use clap::Subcommand;
use colored::{ColoredString, Colorize};

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit notebooks as one-time runs and wait for them
    Run(RunArgs),
    /// Show the current state of a run
    Status {
        /// Run id returned on submission
        run_id: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run(args) => run::handle_run_command(args, config).await,
        Commands::Status { run_id } => status::handle_status_command(&run_id, config).await,
    }
}

/// Colorize a run outcome for display
pub(crate) fn colorize_outcome(outcome: Option<ResultOutcome>) -> ColoredString {
    match outcome {
        None => "UNKNOWN".dimmed(),
        Some(outcome) => {
            let text = outcome.to_string();
            match outcome {
                ResultOutcome::Success => text.green(),
                ResultOutcome::SuccessWithFailures => text.yellow(),
                ResultOutcome::Canceled
                | ResultOutcome::UpstreamCanceled
                | ResultOutcome::Excluded
                | ResultOutcome::Disabled => text.dimmed(),
                _ => text.red(),
            }
        }
    }
}

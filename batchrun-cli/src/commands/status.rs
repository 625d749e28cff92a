//! Status command handler

use anyhow::{Context, Result};
use batchrun_core::RunId;
use colored::Colorize;

use super::colorize_outcome;
use crate::config::Config;

/// Query one run and print its state
pub async fn handle_status_command(run_id: &str, config: &Config) -> Result<()> {
    let transport = config.connect()?;
    let run_id = RunId::from(run_id);

    let status = transport
        .get_status(&run_id)
        .await
        .with_context(|| format!("Failed to get run {}", run_id))?;

    println!("{}", "Run Details:".bold());
    println!("  Run ID:    {}", run_id.to_string().cyan());
    println!("  Lifecycle: {}", status.lifecycle_state);
    if status.job_state().is_terminal() {
        println!("  Result:    {}", colorize_outcome(status.result_state));
    }
    if let Some(message) = &status.state_message {
        println!("  Message:   {}", message.dimmed());
    }
    if let Some(url) = &status.run_page_url {
        println!("  Dashboard: {}", url.underline());
    }

    Ok(())
}

//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod logs;
mod run;

pub use run::RunCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run metadata
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Follow a run's output until it finishes
    Logs {
        /// Run ID
        run_id: String,

        /// Print each payload exactly as the worker wrote it
        #[arg(long)]
        raw: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Logs { run_id, raw } => logs::follow_logs(config, &run_id, raw).await,
    }
}

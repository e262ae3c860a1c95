//! Run command handlers
//!
//! Listing, viewing and sharing runs.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use evolve_core::domain::run::Run;
use evolve_core::dto::run::RunSummary;

use crate::config::Config;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// List the runs you created or that were shared with you
    List,
    /// Get run details
    Get {
        /// Run ID
        id: String,
    },
    /// Share a run with other users
    Share {
        /// Run ID
        id: String,

        /// Emails of the users to share with (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        email: Vec<String>,
    },
}

/// Handle run commands
///
/// # Arguments
/// * `command` - The run command to execute
/// * `config` - The CLI configuration
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        RunCommands::List => {
            let runs = client.list_runs().await?;

            if runs.is_empty() {
                println!("{}", "No runs found.".yellow());
            } else {
                println!("{}", format!("Found {} run(s):", runs.len()).bold());
                println!();
                for run in runs {
                    print_run_summary(&run);
                }
            }
        }
        RunCommands::Get { id } => {
            let run = match client.get_run(&id).await {
                Ok(run) => run,
                Err(e) if e.is_not_found() => {
                    anyhow::bail!("Run {} does not exist or is not shared with you", id)
                }
                Err(e) => return Err(e.into()),
            };
            print_run_details(&run);
        }
        RunCommands::Share { id, email } => {
            let count = email.len();
            client.share_run(&id, email).await?;
            println!(
                "{}",
                format!("✓ Run {} shared with {} user(s)", id, count)
                    .green()
                    .bold()
            );
        }
    }

    Ok(())
}

fn print_run_summary(run: &RunSummary) {
    println!("  {} {} {}", "▸".cyan(), run.name.bold(), run.id.dimmed());
    println!("    Type:    {}", run.run_type);
    println!("    Status:  {}", colorize_status(&run.status));
    match (&run.shared_by, &run.created_by) {
        (Some(owner), _) => println!("    Shared:  by {}", owner.dimmed()),
        (None, Some(owner)) => println!("    Owner:   {}", owner.dimmed()),
        (None, None) => {}
    }
    println!(
        "    Created: {}",
        run.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

fn print_run_details(run: &Run) {
    println!("{}", "Run Details:".bold());
    println!("  ID:          {}", run.id.cyan());
    println!("  Name:        {}", run.name);
    println!("  Description: {}", run.description);
    println!("  Type:        {}", run.run_type);
    println!("  Status:      {}", colorize_status(&run.status));
    println!("  Command:     {}", run.command.dimmed());
    println!("  Created by:  {}", run.created_by);
    println!("  Created:     {}", run.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:     {}", run.updated_at.format("%Y-%m-%d %H:%M:%S"));
}

/// Colorize run status for display
fn colorize_status(status: &str) -> ColoredString {
    match status.to_ascii_lowercase().as_str() {
        "completed" | "succeeded" | "success" => status.green(),
        "running" => status.cyan(),
        "failed" | "error" => status.red(),
        "scheduled" | "queued" | "pending" => status.yellow(),
        _ => status.normal(),
    }
}

//! Evolve CLI
//!
//! Command-line interface for inspecting runs and following their output.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use evolve_client::ClientError;

#[derive(Parser)]
#[command(name = "evolve")]
#[command(about = "Evolve run monitoring CLI", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, env = "EVOLVE_SERVER_URL", default_value = "http://localhost:5002")]
    server_url: String,

    /// Session token used to authenticate
    #[arg(long, env = "EVOLVE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
        token: cli.token,
    };

    handle_command(cli.command, &config)
        .await
        .map_err(explain_error)
}

/// Add a hint to errors the user can fix themselves
fn explain_error(err: anyhow::Error) -> anyhow::Error {
    let unauthorized = err
        .downcast_ref::<ClientError>()
        .is_some_and(ClientError::is_unauthorized);

    if unauthorized {
        err.context("Session token rejected; pass --token or set EVOLVE_TOKEN")
    } else {
        err
    }
}

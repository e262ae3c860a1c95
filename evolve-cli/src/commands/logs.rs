//! Log following

use anyhow::{Context, Result};
use colored::*;
use evolve_client::{LogEvent, LogLine};
use evolve_core::domain::log::SourceStream;
use evolve_core::domain::run::RunId;
use futures::StreamExt;

use crate::config::Config;

/// Stream a run's output to the terminal until the run finishes
pub async fn follow_logs(config: &Config, run_id: &str, raw: bool) -> Result<()> {
    let run_id = RunId::parse(run_id).context("Invalid run ID")?;
    let client = config.client();

    let mut events = client.follow_run_logs(&run_id).await?;

    if !raw {
        println!("{}", format!("Logs for run {}:", run_id).bold());
        println!("{}", "─".repeat(80).dimmed());
    }

    let mut finished = false;
    while let Some(event) = events.next().await {
        match event? {
            LogEvent::Log(line) if raw => println!("{}", line.raw),
            LogEvent::Log(line) => print_log_line(&line),
            LogEvent::Done(message) => {
                if !raw {
                    println!("{}", "─".repeat(80).dimmed());
                    println!("{}", format!("✓ {}", message).green());
                }
                finished = true;
            }
        }
    }

    if !finished {
        eprintln!("{}", "⚠ Connection closed before the run finished".yellow());
    }

    Ok(())
}

fn print_log_line(line: &LogLine) {
    match &line.entry {
        Some(entry) => match entry.stream {
            SourceStream::Stdout => println!("{}", entry.line),
            SourceStream::Stderr => println!("{}", entry.line.red()),
            SourceStream::Unknown => println!("{}", entry.line.dimmed()),
        },
        None => println!("{}", line.raw.dimmed()),
    }
}

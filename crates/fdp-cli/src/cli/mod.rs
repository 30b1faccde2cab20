//! CLI for the FDP download proxy.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fdp_core::config;

use commands::{run_add, run_remove, run_resume, run_status, RunOptions};

/// Top-level CLI for the FDP download proxy.
#[derive(Debug, Parser)]
#[command(name = "fdp")]
#[command(about = "FDP: self-hosted download proxy (direct HTTP and aria2c delegated)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Submit one or more locators (URL, magnet link, base64 torrent or .torrent path) and wait for them.
    Add {
        /// Locators to download.
        #[arg(required = true)]
        locators: Vec<String>,
        /// Stream live task snapshots to the terminal.
        #[arg(long)]
        watch: bool,
        /// The aria2c daemon is running on the configured RPC port.
        #[arg(long)]
        daemon: bool,
    },

    /// Restore the saved registry, restart unfinished tasks and wait for them.
    Run {
        /// Stream live task snapshots to the terminal.
        #[arg(long)]
        watch: bool,
        /// The aria2c daemon is running on the configured RPC port.
        #[arg(long)]
        daemon: bool,
    },

    /// Show all tasks from the saved registry.
    Status,

    /// Remove a finished task and its files by name.
    Remove {
        /// Task name as shown by `fdp status`.
        name: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Add {
                locators,
                watch,
                daemon,
            } => run_add(&cfg, &locators, RunOptions { watch, daemon }).await?,
            CliCommand::Run { watch, daemon } => {
                run_resume(&cfg, RunOptions { watch, daemon }).await?
            }
            CliCommand::Status => run_status(&cfg)?,
            CliCommand::Remove { name } => run_remove(&cfg, &name).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

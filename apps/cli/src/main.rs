//! cloudsync command-line entry point.

mod app;
mod config;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cloudsync", version, about = "Two-way sync between a local directory and a netdisk folder")]
struct Cli {
    /// Configuration file (default: ~/.config/cloudsync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one reconciliation pass
    Sync {
        /// Do not draw progress bars
        #[arg(long)]
        no_progress: bool,
    },
    /// Precompute local fingerprints into the state database
    Cache,
    /// Show pending and completed transfers
    Status,
    /// Store OAuth tokens obtained out of band
    Login {
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting cloudsync");

    let config = config::Config::load(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli.command, config))
}

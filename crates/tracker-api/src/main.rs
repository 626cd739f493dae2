//! `tracker` binary entrypoint.
//!
//! Loads configuration from environment variables once, initializes
//! structured logging and the metrics recorder, then starts the listeners.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use anyhow::Result;
use clap::{Parser, Subcommand};

use tracker_api::{metrics, server, Config};
use tracker_core::observability::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "tracker", about = "Operational change-event tracker", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tracker server
    Serv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serv => serv().await,
    }
}

async fn serv() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(LogFormat::Json, &config.log_level);
    let _handle = metrics::init_metrics();

    server::run(config).await?;
    Ok(())
}

//! CloudSaves CLI - Command-line interface for CloudSaves
//!
//! Provides commands for:
//! - Synchronizing the local save directory with the storage
//! - Viewing the last sync status
//! - Inspecting and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cloudsaves_core::config::{Config, LoggingConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config::ConfigCommand, status::StatusCommand, sync::SyncCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "cloudsaves", version, about = "Keep game saves in sync with cloud storage")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize saves with the storage
    Sync(SyncCommand),
    /// Show the last synchronization status
    Status(StatusCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Install the tracing subscriber; `RUST_LOG` wins over `-v` and the config
fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    // Logging settings only; commands load the file themselves and report errors
    let logging = Config::load_or_default(&config_path).logging;
    init_tracing(cli.verbose, &logging);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&config_path, format).await,
        Commands::Status(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}

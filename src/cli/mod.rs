//! Command-line interface definitions.

pub mod check;
pub mod run;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tripwire - price-triggered trade automation for prediction markets.
#[derive(Parser, Debug)]
#[command(name = "tripwire")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "tripwire.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the trade manager (foreground)
    Run(RunArgs),

    /// Show rules, trades, and recent events from the local store
    Status(StatusArgs),

    /// Validate configuration and print the effective settings
    Check,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// How many trades and events to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `fleetctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fleetctl",
    version,
    about = "Launch, sequence and supervise per-instrument trainer / signal / trader workers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Fleet.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLEETCTL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the launch plan, but don't spawn anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Train every instrument, then start generators and traders once all are trained.
    StartAll,
    /// Train every instrument (staggered) and keep supervising until Ctrl-C.
    TrainAll,
    /// Start the generator and trader of one (already trained) instrument.
    Start {
        #[arg(value_name = "INSTRUMENT")]
        instrument: String,
    },
    /// Train one instrument.
    Train {
        #[arg(value_name = "INSTRUMENT")]
        instrument: String,
    },
    /// Print the aggregated on-disk status as JSON and exit.
    Status,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

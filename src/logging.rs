// src/logging.rs

//! Logging setup for `fleetctl` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `FLEETCTL_LOG` environment variable, either a bare level ("debug") or
//!    full filter directives ("fleetctl::engine=debug,info")
//! 3. default to `info`
//!
//! Diagnostics go to STDERR. STDOUT carries the multiplexed worker output
//! (`[TRAINER BTCUSDT] ...`) so it can be piped or grepped on its own.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "FLEETCTL_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(level_directive(lvl)),
        None => filter_from_env(std::env::var(LOG_ENV_VAR).ok().as_deref()),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Unset, blank or unparsable values fall back to `info`.
fn filter_from_env(value: Option<&str>) -> EnvFilter {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => EnvFilter::try_new(v.to_lowercase().replace("warning", "warn"))
            .unwrap_or_else(|e| {
                eprintln!("ignoring invalid {LOG_ENV_VAR} value '{v}': {e}");
                EnvFilter::new("info")
            }),
        _ => EnvFilter::new("info"),
    }
}

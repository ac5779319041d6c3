// src/errors.rs

//! Crate-wide error type.
//!
//! Readiness timeouts and undecodable status artifacts are deliberately not
//! represented here: the former is a [`crate::engine::ReadyOutcome`], the
//! latter is swallowed by the state store and reported as "no data yet".

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{InstrumentId, WorkerKey};

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(InstrumentId),

    #[error("Missing executable for {key}: {}", path.display())]
    MissingExecutable { key: WorkerKey, path: PathBuf },

    #[error("Failed to spawn {key}: {source}")]
    SpawnFailed {
        key: WorkerKey,
        #[source]
        source: std::io::Error,
    },

    #[error("Dependency of {0} is not running")]
    DependencyNotRunning(InstrumentId),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FleetError>;

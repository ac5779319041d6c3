// src/state/artifacts.rs

//! On-disk status artifacts exchanged with the worker scripts.
//!
//! - `<shared-dir>/runner_ready.json`: written by the signal generator, reset
//!   to `ready=false` by the orchestrator.
//! - `<instrument-dir>/trainer_status.json`: written by the trainer, marked
//!   `STOPPED` by the orchestrator on an explicit stop.
//! - `<instrument-dir>/last_trained.txt`: unix seconds of the last completed
//!   training pass (continuous trainers refresh it).
//! - `<instrument-dir>/events.jsonl`: line-delimited worker events.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::store::StateStore;

pub const READINESS_FILE: &str = "runner_ready.json";
pub const TRAINER_STATUS_FILE: &str = "trainer_status.json";
pub const TRAINED_MARKER_FILE: &str = "last_trained.txt";
pub const EVENT_LOG_FILE: &str = "events.jsonl";

pub fn readiness_path(shared_dir: &Path) -> PathBuf {
    shared_dir.join(READINESS_FILE)
}

pub fn trainer_status_path(instrument_dir: &Path) -> PathBuf {
    instrument_dir.join(TRAINER_STATUS_FILE)
}

pub fn trained_marker_path(instrument_dir: &Path) -> PathBuf {
    instrument_dir.join(TRAINED_MARKER_FILE)
}

pub fn event_log_path(instrument_dir: &Path) -> PathBuf {
    instrument_dir.join(EVENT_LOG_FILE)
}

/// Current wall clock as fractional unix seconds.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Latest readiness signal of the signal generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessRecord {
    #[serde(default)]
    pub timestamp: f64,
    pub ready: bool,
    #[serde(default)]
    pub stage: String,
}

impl ReadinessRecord {
    pub fn not_ready(stage: impl Into<String>) -> Self {
        Self {
            timestamp: unix_now(),
            ready: false,
            stage: stage.into(),
        }
    }
}

/// Training lifecycle of one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingState {
    NotTrained,
    Training,
    #[serde(alias = "FINISHED")]
    Trained,
    Stopped,
}

/// Contents of `trainer_status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerStatus {
    pub state: TrainingState,
    #[serde(default)]
    pub progress_pct: u32,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<String>,
}

impl TrainerStatus {
    /// Status written when the orchestrator stops a running trainer.
    pub fn stopped(previous: Option<&TrainerStatus>) -> Self {
        Self {
            state: TrainingState::Stopped,
            progress_pct: previous.map(|s| s.progress_pct).unwrap_or(0),
            pid: None,
            start_time: previous.and_then(|s| s.start_time.clone()),
            stop_time: Some(Utc::now().to_rfc3339()),
        }
    }
}

pub fn decode_readiness(text: &str) -> Result<Option<ReadinessRecord>> {
    Ok(Some(serde_json::from_str(text)?))
}

pub fn decode_trainer_status(text: &str) -> Result<Option<TrainerStatus>> {
    Ok(Some(serde_json::from_str(text)?))
}

/// Parse the completion marker: a single unix timestamp in seconds.
pub fn decode_trained_marker(text: &str) -> Result<Option<f64>> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid training marker '{}': {}", text.trim(), e))?;
    Ok(Some(value))
}

/// Decode the last event of a line-delimited JSON log.
///
/// A torn final line (writer mid-append) is a decode failure, so the store
/// retries on the next read.
pub fn decode_last_event(text: &str) -> Result<Option<serde_json::Value>> {
    match text.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(line) => Ok(Some(serde_json::from_str(line)?)),
        None => Ok(None),
    }
}

pub fn read_readiness(store: &mut StateStore, shared_dir: &Path) -> Option<ReadinessRecord> {
    store.get(&readiness_path(shared_dir), decode_readiness, None)
}

pub fn read_trainer_status(store: &mut StateStore, instrument_dir: &Path) -> Option<TrainerStatus> {
    store.get(&trainer_status_path(instrument_dir), decode_trainer_status, None)
}

pub fn read_last_event(store: &mut StateStore, instrument_dir: &Path) -> Option<serde_json::Value> {
    store.get(&event_log_path(instrument_dir), decode_last_event, None)
}

/// Age of the last completed training pass, if the marker exists.
pub fn trained_marker_age(
    store: &mut StateStore,
    instrument_dir: &Path,
    now: SystemTime,
) -> Option<Duration> {
    let stamp = store.get(
        &trained_marker_path(instrument_dir),
        decode_trained_marker,
        None,
    )?;
    let now_secs = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    // Markers from the future (clock skew) count as fresh.
    Duration::try_from_secs_f64((now_secs - stamp).max(0.0)).ok()
}

/// Combine the on-disk status with what the orchestrator knows locally.
///
/// - A terminal `TRAINED` / `FINISHED` marker always wins.
/// - `TRAINING` with a completion marker younger than `recency` counts as
///   trained, so a continuously retraining worker does not hold the fleet back.
/// - Otherwise a trainer process this orchestrator spawned and that is still
///   alive means `TRAINING`, whatever the file says.
/// - Otherwise the file is taken as is (missing or unreadable = `NOT_TRAINED`).
pub fn derive_training_state(
    status: Option<&TrainerStatus>,
    marker_age: Option<Duration>,
    recency: Duration,
    local_trainer_alive: bool,
) -> TrainingState {
    let reported = status.map(|s| s.state).unwrap_or(TrainingState::NotTrained);
    let recently_completed = marker_age.is_some_and(|age| age <= recency);

    match reported {
        TrainingState::Trained => TrainingState::Trained,
        TrainingState::Training if recently_completed => TrainingState::Trained,
        _ if local_trainer_alive => TrainingState::Training,
        other => other,
    }
}

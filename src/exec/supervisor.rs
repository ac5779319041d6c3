// src/exec/supervisor.rs

//! Owns every worker process the orchestrator spawned.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::output::LogLine;
use crate::exec::worker_runner::{request_termination, spawn_worker, LaunchSpec};
use crate::types::WorkerKey;

/// Handle for one spawned worker.
///
/// `started_at` is cleared as soon as a stop is requested, so uptime reads as
/// "stopped" while the process is still shutting down.
#[derive(Debug)]
struct ProcessHandle {
    pid: Option<u32>,
    started_at: Option<Instant>,
    stop_requested: bool,
    child: Child,
}

/// Result of [`ProcessSupervisor::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: Option<u32> },
    /// A live process already exists for this key; nothing was spawned.
    AlreadyRunning { pid: Option<u32> },
}

/// Spawns, tracks and terminates worker processes, at most one per
/// `(instrument, role)`.
///
/// Only the control loop touches the handle table. Reader tasks talk back
/// exclusively through the bounded output queue drained by
/// [`drain_output`](Self::drain_output).
#[derive(Debug)]
pub struct ProcessSupervisor {
    handles: HashMap<WorkerKey, ProcessHandle>,
    output_tx: mpsc::Sender<LogLine>,
    output_rx: mpsc::Receiver<LogLine>,
}

impl ProcessSupervisor {
    /// `queue_capacity` bounds the output queue shared by all reader tasks.
    pub fn new(queue_capacity: usize) -> Self {
        let (output_tx, output_rx) = mpsc::channel(queue_capacity.max(1));
        Self {
            handles: HashMap::new(),
            output_tx,
            output_rx,
        }
    }

    /// Start a worker unless a live one already exists for `key`.
    ///
    /// Starting twice is not an error: the second call reports
    /// [`StartOutcome::AlreadyRunning`] and spawns nothing.
    pub fn start(&mut self, key: &WorkerKey, spec: &LaunchSpec) -> Result<StartOutcome> {
        if self.is_running(key) {
            let pid = self.pid(key);
            debug!(worker = %key, ?pid, "worker already running; start is a no-op");
            return Ok(StartOutcome::AlreadyRunning { pid });
        }

        if self.handles.remove(key).is_some() {
            debug!(worker = %key, "discarding handle of exited worker");
        }

        let child = spawn_worker(key, spec, self.output_tx.clone())?;
        let pid = child.id();
        info!(worker = %key, ?pid, "worker process started");

        self.handles.insert(
            key.clone(),
            ProcessHandle {
                pid,
                started_at: Some(Instant::now()),
                stop_requested: false,
                child,
            },
        );

        Ok(StartOutcome::Started { pid })
    }

    /// Request termination. Does not wait for the process to exit.
    ///
    /// Returns `true` if a live process was asked to stop.
    pub fn stop(&mut self, key: &WorkerKey) -> bool {
        if !self.is_running(key) {
            if self.handles.remove(key).is_some() {
                debug!(worker = %key, "stop on exited worker; handle cleared");
            }
            return false;
        }

        let Some(handle) = self.handles.get_mut(key) else {
            return false;
        };

        if handle.stop_requested {
            debug!(worker = %key, "stop already requested; waiting for exit");
            return false;
        }

        info!(worker = %key, pid = ?handle.pid, "requesting worker termination");
        request_termination(key, &mut handle.child);
        handle.stop_requested = true;
        handle.started_at = None;
        true
    }

    /// True only if a handle exists and the OS reports the process has not exited.
    pub fn is_running(&mut self, key: &WorkerKey) -> bool {
        let Some(handle) = self.handles.get_mut(key) else {
            return false;
        };

        match handle.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if handle.started_at.take().is_some() {
                    info!(worker = %key, code = ?status.code(), "worker process exited");
                }
                false
            }
            Err(e) => {
                warn!(worker = %key, error = %e, "could not query worker status; treating as exited");
                handle.started_at = None;
                false
            }
        }
    }

    /// Time since start, or `None` when not running or stopping.
    pub fn uptime(&self, key: &WorkerKey) -> Option<Duration> {
        self.handles
            .get(key)
            .and_then(|h| h.started_at)
            .map(|t| t.elapsed())
    }

    pub fn pid(&self, key: &WorkerKey) -> Option<u32> {
        self.handles.get(key).and_then(|h| h.pid)
    }

    /// Keys of all processes that are still alive.
    pub fn live_keys(&mut self) -> Vec<WorkerKey> {
        let mut keys: Vec<WorkerKey> = self.handles.keys().cloned().collect();
        keys.retain(|k| self.is_running(k));
        keys.sort();
        keys
    }

    /// Drain all queued output without blocking.
    ///
    /// A worker's synthetic exit line also clears its handle once the OS
    /// confirms the exit.
    pub fn drain_output(&mut self) -> Vec<LogLine> {
        let mut lines = Vec::new();
        while let Ok(line) = self.output_rx.try_recv() {
            if line.exited {
                self.reap(&line.key);
            }
            lines.push(line);
        }
        lines
    }

    fn reap(&mut self, key: &WorkerKey) {
        if !self.is_running(key) && self.handles.remove(key).is_some() {
            debug!(worker = %key, "worker exit confirmed; handle cleared");
        }
    }
}

// src/exec/output.rs

//! Captured worker output.

use std::collections::{BTreeMap, VecDeque};

use crate::types::WorkerKey;

/// Synthetic line emitted exactly once when a worker's output ends.
pub const EXITED_MARKER: &str = "[process exited]";

/// One line of worker output, already formatted as `[<PREFIX>] <line>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub key: WorkerKey,
    pub text: String,
    /// Set on the synthetic final line only.
    pub exited: bool,
}

impl LogLine {
    pub fn output(key: &WorkerKey, prefix: &str, raw: &str) -> Self {
        Self {
            key: key.clone(),
            text: format!("[{prefix}] {raw}"),
            exited: false,
        }
    }

    pub fn exited(key: &WorkerKey, prefix: &str) -> Self {
        Self {
            key: key.clone(),
            text: format!("[{prefix}] {EXITED_MARKER}"),
            exited: true,
        }
    }
}

/// Per-process bounded window of recent output lines.
#[derive(Debug)]
pub struct LogBook {
    window: usize,
    streams: BTreeMap<WorkerKey, VecDeque<String>>,
}

impl LogBook {
    /// `window` is clamped to at least one line.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            streams: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, line: &LogLine) {
        let stream = self.streams.entry(line.key.clone()).or_default();
        stream.push_back(line.text.clone());
        while stream.len() > self.window {
            stream.pop_front();
        }
    }

    /// Recent lines of one process, oldest first.
    pub fn lines(&self, key: &WorkerKey) -> Vec<&str> {
        self.streams
            .get(key)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &WorkerKey> {
        self.streams.keys()
    }
}

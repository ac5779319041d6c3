// src/engine/gate.rs

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::types::InstrumentId;

/// Final result of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadyOutcome {
    /// The generator reported `ready = true`.
    Ready,
    /// The attempt budget ran out. Callers proceed anyway (fail-open).
    TimedOut,
    /// The generator stopped running while we waited.
    Cancelled,
}

impl ReadyOutcome {
    /// Whether the dependent role may be started.
    pub fn proceeds(self) -> bool {
        matches!(self, ReadyOutcome::Ready | ReadyOutcome::TimedOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Waiting,
    Done(ReadyOutcome),
}

/// Where a gate gets its two signals from.
pub trait ReadinessSource {
    /// Is the generator of `instrument` still alive?
    fn dependency_running(&mut self, instrument: &str) -> bool;
    /// Does the readiness artifact currently say `ready = true`?
    fn read_ready(&mut self, instrument: &str) -> bool;
}

/// Bounded-retry wait for a generator's readiness signal, advanced one
/// control tick at a time.
///
/// Every poll first checks that the generator is alive, so a dead dependency
/// cancels the wait within one tick. The artifact itself is read at most once
/// per `interval`; after more than `max_attempts` negative reads the gate
/// resolves to [`ReadyOutcome::TimedOut`].
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    instrument: InstrumentId,
    max_attempts: u32,
    interval: Duration,
    attempts: u32,
    next_attempt: Option<Instant>,
    outcome: Option<ReadyOutcome>,
}

impl ReadinessGate {
    pub fn new(instrument: impl Into<InstrumentId>, max_attempts: u32, interval: Duration) -> Self {
        Self {
            instrument: instrument.into(),
            max_attempts,
            interval,
            attempts: 0,
            next_attempt: None,
            outcome: None,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Negative readiness reads so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn outcome(&self) -> Option<ReadyOutcome> {
        self.outcome
    }

    /// Advance the wait. Never blocks.
    pub fn poll<S>(&mut self, now: Instant, source: &mut S) -> GateStatus
    where
        S: ReadinessSource + ?Sized,
    {
        if let Some(outcome) = self.outcome {
            return GateStatus::Done(outcome);
        }

        if !source.dependency_running(&self.instrument) {
            warn!(instrument = %self.instrument, "generator is not running; readiness wait cancelled");
            return self.finish(ReadyOutcome::Cancelled);
        }

        if self.next_attempt.is_some_and(|next| now < next) {
            return GateStatus::Waiting;
        }

        if source.read_ready(&self.instrument) {
            info!(instrument = %self.instrument, attempts = self.attempts, "generator reported ready");
            return self.finish(ReadyOutcome::Ready);
        }

        self.attempts += 1;
        if self.attempts > self.max_attempts {
            warn!(
                instrument = %self.instrument,
                attempts = self.attempts,
                "generator never reported ready; proceeding anyway"
            );
            return self.finish(ReadyOutcome::TimedOut);
        }

        debug!(
            instrument = %self.instrument,
            attempt = self.attempts,
            max_attempts = self.max_attempts,
            "generator not ready yet"
        );
        self.next_attempt = Some(now + self.interval);
        GateStatus::Waiting
    }

    fn finish(&mut self, outcome: ReadyOutcome) -> GateStatus {
        self.outcome = Some(outcome);
        GateStatus::Done(outcome)
    }
}

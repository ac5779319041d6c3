// src/engine/mod.rs

//! Orchestration engine for fleetctl.
//!
//! - [`gate`]: bounded wait for a generator's readiness signal.
//! - [`sequencer`]: the pure state machine deciding what to start and stop.
//! - [`fleet`]: the production IO behind the sequencer (processes + artifacts).
//! - [`snapshot`]: the read-only status view published to observers.
//! - [`runtime`]: the async control loop tying it all together.

use std::time::Duration;

/// Requests accepted by the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    StartAll,
    StopAll,
    TrainAll,
    TrainInstrument(String),
    StartInstrument(String),
    StopInstrument(String),
    /// Replace the managed instrument list; removed instruments are stopped.
    SetInstruments(Vec<String>),
    Shutdown,
}

/// Control loop settings.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub tick: Duration,
    /// Lines of output kept per process.
    pub log_window: usize,
    /// Print worker output to stdout as it arrives.
    pub echo_output: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(500),
            log_window: 500,
            echo_output: true,
        }
    }
}

pub mod fleet;
pub mod gate;
pub mod runtime;
pub mod sequencer;
pub mod snapshot;

pub use fleet::{FleetSettings, LiveFleet};
pub use gate::{GateStatus, ReadinessGate, ReadinessSource, ReadyOutcome};
pub use runtime::Runtime;
pub use sequencer::{FleetControl, InstrumentPhase, Sequencer, SequencerOptions};
pub use snapshot::{FleetSnapshot, InstrumentSnapshot, RoleSnapshot};

// src/engine/snapshot.rs

//! Read-only view of the fleet published after every control tick.

use serde::Serialize;

use crate::engine::sequencer::InstrumentPhase;
use crate::state::{ReadinessRecord, TrainingState};
use crate::types::{InstrumentId, Role};

#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetSnapshot {
    pub instruments: Vec<InstrumentSnapshot>,
    pub all_trained: bool,
    /// A fleet-wide start is still in progress.
    pub start_pending: bool,
    /// Current contents of the shared readiness artifact.
    pub readiness: Option<ReadinessRecord>,
}

impl FleetSnapshot {
    pub fn instrument(&self, id: &str) -> Option<&InstrumentSnapshot> {
        self.instruments.iter().find(|i| i.id == id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentSnapshot {
    pub id: InstrumentId,
    /// False while a removed instrument's workers are still shutting down.
    pub active: bool,
    pub phase: InstrumentPhase,
    pub training: TrainingState,
    pub progress_pct: u32,
    pub roles: Vec<RoleSnapshot>,
    /// Last record of the instrument's event log, if any.
    pub last_event: Option<serde_json::Value>,
}

impl InstrumentSnapshot {
    pub fn role(&self, role: Role) -> Option<&RoleSnapshot> {
        self.roles.iter().find(|r| r.role == role)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleSnapshot {
    pub role: Role,
    pub running: bool,
    pub pid: Option<u32>,
    pub uptime_secs: Option<u64>,
    pub last_output: Option<String>,
}

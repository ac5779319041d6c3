use std::collections::{BTreeMap, BTreeSet};

use fleetctl::engine::{FleetControl, ReadinessSource};
use fleetctl::errors::{FleetError, Result};
use fleetctl::state::TrainingState;
use fleetctl::types::{normalize_id, InstrumentId, Role, WorkerKey};

/// One side effect requested by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetCall {
    Spawn(InstrumentId, Role),
    Stop(InstrumentId, Role),
    ResetReadiness,
}

/// In-memory fleet that:
/// - records every spawn / stop / readiness reset in order
/// - tracks which roles are "running"
/// - reports scripted training states and a scripted readiness flag.
#[derive(Debug, Default)]
pub struct FakeFleet {
    ids: Vec<InstrumentId>,
    running: BTreeSet<(InstrumentId, Role)>,
    training: BTreeMap<InstrumentId, TrainingState>,
    failing: BTreeSet<(InstrumentId, Role)>,
    ready: bool,
    calls: Vec<FleetCall>,
}

impl FakeFleet {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| normalize_id(s)).collect(),
            ..Self::default()
        }
    }

    pub fn set_training(&mut self, id: &str, state: TrainingState) {
        self.training.insert(normalize_id(id), state);
    }

    pub fn train_everything(&mut self) {
        for id in self.ids.clone() {
            self.set_training(&id, TrainingState::Trained);
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn fail_spawn(&mut self, id: &str, role: Role) {
        self.failing.insert((normalize_id(id), role));
    }

    /// Simulate a process dying on its own (no stop request recorded).
    pub fn kill(&mut self, id: &str, role: Role) {
        self.running.remove(&(normalize_id(id), role));
    }

    pub fn alive(&self, id: &str, role: Role) -> bool {
        self.running.contains(&(normalize_id(id), role))
    }

    pub fn calls(&self) -> &[FleetCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn spawns(&self) -> Vec<(InstrumentId, Role)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                FleetCall::Spawn(id, role) => Some((id.clone(), *role)),
                _ => None,
            })
            .collect()
    }

    pub fn stops(&self) -> Vec<(InstrumentId, Role)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                FleetCall::Stop(id, role) => Some((id.clone(), *role)),
                _ => None,
            })
            .collect()
    }

    /// Position of the first matching call, for ordering assertions.
    pub fn position(&self, call: &FleetCall) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }
}

impl ReadinessSource for FakeFleet {
    fn dependency_running(&mut self, instrument: &str) -> bool {
        self.alive(instrument, Role::Generator)
    }

    fn read_ready(&mut self, _instrument: &str) -> bool {
        self.ready
    }
}

impl FleetControl for FakeFleet {
    fn instruments(&self) -> Vec<InstrumentId> {
        self.ids.clone()
    }

    fn spawn(&mut self, instrument: &str, role: Role) -> Result<()> {
        let id = normalize_id(instrument);
        self.calls.push(FleetCall::Spawn(id.clone(), role));
        if self.failing.contains(&(id.clone(), role)) {
            return Err(FleetError::SpawnFailed {
                key: WorkerKey::new(id, role),
                source: std::io::Error::other("scripted spawn failure"),
            });
        }
        self.running.insert((id, role));
        Ok(())
    }

    fn stop(&mut self, instrument: &str, role: Role) {
        let id = normalize_id(instrument);
        self.calls.push(FleetCall::Stop(id.clone(), role));
        self.running.remove(&(id, role));
    }

    fn is_running(&mut self, instrument: &str, role: Role) -> bool {
        self.alive(instrument, role)
    }

    fn training_state(&mut self, instrument: &str) -> TrainingState {
        let id = normalize_id(instrument);
        let reported = self
            .training
            .get(&id)
            .copied()
            .unwrap_or(TrainingState::NotTrained);
        if reported != TrainingState::Trained && self.alive(&id, Role::Trainer) {
            TrainingState::Training
        } else {
            reported
        }
    }

    fn reset_readiness(&mut self) {
        self.calls.push(FleetCall::ResetReadiness);
        self.ready = false;
    }
}

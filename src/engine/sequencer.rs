// src/engine/sequencer.rs

//! Core state machine sequencing the worker roles of every instrument.
//!
//! The sequencer owns no processes and performs no IO of its own: everything
//! goes through a [`FleetControl`] implementation, the production one being
//! [`crate::engine::LiveFleet`]. Tests drive it with a recording fake.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dag::RoleGraph;
use crate::engine::gate::{GateStatus, ReadinessGate, ReadinessSource, ReadyOutcome};
use crate::errors::{FleetError, Result};
use crate::state::TrainingState;
use crate::types::{normalize_id, InstrumentId, Role};

/// Everything the sequencer needs from the outside world.
pub trait FleetControl: ReadinessSource {
    /// Instruments currently managed, in configuration order.
    fn instruments(&self) -> Vec<InstrumentId>;
    /// Start a role; a no-op success if it is already running.
    fn spawn(&mut self, instrument: &str, role: Role) -> Result<()>;
    /// Request termination of a role; a no-op if it is not running.
    fn stop(&mut self, instrument: &str, role: Role);
    fn is_running(&mut self, instrument: &str, role: Role) -> bool;
    fn training_state(&mut self, instrument: &str) -> TrainingState;
    /// Overwrite the readiness artifact with `ready = false`.
    fn reset_readiness(&mut self);
}

/// Where one instrument currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentPhase {
    Idle,
    Training,
    TrainedWaiting,
    Generating,
    Trading,
}

#[derive(Debug, Clone, Copy)]
pub struct SequencerOptions {
    pub readiness_max_attempts: u32,
    pub readiness_interval: Duration,
    pub train_stagger: Duration,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            readiness_max_attempts: 40,
            readiness_interval: Duration::from_millis(500),
            train_stagger: Duration::from_millis(750),
        }
    }
}

/// Progress of a fleet-wide start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FleetStart {
    Idle,
    /// Training launched; waiting until every instrument reports trained.
    AwaitingTrained,
    /// Generators started; waiting on their readiness gates.
    AwaitingReady,
}

#[derive(Debug, Clone)]
struct PendingLaunch {
    instrument: InstrumentId,
    due: Instant,
}

#[derive(Debug)]
pub struct Sequencer {
    options: SequencerOptions,
    roles: RoleGraph,
    fleet: FleetStart,
    /// Readiness waits in flight, one per instrument whose generator was started.
    gates: BTreeMap<InstrumentId, ReadinessGate>,
    /// Staggered trainer launches not yet due.
    launches: VecDeque<PendingLaunch>,
}

impl Sequencer {
    pub fn new(options: SequencerOptions) -> Self {
        Self {
            options,
            roles: RoleGraph::new(),
            fleet: FleetStart::Idle,
            gates: BTreeMap::new(),
            launches: VecDeque::new(),
        }
    }

    /// A fleet-wide start has been requested and has not finished or been cancelled.
    pub fn is_start_pending(&self) -> bool {
        self.fleet != FleetStart::Idle
    }

    /// Instruments with a readiness wait in flight.
    pub fn waiting_on_readiness(&self) -> Vec<InstrumentId> {
        self.gates.keys().cloned().collect()
    }

    /// Instruments with a staggered training launch still queued.
    pub fn queued_training(&self) -> Vec<InstrumentId> {
        self.launches.iter().map(|l| l.instrument.clone()).collect()
    }

    /// True iff every managed instrument reports `TRAINED`.
    pub fn all_trained<F>(&self, io: &mut F) -> bool
    where
        F: FleetControl + ?Sized,
    {
        io.instruments()
            .iter()
            .all(|id| io.training_state(id) == TrainingState::Trained)
    }

    pub fn phase_of<F>(&self, io: &mut F, instrument: &str) -> InstrumentPhase
    where
        F: FleetControl + ?Sized,
    {
        if io.is_running(instrument, Role::Trader) {
            return InstrumentPhase::Trading;
        }
        if io.is_running(instrument, Role::Generator) {
            return InstrumentPhase::Generating;
        }
        match io.training_state(instrument) {
            TrainingState::Training => InstrumentPhase::Training,
            TrainingState::Trained => InstrumentPhase::TrainedWaiting,
            TrainingState::NotTrained | TrainingState::Stopped => InstrumentPhase::Idle,
        }
    }

    /// Train one instrument now.
    ///
    /// Its generator is stopped first: training rewrites artifacts the
    /// generator reads. An instrument that is already trained is retrained.
    pub fn train_instrument<F>(&mut self, io: &mut F, instrument: &str) -> Result<()>
    where
        F: FleetControl + ?Sized,
    {
        let id = known_instrument(io, instrument)?;
        self.launches.retain(|l| l.instrument != id);
        self.launch_training(io, &id, true)
    }

    /// Queue training for every instrument, staggered by
    /// `options.train_stagger`. The first launch happens immediately, the
    /// rest on later ticks.
    pub fn train_all<F>(&mut self, io: &mut F, now: Instant)
    where
        F: FleetControl + ?Sized,
    {
        let mut slot = 0u32;
        for id in io.instruments() {
            if self.launches.iter().any(|l| l.instrument == id) {
                continue;
            }
            let due = now + self.options.train_stagger * slot;
            slot += 1;
            self.launches.push_back(PendingLaunch { instrument: id, due });
        }
        info!(queued = self.launches.len(), "fleet training queued");
        self.launch_due(io, now);
    }

    /// Train everything, then generators, then (once ready) traders.
    ///
    /// A second call while a start is pending is ignored.
    pub fn start_all<F>(&mut self, io: &mut F, now: Instant)
    where
        F: FleetControl + ?Sized,
    {
        if self.is_start_pending() {
            info!("fleet start already pending; ignoring duplicate request");
            return;
        }
        info!("fleet start requested");
        self.fleet = FleetStart::AwaitingTrained;
        self.train_all(io, now);
    }

    /// Cancel any pending start, then stop traders, generators and trainers
    /// (in that order, across all instruments) and reset readiness.
    pub fn stop_all<F>(&mut self, io: &mut F)
    where
        F: FleetControl + ?Sized,
    {
        self.cancel_pending();
        info!("stopping all workers");

        let ids = io.instruments();
        for role in self.roles.teardown_order() {
            for id in ids.iter() {
                io.stop(id, role);
            }
        }
        io.reset_readiness();
    }

    /// Start the generator of one instrument and its trader once ready.
    ///
    /// Training is not checked: the caller makes sure the instrument is trained.
    pub fn start_instrument<F>(&mut self, io: &mut F, instrument: &str) -> Result<()>
    where
        F: FleetControl + ?Sized,
    {
        let id = known_instrument(io, instrument)?;
        if self.gates.contains_key(&id) {
            debug!(instrument = %id, "readiness wait already in flight; start is a no-op");
            return Ok(());
        }
        if io.is_running(&id, Role::Trader) {
            debug!(instrument = %id, "trader already running; start is a no-op");
            return Ok(());
        }
        self.start_generation(io, &id)
    }

    /// Stop one instrument's roles in reverse dependency order.
    pub fn stop_instrument<F>(&mut self, io: &mut F, instrument: &str) -> Result<()>
    where
        F: FleetControl + ?Sized,
    {
        let id = known_instrument(io, instrument)?;
        self.stop_roles(io, &id);

        let others_generating = io
            .instruments()
            .iter()
            .filter(|other| **other != id)
            .any(|other| io.is_running(other, Role::Generator));
        if !others_generating {
            io.reset_readiness();
        }
        Ok(())
    }

    /// Stop the workers of an instrument that left the configuration.
    pub fn retire<F>(&mut self, io: &mut F, instrument: &str)
    where
        F: FleetControl + ?Sized,
    {
        let id = normalize_id(instrument);
        info!(instrument = %id, "stopping workers of retired instrument");
        self.stop_roles(io, &id);
    }

    /// One control tick: launch due trainers, advance the fleet start and
    /// poll readiness gates. Failures are logged per instrument, never raised.
    pub fn tick<F>(&mut self, io: &mut F, now: Instant)
    where
        F: FleetControl + ?Sized,
    {
        self.launch_due(io, now);

        if self.fleet == FleetStart::AwaitingTrained
            && self.launches.is_empty()
            && self.all_trained(io)
        {
            info!("all instruments trained; starting signal generators");
            for id in io.instruments() {
                if let Err(err) = self.start_generation(io, &id) {
                    warn!(instrument = %id, error = %err, "could not start signal generator");
                }
            }
            self.fleet = FleetStart::AwaitingReady;
        }

        self.poll_gates(io, now);

        if self.fleet == FleetStart::AwaitingReady && self.gates.is_empty() {
            info!("fleet start sequence finished");
            self.fleet = FleetStart::Idle;
        }
    }

    fn cancel_pending(&mut self) {
        if self.is_start_pending() || !self.gates.is_empty() || !self.launches.is_empty() {
            info!(
                gates = self.gates.len(),
                launches = self.launches.len(),
                "cancelling pending start sequence"
            );
        }
        self.fleet = FleetStart::Idle;
        self.gates.clear();
        self.launches.clear();
    }

    fn stop_roles<F>(&mut self, io: &mut F, id: &str)
    where
        F: FleetControl + ?Sized,
    {
        self.gates.remove(id);
        self.launches.retain(|l| l.instrument != id);
        for role in self.roles.teardown_order() {
            io.stop(id, role);
        }
    }

    fn launch_due<F>(&mut self, io: &mut F, now: Instant)
    where
        F: FleetControl + ?Sized,
    {
        while self.launches.front().is_some_and(|l| l.due <= now) {
            let Some(launch) = self.launches.pop_front() else {
                break;
            };
            if let Err(err) = self.launch_training(io, &launch.instrument, false) {
                warn!(instrument = %launch.instrument, error = %err, "could not start trainer");
            }
        }
    }

    /// Fleet fan-out skips trained instruments; an explicit request
    /// (`retrain`) does not.
    fn launch_training<F>(&mut self, io: &mut F, id: &str, retrain: bool) -> Result<()>
    where
        F: FleetControl + ?Sized,
    {
        if !retrain && io.training_state(id) == TrainingState::Trained {
            debug!(instrument = %id, "already trained; nothing to do");
            return Ok(());
        }
        if io.is_running(id, Role::Trainer) {
            debug!(instrument = %id, "trainer already running");
            return Ok(());
        }

        io.stop(id, Role::Generator);
        io.spawn(id, Role::Trainer)
    }

    fn start_generation<F>(&mut self, io: &mut F, id: &str) -> Result<()>
    where
        F: FleetControl + ?Sized,
    {
        // A stale "ready" from a previous run must not satisfy the new wait.
        if !io.is_running(id, Role::Generator) {
            io.reset_readiness();
        }
        io.spawn(id, Role::Generator)?;

        self.gates.insert(
            id.to_string(),
            ReadinessGate::new(
                id,
                self.options.readiness_max_attempts,
                self.options.readiness_interval,
            ),
        );
        Ok(())
    }

    fn poll_gates<F>(&mut self, io: &mut F, now: Instant)
    where
        F: FleetControl + ?Sized,
    {
        let mut resolved = Vec::new();
        for (id, gate) in self.gates.iter_mut() {
            if let GateStatus::Done(outcome) = gate.poll(now, io) {
                resolved.push((id.clone(), outcome));
            }
        }

        for (id, outcome) in resolved {
            self.gates.remove(&id);
            match outcome {
                ReadyOutcome::Ready | ReadyOutcome::TimedOut => {
                    if let Err(err) = io.spawn(&id, Role::Trader) {
                        warn!(instrument = %id, error = %err, "could not start trader");
                    }
                }
                ReadyOutcome::Cancelled => {
                    let err = FleetError::DependencyNotRunning(id.clone());
                    warn!(instrument = %id, error = %err, "trader not started");
                }
            }
        }
    }
}

fn known_instrument<F>(io: &F, instrument: &str) -> Result<InstrumentId>
where
    F: FleetControl + ?Sized,
{
    let id = normalize_id(instrument);
    if io.instruments().contains(&id) {
        Ok(id)
    } else {
        Err(FleetError::UnknownInstrument(id))
    }
}

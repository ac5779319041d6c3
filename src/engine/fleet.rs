// src/engine/fleet.rs

//! Production [`FleetControl`]: real processes, real status artifacts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::engine::gate::ReadinessSource;
use crate::engine::sequencer::{FleetControl, Sequencer};
use crate::engine::snapshot::{FleetSnapshot, InstrumentSnapshot, RoleSnapshot};
use crate::errors::{FleetError, Result};
use crate::exec::{LaunchSpec, LogBook, LogLine, ProcessSupervisor, StartOutcome};
use crate::fs::FileSystem;
use crate::registry::InstrumentRegistry;
use crate::state::artifacts::{
    read_readiness, read_last_event, read_trainer_status, readiness_path, trained_marker_age,
    trainer_status_path,
};
use crate::state::{derive_training_state, ReadinessRecord, StateStore, TrainerStatus, TrainingState};
use crate::types::{normalize_id, InstrumentId, Role, WorkerKey};

/// Launch parameters shared by every worker.
#[derive(Debug, Clone)]
pub struct FleetSettings {
    pub interpreter: PathBuf,
    pub shared_dir: PathBuf,
    pub shared_dir_var: String,
    pub flags: BTreeMap<String, bool>,
    pub trained_recency: Duration,
}

impl FleetSettings {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            interpreter: PathBuf::from(&cfg.config.interpreter),
            shared_dir: cfg.shared_dir(),
            shared_dir_var: cfg.env.shared_dir_var.clone(),
            flags: cfg.env.flags.clone(),
            trained_recency: cfg.trained_recency(),
        }
    }
}

/// Registry, supervisor and state store behind one [`FleetControl`].
#[derive(Debug)]
pub struct LiveFleet {
    fs: Arc<dyn FileSystem>,
    registry: InstrumentRegistry,
    supervisor: ProcessSupervisor,
    store: StateStore,
    settings: FleetSettings,
}

impl LiveFleet {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        registry: InstrumentRegistry,
        supervisor: ProcessSupervisor,
        settings: FleetSettings,
    ) -> Self {
        let store = StateStore::new(Arc::clone(&fs));
        Self {
            fs,
            registry,
            supervisor,
            store,
            settings,
        }
    }

    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Self {
        let registry = InstrumentRegistry::from_config(cfg, Arc::clone(&fs));
        let supervisor = ProcessSupervisor::new(cfg.config.output_queue);
        Self::new(fs, registry, supervisor, FleetSettings::from_config(cfg))
    }

    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    pub fn supervisor_mut(&mut self) -> &mut ProcessSupervisor {
        &mut self.supervisor
    }

    pub fn settings(&self) -> &FleetSettings {
        &self.settings
    }

    /// `<interpreter> <script> <ID>` in the instrument directory, with the
    /// shared directory and feature flags in the environment.
    pub fn launch_spec(&mut self, instrument: &str, role: Role) -> Result<LaunchSpec> {
        let resolved = self.registry.resolve(instrument)?;
        let script = resolved
            .script(role)
            .map(PathBuf::from)
            .ok_or_else(|| FleetError::UnknownInstrument(resolved.id.clone()))?;

        let mut env = vec![(
            self.settings.shared_dir_var.clone(),
            self.settings.shared_dir.display().to_string(),
        )];
        for (flag, on) in self.settings.flags.iter() {
            env.push((flag.clone(), if *on { "1" } else { "0" }.to_string()));
        }

        Ok(LaunchSpec {
            program: self.settings.interpreter.clone(),
            script,
            args: vec![resolved.id.clone()],
            env,
            cwd: resolved.dir,
        })
    }

    pub fn drain_output(&mut self) -> Vec<LogLine> {
        self.supervisor.drain_output()
    }

    /// Replace the instrument list. Returns the ids that were retired.
    pub fn set_instruments(&mut self, ids: &[String]) -> Vec<InstrumentId> {
        let ids: Vec<String> = ids
            .iter()
            .map(|s| normalize_id(s))
            .filter(|s| !s.is_empty())
            .collect();
        self.registry.apply(&ids)
    }

    /// Forget retired instruments whose workers have all exited.
    pub fn prune_retired(&mut self) -> Vec<InstrumentId> {
        let retired: Vec<InstrumentId> = self
            .registry
            .ids()
            .into_iter()
            .filter(|id| self.registry.get(id).is_some_and(|e| !e.active))
            .collect();

        let mut pruned = Vec::new();
        for id in retired {
            let alive = Role::ALL
                .into_iter()
                .any(|role| self.supervisor.is_running(&WorkerKey::new(id.clone(), role)));
            if !alive && self.registry.remove(&id) {
                pruned.push(id);
            }
        }
        pruned
    }

    /// Aggregate process and artifact state into a snapshot.
    pub fn snapshot(&mut self, sequencer: &Sequencer, logbook: &LogBook) -> FleetSnapshot {
        let mut instruments = Vec::new();

        for id in self.registry.ids() {
            let Some(entry) = self.registry.get(&id).cloned() else {
                continue;
            };
            let status = read_trainer_status(&mut self.store, &entry.dir);
            let training = self.training_state(&id);
            let phase = sequencer.phase_of(&mut *self, &id);

            let roles = Role::ALL
                .into_iter()
                .map(|role| {
                    let key = WorkerKey::new(id.clone(), role);
                    RoleSnapshot {
                        role,
                        running: self.supervisor.is_running(&key),
                        pid: self.supervisor.pid(&key),
                        uptime_secs: self.supervisor.uptime(&key).map(|d| d.as_secs()),
                        last_output: logbook.lines(&key).last().map(|s| s.to_string()),
                    }
                })
                .collect();

            instruments.push(InstrumentSnapshot {
                id: id.clone(),
                active: entry.active,
                phase,
                training,
                progress_pct: status.map(|s| s.progress_pct).unwrap_or(0),
                roles,
                last_event: read_last_event(&mut self.store, &entry.dir),
            });
        }

        FleetSnapshot {
            instruments,
            all_trained: sequencer.all_trained(&mut *self),
            start_pending: sequencer.is_start_pending(),
            readiness: read_readiness(&mut self.store, &self.settings.shared_dir),
        }
    }

    fn key(instrument: &str, role: Role) -> WorkerKey {
        WorkerKey::new(normalize_id(instrument), role)
    }

    fn mark_trainer_stopped(&mut self, instrument: &str, previous: Option<TrainerStatus>) {
        let Some(dir) = self.registry.dir_of(instrument).map(PathBuf::from) else {
            return;
        };
        let status = TrainerStatus::stopped(previous.as_ref());
        if let Err(err) = self.store.write_json(&trainer_status_path(&dir), &status) {
            warn!(instrument, error = %err, "could not record stopped trainer");
        }
    }
}

impl ReadinessSource for LiveFleet {
    fn dependency_running(&mut self, instrument: &str) -> bool {
        self.supervisor.is_running(&Self::key(instrument, Role::Generator))
    }

    fn read_ready(&mut self, _instrument: &str) -> bool {
        read_readiness(&mut self.store, &self.settings.shared_dir).is_some_and(|r| r.ready)
    }
}

impl FleetControl for LiveFleet {
    fn instruments(&self) -> Vec<InstrumentId> {
        self.registry.active_ids()
    }

    fn spawn(&mut self, instrument: &str, role: Role) -> Result<()> {
        let spec = self.launch_spec(instrument, role)?;
        if !self.fs.is_dir(&self.settings.shared_dir) {
            self.fs.create_dir_all(&self.settings.shared_dir)?;
        }
        match self.supervisor.start(&Self::key(instrument, role), &spec)? {
            StartOutcome::Started { pid } => debug!(instrument, %role, ?pid, "spawned"),
            StartOutcome::AlreadyRunning { pid } => {
                debug!(instrument, %role, ?pid, "already running")
            }
        }
        Ok(())
    }

    fn stop(&mut self, instrument: &str, role: Role) {
        let previous = match (role, self.registry.dir_of(instrument)) {
            (Role::Trainer, Some(dir)) => {
                let dir = dir.to_path_buf();
                read_trainer_status(&mut self.store, &dir)
            }
            _ => None,
        };

        if self.supervisor.stop(&Self::key(instrument, role)) && role == Role::Trainer {
            self.mark_trainer_stopped(instrument, previous);
        }
    }

    fn is_running(&mut self, instrument: &str, role: Role) -> bool {
        self.supervisor.is_running(&Self::key(instrument, role))
    }

    fn training_state(&mut self, instrument: &str) -> TrainingState {
        let Some(dir) = self.registry.dir_of(instrument).map(PathBuf::from) else {
            return TrainingState::NotTrained;
        };
        let status = read_trainer_status(&mut self.store, &dir);
        let marker_age = trained_marker_age(&mut self.store, &dir, SystemTime::now());
        let local = self.supervisor.is_running(&Self::key(instrument, Role::Trainer));
        derive_training_state(
            status.as_ref(),
            marker_age,
            self.settings.trained_recency,
            local,
        )
    }

    fn reset_readiness(&mut self) {
        let path = readiness_path(&self.settings.shared_dir);
        match self.store.write_json(&path, &ReadinessRecord::not_ready("reset")) {
            Ok(()) => info!(path = ?path, "readiness reset"),
            Err(err) => warn!(path = ?path, error = %err, "could not reset readiness"),
        }
    }
}

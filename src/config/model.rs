// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::types::{normalize_id, InstrumentId, Role};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// base_dir = "workers"
/// interpreter = "python3"
///
/// [env]
/// shared_dir_var = "FLEET_SHARED_DIR"
/// flags = { paper_trading = true }
///
/// [roles]
/// trainer = "trainer.py"
///
/// [instruments]
/// primary = "BTCUSDT"
/// list = ["BTCUSDT", "ETHUSDT"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub env: EnvSection,

    #[serde(default)]
    pub roles: RolesSection,

    #[serde(default)]
    pub instruments: InstrumentsSection,
}

/// Validated configuration. Only constructible through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub env: EnvSection,
    pub roles: RolesSection,
    pub instruments: InstrumentsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        env: EnvSection,
        roles: RolesSection,
        instruments: InstrumentsSection,
    ) -> Self {
        Self {
            config,
            env,
            roles,
            instruments,
        }
    }

    /// Make relative directories relative to `root` (the config file's directory).
    pub fn rebase(&mut self, root: &Path) {
        if self.config.base_dir.is_relative() {
            self.config.base_dir = root.join(&self.config.base_dir);
        }
        if let Some(shared) = self.config.shared_dir.as_mut() {
            if shared.is_relative() {
                *shared = root.join(&*shared);
            }
        }
    }

    /// Normalised instrument ids, in configuration order.
    pub fn instrument_ids(&self) -> Vec<InstrumentId> {
        self.instruments.list.iter().map(|s| normalize_id(s)).collect()
    }

    /// The primary instrument: explicit `primary`, else the first listed one.
    pub fn primary_instrument(&self) -> Option<InstrumentId> {
        self.instruments
            .primary
            .as_deref()
            .map(normalize_id)
            .or_else(|| self.instrument_ids().into_iter().next())
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.config
            .shared_dir
            .clone()
            .unwrap_or_else(|| self.config.base_dir.join("shared"))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.config.tick_ms)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(self.config.readiness_interval_ms)
    }

    pub fn train_stagger(&self) -> Duration {
        Duration::from_millis(self.config.train_stagger_ms)
    }

    pub fn trained_recency(&self) -> Duration {
        Duration::from_secs(self.config.trained_recency_secs)
    }
}

/// `[config]` section: directories, interpreter and control-loop timing.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Working directory of the primary instrument; other instruments get a
    /// subdirectory below it.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Directory shared by all workers (holds `runner_ready.json`).
    /// Defaults to `<base_dir>/shared`.
    #[serde(default)]
    pub shared_dir: Option<PathBuf>,

    /// Program used to run each worker script.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Control loop period.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Readiness polls before failing open.
    #[serde(default = "default_readiness_max_attempts")]
    pub readiness_max_attempts: u32,

    #[serde(default = "default_readiness_interval_ms")]
    pub readiness_interval_ms: u64,

    /// Delay between successive trainer launches of a fleet-wide train.
    #[serde(default = "default_train_stagger_ms")]
    pub train_stagger_ms: u64,

    /// A `TRAINING` instrument whose completion marker is younger than this
    /// counts as trained.
    #[serde(default = "default_trained_recency_secs")]
    pub trained_recency_secs: u64,

    /// Lines of output kept per process.
    #[serde(default = "default_log_window")]
    pub log_window: usize,

    /// Capacity of the output queue shared by all reader tasks.
    #[serde(default = "default_output_queue")]
    pub output_queue: usize,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_tick_ms() -> u64 {
    500
}

fn default_readiness_max_attempts() -> u32 {
    40
}

fn default_readiness_interval_ms() -> u64 {
    500
}

fn default_train_stagger_ms() -> u64 {
    750
}

fn default_trained_recency_secs() -> u64 {
    900
}

fn default_log_window() -> usize {
    500
}

fn default_output_queue() -> usize {
    1024
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            shared_dir: None,
            interpreter: default_interpreter(),
            tick_ms: default_tick_ms(),
            readiness_max_attempts: default_readiness_max_attempts(),
            readiness_interval_ms: default_readiness_interval_ms(),
            train_stagger_ms: default_train_stagger_ms(),
            trained_recency_secs: default_trained_recency_secs(),
            log_window: default_log_window(),
            output_queue: default_output_queue(),
        }
    }
}

/// `[env]` section: what gets injected into every worker's environment.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvSection {
    /// Name of the variable carrying the shared data directory.
    #[serde(default = "default_shared_dir_var")]
    pub shared_dir_var: String,

    /// Boolean feature flags, exported as `"1"` / `"0"`.
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

fn default_shared_dir_var() -> String {
    "FLEET_SHARED_DIR".to_string()
}

impl Default for EnvSection {
    fn default() -> Self {
        Self {
            shared_dir_var: default_shared_dir_var(),
            flags: BTreeMap::new(),
        }
    }
}

/// `[roles]` section: worker script file name per role.
#[derive(Debug, Clone, Deserialize)]
pub struct RolesSection {
    #[serde(default = "default_trainer_script")]
    pub trainer: String,
    #[serde(default = "default_generator_script")]
    pub generator: String,
    #[serde(default = "default_trader_script")]
    pub trader: String,
}

fn default_trainer_script() -> String {
    "trainer.py".to_string()
}

fn default_generator_script() -> String {
    "signal_generator.py".to_string()
}

fn default_trader_script() -> String {
    "executor.py".to_string()
}

impl Default for RolesSection {
    fn default() -> Self {
        Self {
            trainer: default_trainer_script(),
            generator: default_generator_script(),
            trader: default_trader_script(),
        }
    }
}

impl RolesSection {
    pub fn script_for(&self, role: Role) -> &str {
        match role {
            Role::Trainer => &self.trainer,
            Role::Generator => &self.generator,
            Role::Trader => &self.trader,
        }
    }
}

/// `[instruments]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InstrumentsSection {
    /// Instrument running directly in `base_dir`. Defaults to the first listed.
    #[serde(default)]
    pub primary: Option<String>,

    #[serde(default)]
    pub list: Vec<String>,
}

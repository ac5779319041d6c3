#![allow(dead_code)]

use std::path::Path;

use fleetctl::config::{
    ConfigFile, ConfigSection, EnvSection, InstrumentsSection, RawConfigFile, RolesSection,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                env: EnvSection::default(),
                roles: RolesSection::default(),
                instruments: InstrumentsSection::default(),
            },
        }
    }

    pub fn with_instrument(mut self, id: &str) -> Self {
        self.config.instruments.list.push(id.to_string());
        self
    }

    pub fn with_primary(mut self, id: &str) -> Self {
        self.config.instruments.primary = Some(id.to_string());
        self
    }

    pub fn with_base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.config.base_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_interpreter(mut self, program: &str) -> Self {
        self.config.config.interpreter = program.to_string();
        self
    }

    /// Worker scripts for trainer, generator and trader.
    pub fn with_scripts(mut self, trainer: &str, generator: &str, trader: &str) -> Self {
        self.config.roles = RolesSection {
            trainer: trainer.to_string(),
            generator: generator.to_string(),
            trader: trader.to_string(),
        };
        self
    }

    pub fn with_flag(mut self, name: &str, on: bool) -> Self {
        self.config.env.flags.insert(name.to_string(), on);
        self
    }

    /// Fast timings for tests: 20 ms ticks and readiness polls, no stagger.
    pub fn fast(mut self) -> Self {
        self.config.config.tick_ms = 20;
        self.config.config.readiness_interval_ms = 20;
        self.config.config.train_stagger_ms = 1;
        self
    }

    pub fn with_readiness(mut self, max_attempts: u32, interval_ms: u64) -> Self {
        self.config.config.readiness_max_attempts = max_attempts;
        self.config.config.readiness_interval_ms = interval_ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

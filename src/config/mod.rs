// src/config/mod.rs

//! Configuration loading and validation for fleetctl.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: instrument list, timing and role sanity checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, EnvSection, InstrumentsSection, RawConfigFile, RolesSection,
};

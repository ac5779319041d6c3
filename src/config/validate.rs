// src/config/validate.rs

use std::collections::HashSet;

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FleetError, Result};
use crate::types::{normalize_id, Role};

/// Accepted shape of a normalised instrument id (it doubles as a directory name).
const INSTRUMENT_ID_PATTERN: &str = r"^[A-Z0-9][A-Z0-9._-]*$";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FleetError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.env,
            raw.roles,
            raw.instruments,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_instruments(cfg)?;
    validate_instrument_ids(cfg)?;
    validate_timing(cfg)?;
    validate_roles(cfg)?;
    Ok(())
}

fn ensure_has_instruments(cfg: &RawConfigFile) -> Result<()> {
    if cfg.instruments.list.is_empty() {
        return Err(FleetError::ConfigError(
            "[instruments].list must contain at least one instrument".to_string(),
        ));
    }
    Ok(())
}

fn validate_instrument_ids(cfg: &RawConfigFile) -> Result<()> {
    let pattern = Regex::new(INSTRUMENT_ID_PATTERN)
        .map_err(|e| FleetError::ConfigError(format!("invalid instrument id pattern: {e}")))?;

    let mut seen = HashSet::new();
    for raw in cfg.instruments.list.iter() {
        let id = normalize_id(raw);
        if !pattern.is_match(&id) {
            return Err(FleetError::ConfigError(format!(
                "instrument id '{raw}' is not valid (expected letters, digits, '.', '_' or '-')"
            )));
        }
        if !seen.insert(id.clone()) {
            return Err(FleetError::ConfigError(format!(
                "instrument '{id}' is listed more than once"
            )));
        }
    }

    if let Some(primary) = cfg.instruments.primary.as_deref() {
        let primary = normalize_id(primary);
        if !seen.contains(&primary) {
            return Err(FleetError::ConfigError(format!(
                "[instruments].primary '{primary}' is not in [instruments].list"
            )));
        }
    }

    Ok(())
}

fn validate_timing(cfg: &RawConfigFile) -> Result<()> {
    let c = &cfg.config;
    let checks = [
        ("tick_ms", c.tick_ms),
        ("readiness_interval_ms", c.readiness_interval_ms),
        ("readiness_max_attempts", u64::from(c.readiness_max_attempts)),
        ("log_window", c.log_window as u64),
        ("output_queue", c.output_queue as u64),
    ];

    for (name, value) in checks {
        if value == 0 {
            return Err(FleetError::ConfigError(format!(
                "[config].{name} must be >= 1 (got 0)"
            )));
        }
    }

    if c.interpreter.trim().is_empty() {
        return Err(FleetError::ConfigError(
            "[config].interpreter must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_roles(cfg: &RawConfigFile) -> Result<()> {
    for role in Role::ALL {
        if cfg.roles.script_for(role).trim().is_empty() {
            return Err(FleetError::ConfigError(format!(
                "[roles].{role} must name a worker script"
            )));
        }
    }

    if cfg.env.shared_dir_var.trim().is_empty() {
        return Err(FleetError::ConfigError(
            "[env].shared_dir_var must not be empty".to_string(),
        ));
    }

    Ok(())
}

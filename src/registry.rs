// src/registry.rs

//! Instrument list and working directory resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::model::{ConfigFile, RolesSection};
use crate::errors::{FleetError, Result};
use crate::fs::FileSystem;
use crate::types::{normalize_id, InstrumentId, Role};

/// One managed instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentEntry {
    pub id: InstrumentId,
    pub dir: PathBuf,
    pub primary: bool,
    /// False once removed from the configuration; kept until its workers exit.
    pub active: bool,
    seeded: bool,
}

/// Working directory and script paths of one instrument, ready to spawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstrument {
    pub id: InstrumentId,
    pub dir: PathBuf,
    pub scripts: BTreeMap<Role, PathBuf>,
}

impl ResolvedInstrument {
    pub fn script(&self, role: Role) -> Option<&Path> {
        self.scripts.get(&role).map(PathBuf::as_path)
    }
}

/// Authoritative instrument list.
///
/// The primary instrument runs directly in `base_dir`. Every other instrument
/// gets `<base_dir>/<ID>`, created on first use and seeded with copies of the
/// worker scripts found in `base_dir`.
#[derive(Debug)]
pub struct InstrumentRegistry {
    fs: Arc<dyn FileSystem>,
    base_dir: PathBuf,
    roles: RolesSection,
    entries: BTreeMap<InstrumentId, InstrumentEntry>,
    order: Vec<InstrumentId>,
}

impl InstrumentRegistry {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        base_dir: impl Into<PathBuf>,
        primary: Option<&str>,
        ids: &[String],
        roles: RolesSection,
    ) -> Self {
        let mut registry = Self {
            fs,
            base_dir: base_dir.into(),
            roles,
            entries: BTreeMap::new(),
            order: Vec::new(),
        };

        let primary = primary
            .map(normalize_id)
            .or_else(|| ids.first().map(|s| normalize_id(s)));

        for raw in ids {
            let id = normalize_id(raw);
            let is_primary = primary.as_deref() == Some(id.as_str());
            registry.insert(id, is_primary);
        }

        registry
    }

    pub fn from_config(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Self {
        let primary = cfg.primary_instrument();
        Self::new(
            fs,
            cfg.config.base_dir.clone(),
            primary.as_deref(),
            &cfg.instrument_ids(),
            cfg.roles.clone(),
        )
    }

    fn insert(&mut self, id: InstrumentId, primary: bool) {
        if self.entries.contains_key(&id) {
            return;
        }
        let dir = if primary {
            self.base_dir.clone()
        } else {
            self.base_dir.join(&id)
        };
        self.entries.insert(
            id.clone(),
            InstrumentEntry {
                id: id.clone(),
                dir,
                primary,
                active: true,
                seeded: primary,
            },
        );
        self.order.push(id);
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// All known instruments (active and retiring), in configuration order.
    pub fn ids(&self) -> Vec<InstrumentId> {
        self.order.clone()
    }

    /// Instruments currently managed.
    pub fn active_ids(&self) -> Vec<InstrumentId> {
        self.order
            .iter()
            .filter(|id| self.entries.get(*id).is_some_and(|e| e.active))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&InstrumentEntry> {
        self.entries.get(&normalize_id(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Working directory without creating or seeding it.
    pub fn dir_of(&self, id: &str) -> Option<&Path> {
        self.get(id).map(|e| e.dir.as_path())
    }

    /// Resolve an instrument's directory and worker scripts, creating and
    /// seeding the directory on first use.
    pub fn resolve(&mut self, id: &str) -> Result<ResolvedInstrument> {
        let id = normalize_id(id);
        let entry = self
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| FleetError::UnknownInstrument(id.clone()))?;

        if !entry.seeded {
            self.seed(&entry)?;
            if let Some(e) = self.entries.get_mut(&id) {
                e.seeded = true;
            }
        }

        let scripts = Role::ALL
            .into_iter()
            .map(|role| (role, entry.dir.join(self.roles.script_for(role))))
            .collect();

        Ok(ResolvedInstrument {
            id,
            dir: entry.dir,
            scripts,
        })
    }

    fn seed(&self, entry: &InstrumentEntry) -> Result<()> {
        if !self.fs.is_dir(&entry.dir) {
            info!(instrument = %entry.id, dir = ?entry.dir, "creating instrument directory");
            self.fs.create_dir_all(&entry.dir)?;
        }

        for role in Role::ALL {
            let script = self.roles.script_for(role);
            let target = entry.dir.join(script);
            if self.fs.exists(&target) {
                continue;
            }
            let source = self.base_dir.join(script);
            if self.fs.exists(&source) {
                debug!(instrument = %entry.id, script, "seeding worker script");
                self.fs.copy(&source, &target)?;
            } else {
                warn!(
                    instrument = %entry.id,
                    script,
                    "worker script missing from base directory; cannot seed"
                );
            }
        }

        Ok(())
    }

    /// Replace the active instrument set.
    ///
    /// New ids are added, ids present again are reactivated, and ids no
    /// longer listed are marked inactive and returned so their workers can be
    /// stopped. Inactive entries stay queryable until [`remove`](Self::remove).
    pub fn apply(&mut self, ids: &[String]) -> Vec<InstrumentId> {
        let wanted: Vec<InstrumentId> = ids.iter().map(|s| normalize_id(s)).collect();

        for id in wanted.iter() {
            match self.entries.get_mut(id) {
                Some(entry) => {
                    if !entry.active {
                        info!(instrument = %id, "instrument re-activated");
                        entry.active = true;
                    }
                }
                None => {
                    info!(instrument = %id, "instrument added");
                    self.insert(id.clone(), false);
                }
            }
        }

        let mut retired = Vec::new();
        for entry in self.entries.values_mut() {
            if entry.active && !wanted.contains(&entry.id) {
                info!(instrument = %entry.id, "instrument removed from configuration; retiring");
                entry.active = false;
                retired.push(entry.id.clone());
            }
        }
        retired
    }

    /// Forget an inactive instrument. Active instruments are never removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let id = normalize_id(id);
        match self.entries.get(&id) {
            Some(entry) if !entry.active => {
                self.entries.remove(&id);
                self.order.retain(|x| x != &id);
                debug!(instrument = %id, "retired instrument forgotten");
                true
            }
            _ => false,
        }
    }
}

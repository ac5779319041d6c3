use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical instrument identifier (trimmed, upper-cased).
pub type InstrumentId = String;

/// Normalise a user-supplied instrument identifier.
///
/// `" btcusdt "` and `"BTCUSDT"` refer to the same instrument.
pub fn normalize_id(raw: &str) -> InstrumentId {
    raw.trim().to_uppercase()
}

/// The three lifecycle roles every instrument runs.
///
/// Ordering of the variants matches the dependency order
/// (trainer before generator before trader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trainer,
    Generator,
    Trader,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Trainer, Role::Generator, Role::Trader];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Trainer => "trainer",
            Role::Generator => "generator",
            Role::Trader => "trader",
        }
    }

    /// Prefix used when multiplexing this role's output into log streams.
    pub fn prefix(self) -> &'static str {
        match self {
            Role::Trainer => "TRAINER",
            Role::Generator => "SIGNALS",
            Role::Trader => "TRADER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trainer" => Ok(Role::Trainer),
            "generator" | "signals" => Ok(Role::Generator),
            "trader" | "execution" => Ok(Role::Trader),
            other => Err(format!(
                "invalid role: {other} (expected \"trainer\", \"generator\" or \"trader\")"
            )),
        }
    }
}

/// Identity of one supervised process: at most one live process exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerKey {
    pub instrument: InstrumentId,
    pub role: Role,
}

impl WorkerKey {
    pub fn new(instrument: impl Into<InstrumentId>, role: Role) -> Self {
        Self {
            instrument: instrument.into(),
            role,
        }
    }

    /// Prefix placed in front of every captured output line, e.g. `TRAINER BTCUSDT`.
    pub fn log_prefix(&self) -> String {
        format!("{} {}", self.role.prefix(), self.instrument)
    }
}

impl fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.role)
    }
}

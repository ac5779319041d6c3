// src/state/mod.rs

//! Read side of the fleet: cached access to the status artifacts workers
//! leave on disk. Knows nothing about processes.

pub mod artifacts;
pub mod store;

pub use artifacts::{
    derive_training_state, ReadinessRecord, TrainerStatus, TrainingState,
};
pub use store::StateStore;

// src/dag/mod.rs

//! Dependency order between worker roles.
//!
//! - [`graph`] holds the role graph and derives launch / teardown order.

pub mod graph;

pub use graph::RoleGraph;

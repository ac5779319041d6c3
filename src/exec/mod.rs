// src/exec/mod.rs

//! Process execution layer.
//!
//! Workers are run with `tokio::process::Command`; each gets exactly one
//! reader task that copies its combined output into a bounded queue.
//!
//! - [`supervisor`] owns the handle table (start / stop / liveness).
//! - [`worker_runner`] spawns a single worker and pumps its output.
//! - [`output`] defines captured lines and the per-process log window.

pub mod output;
pub mod supervisor;
pub mod worker_runner;

pub use output::{LogBook, LogLine, EXITED_MARKER};
pub use supervisor::{ProcessSupervisor, StartOutcome};
pub use worker_runner::LaunchSpec;

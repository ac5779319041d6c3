#![allow(dead_code)]

use std::error::Error;
use std::path::{Path, PathBuf};

pub use fleetctl_test_utils::builders;
pub use fleetctl_test_utils::fake_fleet;
pub use fleetctl_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Write a small `sh` worker script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write worker script");
    path
}

// tests/registry_resolve.rs

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::init_tracing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleetctl::config::RolesSection;
use fleetctl::errors::FleetError;
use fleetctl::fs::mock::MockFileSystem;
use fleetctl::fs::FileSystem;
use fleetctl::registry::InstrumentRegistry;
use fleetctl::types::Role;

fn seeded_base() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("workers/trainer.py", "# trainer");
    fs.add_file("workers/signal_generator.py", "# generator");
    fs.add_file("workers/executor.py", "# trader");
    fs
}

fn registry(fs: &MockFileSystem, ids: &[&str]) -> InstrumentRegistry {
    let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
    InstrumentRegistry::new(
        Arc::new(fs.clone()),
        "workers",
        None,
        &ids,
        RolesSection::default(),
    )
}

#[test]
fn primary_runs_in_the_base_directory() {
    init_tracing();
    let fs = seeded_base();
    let mut reg = registry(&fs, &["BTCUSDT", "ETHUSDT"]);

    let resolved = reg.resolve("btcusdt").expect("resolve primary");
    assert_eq!(resolved.id, "BTCUSDT");
    assert_eq!(resolved.dir, PathBuf::from("workers"));
    assert_eq!(
        resolved.script(Role::Generator),
        Some(Path::new("workers/signal_generator.py"))
    );
    assert!(!fs.is_dir(Path::new("workers/BTCUSDT")));
}

#[test]
fn secondary_directory_is_created_and_seeded_on_first_use() {
    init_tracing();
    let fs = seeded_base();
    let mut reg = registry(&fs, &["BTCUSDT", "ETHUSDT"]);
    assert!(!fs.exists(Path::new("workers/ETHUSDT")));

    let resolved = reg.resolve(" ethusdt ").expect("resolve secondary");

    assert_eq!(resolved.dir, PathBuf::from("workers/ETHUSDT"));
    assert!(fs.is_dir(Path::new("workers/ETHUSDT")));
    assert_eq!(
        fs.contents("workers/ETHUSDT/trainer.py").as_deref(),
        Some(b"# trainer".as_slice())
    );
    assert_eq!(
        resolved.script(Role::Trader),
        Some(Path::new("workers/ETHUSDT/executor.py"))
    );
}

#[test]
fn existing_instrument_scripts_are_not_overwritten() {
    init_tracing();
    let fs = seeded_base();
    fs.add_file("workers/ETHUSDT/trainer.py", "# tuned for eth");
    let mut reg = registry(&fs, &["BTCUSDT", "ETHUSDT"]);

    reg.resolve("ETHUSDT").expect("resolve");

    assert_eq!(
        fs.contents("workers/ETHUSDT/trainer.py").as_deref(),
        Some(b"# tuned for eth".as_slice())
    );
    assert_eq!(
        fs.contents("workers/ETHUSDT/executor.py").as_deref(),
        Some(b"# trader".as_slice())
    );
}

#[test]
fn unknown_instrument_fails_to_resolve() {
    init_tracing();
    let fs = seeded_base();
    let mut reg = registry(&fs, &["BTCUSDT"]);

    let err = reg.resolve("DOGEUSDT").expect_err("unknown");
    assert!(matches!(err, FleetError::UnknownInstrument(ref id) if id == "DOGEUSDT"));
}

#[test]
fn explicit_primary_from_config() {
    init_tracing();
    let fs = seeded_base();
    let cfg = ConfigFileBuilder::new()
        .with_base_dir("workers")
        .with_instrument("btcusdt")
        .with_instrument("ethusdt")
        .with_primary("ETHUSDT")
        .build();
    let mut reg = InstrumentRegistry::from_config(&cfg, Arc::new(fs.clone()));

    assert_eq!(reg.ids(), vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
    assert!(reg.get("ethusdt").is_some_and(|e| e.primary));
    assert_eq!(reg.dir_of("BTCUSDT"), Some(Path::new("workers/BTCUSDT")));
    assert_eq!(
        reg.resolve("ETHUSDT").expect("resolve").dir,
        PathBuf::from("workers")
    );
}

#[test]
fn apply_retires_removed_instruments_and_keeps_them_queryable() {
    init_tracing();
    let fs = seeded_base();
    let mut reg = registry(&fs, &["BTCUSDT", "ETHUSDT"]);

    let retired = reg.apply(&["BTCUSDT".to_string(), "solusdt".to_string()]);

    assert_eq!(retired, vec!["ETHUSDT".to_string()]);
    assert_eq!(reg.active_ids(), vec!["BTCUSDT".to_string(), "SOLUSDT".to_string()]);
    assert!(reg.get("ETHUSDT").is_some_and(|e| !e.active));
    assert!(reg.contains("ETHUSDT"));

    assert!(reg.remove("ETHUSDT"));
    assert!(!reg.contains("ETHUSDT"));
}

#[test]
fn active_instruments_are_never_removed() {
    init_tracing();
    let fs = seeded_base();
    let mut reg = registry(&fs, &["BTCUSDT"]);

    assert!(!reg.remove("BTCUSDT"));
    assert!(!reg.remove("NOPE"));
    assert_eq!(reg.active_ids(), vec!["BTCUSDT".to_string()]);
}

#[test]
fn reactivated_instrument_keeps_its_place() {
    init_tracing();
    let fs = seeded_base();
    let mut reg = registry(&fs, &["BTCUSDT", "ETHUSDT"]);

    reg.apply(&["BTCUSDT".to_string()]);
    let retired = reg.apply(&["BTCUSDT".to_string(), "ETHUSDT".to_string()]);

    assert!(retired.is_empty());
    assert_eq!(reg.active_ids(), vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
}

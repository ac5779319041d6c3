// tests/state_store_cache.rs

mod common;
use crate::common::init_tracing;

use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fleetctl::fs::mock::MockFileSystem;
use fleetctl::state::artifacts::{decode_readiness, read_readiness, readiness_path};
use fleetctl::state::{ReadinessRecord, StateStore};

fn store_on(fs: &MockFileSystem) -> StateStore {
    StateStore::new(Arc::new(fs.clone()))
}

fn decode_counting<'a>(counter: &'a Cell<u32>) -> impl FnOnce(&str) -> anyhow::Result<String> + 'a {
    move |text: &str| {
        counter.set(counter.get() + 1);
        Ok(text.to_string())
    }
}

#[test]
fn missing_file_returns_default_and_caches_nothing() {
    init_tracing();
    let fs = MockFileSystem::new();
    let mut store = store_on(&fs);

    let value = store.get(Path::new("absent.json"), |t| Ok(t.to_string()), "none".to_string());

    assert_eq!(value, "none");
    assert_eq!(store.cached_len(), 0);
}

#[test]
fn same_mtime_decodes_only_once() {
    init_tracing();
    let fs = MockFileSystem::new();
    let path = Path::new("status.json");
    let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
    fs.add_file_with_mtime(path, "first", stamp);

    let mut store = store_on(&fs);
    let decodes = Cell::new(0);

    let a = store.get(path, decode_counting(&decodes), String::new());
    // Second write lands within the timestamp granularity.
    fs.add_file_with_mtime(path, "second", stamp);
    let b = store.get(path, decode_counting(&decodes), String::new());

    assert_eq!(decodes.get(), 1);
    assert_eq!(a, "first");
    assert_eq!(b, "first");
}

#[test]
fn new_mtime_decodes_again_and_returns_latest() {
    init_tracing();
    let fs = MockFileSystem::new();
    let path = Path::new("status.json");
    fs.add_file(path, "first");

    let mut store = store_on(&fs);
    let decodes = Cell::new(0);

    assert_eq!(store.get(path, decode_counting(&decodes), String::new()), "first");
    fs.add_file(path, "second");
    assert_eq!(store.get(path, decode_counting(&decodes), String::new()), "second");
    assert_eq!(decodes.get(), 2);
}

#[test]
fn failed_decode_is_not_cached() {
    init_tracing();
    let fs = MockFileSystem::new();
    let shared = Path::new("shared");
    let path = readiness_path(shared);
    let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(7);

    // Writer caught mid-write.
    fs.add_file_with_mtime(&path, r#"{"timestamp": 1.0, "rea"#, stamp);
    let mut store = store_on(&fs);
    assert_eq!(read_readiness(&mut store, shared), None);
    assert_eq!(store.cached_len(), 0);

    // Completed within the same mtime tick: must still be picked up.
    fs.add_file_with_mtime(
        &path,
        r#"{"timestamp": 1.0, "ready": true, "stage": "live"}"#,
        stamp,
    );
    let record = read_readiness(&mut store, shared).expect("decoded readiness");
    assert!(record.ready);
    assert_eq!(record.stage, "live");
    assert_eq!(store.cached_len(), 1);
}

#[test]
fn write_json_replaces_cached_value() {
    init_tracing();
    let fs = MockFileSystem::new();
    let shared = Path::new("shared");
    let path = readiness_path(shared);
    fs.add_file(&path, r#"{"timestamp": 1.0, "ready": true, "stage": "live"}"#);

    let mut store = store_on(&fs);
    assert!(read_readiness(&mut store, shared).is_some_and(|r| r.ready));

    store
        .write_json(&path, &ReadinessRecord::not_ready("reset"))
        .expect("write readiness");

    let record = store.get(&path, decode_readiness, None).expect("readiness after reset");
    assert!(!record.ready);
    assert_eq!(record.stage, "reset");
}

#[test]
fn values_of_different_types_live_side_by_side() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("a.txt", "12");
    fs.add_file("b.txt", "hello");

    let mut store = store_on(&fs);
    let n: u32 = store.get(Path::new("a.txt"), |t| Ok(t.trim().parse()?), 0);
    let s: String = store.get(Path::new("b.txt"), |t| Ok(t.to_string()), String::new());

    assert_eq!(n, 12);
    assert_eq!(s, "hello");
    assert_eq!(store.cached_len(), 2);
}

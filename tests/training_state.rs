// tests/training_state.rs

mod common;
use crate::common::init_tracing;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fleetctl::fs::mock::MockFileSystem;
use fleetctl::state::artifacts::{
    decode_last_event, decode_trainer_status, read_last_event, trained_marker_age,
    trained_marker_path,
};
use fleetctl::state::{derive_training_state, StateStore, TrainerStatus, TrainingState};

const RECENCY: Duration = Duration::from_secs(900);

fn status(state: TrainingState) -> TrainerStatus {
    TrainerStatus {
        state,
        progress_pct: 0,
        pid: None,
        start_time: None,
        stop_time: None,
    }
}

#[test]
fn finished_is_read_as_trained() {
    init_tracing();
    let decoded = decode_trainer_status(r#"{"state": "FINISHED", "progress_pct": 100, "pid": null}"#)
        .expect("decode")
        .expect("status present");
    assert_eq!(decoded.state, TrainingState::Trained);
    assert_eq!(decoded.progress_pct, 100);
}

#[test]
fn terminal_marker_wins_over_everything() {
    let s = status(TrainingState::Trained);
    assert_eq!(
        derive_training_state(Some(&s), None, RECENCY, true),
        TrainingState::Trained
    );
}

#[test]
fn training_with_recent_completion_counts_as_trained() {
    let s = status(TrainingState::Training);
    let fresh = Some(Duration::from_secs(60));
    let stale = Some(Duration::from_secs(3600));

    assert_eq!(
        derive_training_state(Some(&s), fresh, RECENCY, true),
        TrainingState::Trained
    );
    assert_eq!(
        derive_training_state(Some(&s), stale, RECENCY, false),
        TrainingState::Training
    );
}

#[test]
fn live_local_trainer_means_training() {
    let stopped = status(TrainingState::Stopped);
    assert_eq!(
        derive_training_state(Some(&stopped), None, RECENCY, true),
        TrainingState::Training
    );
    assert_eq!(
        derive_training_state(None, None, RECENCY, true),
        TrainingState::Training
    );
}

#[test]
fn without_local_knowledge_the_file_is_taken_as_is() {
    let stopped = status(TrainingState::Stopped);
    assert_eq!(
        derive_training_state(Some(&stopped), None, RECENCY, false),
        TrainingState::Stopped
    );
    assert_eq!(
        derive_training_state(None, None, RECENCY, false),
        TrainingState::NotTrained
    );
}

#[test]
fn stopped_status_keeps_progress_and_stamps_stop_time() {
    let mut previous = status(TrainingState::Training);
    previous.progress_pct = 42;
    previous.start_time = Some("2026-01-01T00:00:00Z".to_string());

    let stopped = TrainerStatus::stopped(Some(&previous));
    assert_eq!(stopped.state, TrainingState::Stopped);
    assert_eq!(stopped.progress_pct, 42);
    assert_eq!(stopped.start_time.as_deref(), Some("2026-01-01T00:00:00Z"));
    assert!(stopped.stop_time.is_some());

    let json = serde_json::to_string(&stopped).expect("serialize");
    assert!(json.contains(r#""state":"STOPPED""#));
}

#[test]
fn marker_age_is_measured_from_the_recorded_timestamp() {
    init_tracing();
    let fs = MockFileSystem::new();
    let dir = Path::new("BTCUSDT");
    fs.add_file(trained_marker_path(dir), "1000.5\n");
    let mut store = StateStore::new(Arc::new(fs.clone()));

    let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1100);
    let age = trained_marker_age(&mut store, dir, now).expect("marker age");
    assert_eq!(age, Duration::from_millis(99_500));

    let before = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
    assert_eq!(trained_marker_age(&mut store, dir, before), Some(Duration::ZERO));
}

#[test]
fn garbage_marker_means_no_marker() {
    let fs = MockFileSystem::new();
    let dir = Path::new("ETHUSDT");
    fs.add_file(trained_marker_path(dir), "yesterday");
    let mut store = StateStore::new(Arc::new(fs));

    assert_eq!(trained_marker_age(&mut store, dir, SystemTime::now()), None);
}

#[test]
fn last_event_is_the_final_complete_line() {
    let log = "{\"event\":\"start\"}\n{\"event\":\"signal\",\"side\":\"buy\"}\n\n";
    let last = decode_last_event(log).expect("decode").expect("event present");
    assert_eq!(last["event"], "signal");
    assert_eq!(last["side"], "buy");

    assert!(decode_last_event("").expect("decode empty").is_none());
    assert!(decode_last_event("{\"event\":\"start\"}\n{\"eve").is_err());
}

#[test]
fn torn_event_log_reads_as_no_event() {
    let fs = MockFileSystem::new();
    let dir = Path::new("SOLUSDT");
    fs.add_file(dir.join("events.jsonl"), "{\"event\":\"start\"}\n{\"eve");
    let mut store = StateStore::new(Arc::new(fs));

    assert_eq!(read_last_event(&mut store, dir), None);
}

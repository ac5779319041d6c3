// tests/live_fleet.rs
#![cfg(unix)]

mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{init_tracing, with_timeout, write_script, TestResult};

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fleetctl::config::ConfigFile;
use fleetctl::engine::{FleetControl, InstrumentPhase, LiveFleet, ReadinessSource, Sequencer};
use fleetctl::exec::{LogBook, LogLine};
use fleetctl::fs::RealFileSystem;
use fleetctl::sequencer_options;
use fleetctl::state::TrainingState;
use fleetctl::types::Role;

const TRAINER: &str = r#"echo "{\"state\": \"TRAINED\", \"progress_pct\": 100, \"pid\": null}" > trainer_status.json
echo "trained $1""#;

// The pause keeps the readiness write clear of the reset's mtime.
const GENERATOR: &str = r#"sleep 0.3
echo "{\"timestamp\": 1.0, \"ready\": true, \"stage\": \"live\"}" > "$FLEET_SHARED_DIR/runner_ready.json"
echo "ready $1"
exec sleep 30"#;

const TRADER: &str = r#"echo "trading $1 paper=$PAPER_TRADING"
exec sleep 30"#;

fn fleet_config(base: &Path) -> ConfigFile {
    write_script(base, "trainer.sh", TRAINER);
    write_script(base, "signal_generator.sh", GENERATOR);
    write_script(base, "executor.sh", TRADER);

    ConfigFileBuilder::new()
        .with_base_dir(base)
        .with_interpreter("sh")
        .with_scripts("trainer.sh", "signal_generator.sh", "executor.sh")
        .with_instrument("AAA")
        .with_instrument("BBB")
        .with_flag("PAPER_TRADING", true)
        .fast()
        .with_readiness(100, 20)
        .build()
}

/// Tick the sequencer until `done` holds, collecting worker output.
async fn drive<F>(
    seq: &mut Sequencer,
    fleet: &mut LiveFleet,
    output: &mut Vec<LogLine>,
    mut done: F,
) where
    F: FnMut(&mut Sequencer, &mut LiveFleet) -> bool,
{
    loop {
        output.extend(fleet.drain_output());
        seq.tick(fleet, Instant::now());
        if done(seq, fleet) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn start_all_trains_generates_then_trades() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = fleet_config(dir.path());
    let mut fleet = LiveFleet::from_config(&cfg, Arc::new(RealFileSystem));
    let mut seq = Sequencer::new(sequencer_options(&cfg));
    let mut output = Vec::new();

    seq.start_all(&mut fleet, Instant::now());

    with_timeout(drive(&mut seq, &mut fleet, &mut output, |_, f| {
        f.is_running("AAA", Role::Trader) && f.is_running("BBB", Role::Trader)
    }))
    .await;

    // Secondary instrument got its own seeded directory.
    let bbb = dir.path().join("BBB");
    assert!(bbb.join("executor.sh").is_file());
    assert!(bbb.join("trainer_status.json").is_file());
    assert!(dir.path().join("trainer_status.json").is_file());

    assert_eq!(fleet.training_state("AAA"), TrainingState::Trained);
    assert_eq!(seq.phase_of(&mut fleet, "BBB"), InstrumentPhase::Trading);

    // Give the traders a moment to print.
    tokio::time::sleep(Duration::from_millis(200)).await;
    output.extend(fleet.drain_output());
    let texts: Vec<&str> = output.iter().map(|l| l.text.as_str()).collect();
    assert!(texts.contains(&"[TRAINER AAA] trained AAA"), "{texts:?}");
    assert!(texts.contains(&"[TRAINER BBB] trained BBB"), "{texts:?}");
    assert!(texts.contains(&"[TRADER BBB] trading BBB paper=1"), "{texts:?}");

    let mut logbook = LogBook::new(10);
    for line in output.iter() {
        logbook.push(line);
    }
    let snapshot = fleet.snapshot(&seq, &logbook);
    assert!(snapshot.all_trained);
    assert!(!snapshot.start_pending);
    assert!(snapshot.readiness.as_ref().is_some_and(|r| r.ready));
    let aaa = snapshot.instrument("AAA").expect("AAA in snapshot");
    assert_eq!(aaa.phase, InstrumentPhase::Trading);
    let trader = aaa.role(Role::Trader).expect("trader role");
    assert!(trader.running);
    assert!(trader.pid.is_some());

    seq.stop_all(&mut fleet);
    assert!(!fleet.read_ready("AAA"));
    Ok(())
}

#[tokio::test]
async fn stopping_a_running_trainer_records_stopped() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = fleet_config(dir.path());
    // A trainer that never finishes.
    write_script(
        dir.path(),
        "trainer.sh",
        r#"echo "{\"state\": \"TRAINING\", \"progress_pct\": 30, \"pid\": $$}" > trainer_status.json
exec sleep 30"#,
    );
    let mut fleet = LiveFleet::from_config(&cfg, Arc::new(RealFileSystem));
    let mut seq = Sequencer::new(sequencer_options(&cfg));

    seq.train_instrument(&mut fleet, "aaa")?;
    assert!(fleet.is_running("AAA", Role::Trainer));
    assert_eq!(fleet.training_state("AAA"), TrainingState::Training);

    // Wait for the trainer to report progress before stopping it.
    let status_path = dir.path().join("trainer_status.json");
    with_timeout(async {
        while !status_path.is_file() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    seq.stop_instrument(&mut fleet, "AAA")?;

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&status_path)?)?;
    assert_eq!(written["state"], "STOPPED");
    assert_eq!(written["progress_pct"], 30);
    assert!(written["stop_time"].is_string());
    Ok(())
}

#[tokio::test]
async fn generator_that_dies_never_gets_a_trader() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = fleet_config(dir.path());
    write_script(dir.path(), "signal_generator.sh", "echo crashing; exit 3");
    let mut fleet = LiveFleet::from_config(&cfg, Arc::new(RealFileSystem));
    let mut seq = Sequencer::new(sequencer_options(&cfg));
    let mut output = Vec::new();

    seq.start_instrument(&mut fleet, "AAA")?;
    with_timeout(drive(&mut seq, &mut fleet, &mut output, |s, _| {
        s.waiting_on_readiness().is_empty()
    }))
    .await;

    assert!(!fleet.is_running("AAA", Role::Trader));
    assert!(!fleet.is_running("AAA", Role::Generator));
    Ok(())
}

#[tokio::test]
async fn retired_instrument_is_pruned_once_its_workers_exit() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let cfg = fleet_config(dir.path());
    let mut fleet = LiveFleet::from_config(&cfg, Arc::new(RealFileSystem));
    let mut seq = Sequencer::new(sequencer_options(&cfg));

    fleet.spawn("BBB", Role::Trader)?;
    let retired = fleet.set_instruments(&["aaa".to_string()]);
    assert_eq!(retired, vec!["BBB".to_string()]);
    assert_eq!(fleet.instruments(), vec!["AAA".to_string()]);

    seq.retire(&mut fleet, "BBB");
    // Still listed while the trader winds down.
    assert!(fleet.registry().contains("BBB"));

    with_timeout(async {
        while fleet.prune_retired().is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(!fleet.registry().contains("BBB"));
    Ok(())
}

// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod state;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, ConfigFile};
use crate::dag::RoleGraph;
use crate::engine::{
    ControlCommand, FleetSnapshot, LiveFleet, Runtime, RuntimeOptions, Sequencer,
    SequencerOptions,
};
use crate::exec::LogBook;
use crate::fs::RealFileSystem;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - instrument registry / supervisor / state store
/// - sequencer and control loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let mut fleet = LiveFleet::from_config(&cfg, Arc::new(RealFileSystem));
    let sequencer = Sequencer::new(sequencer_options(&cfg));

    let initial = match args.command {
        Command::Status => {
            let snapshot = fleet.snapshot(&sequencer, &LogBook::new(1));
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            return Ok(());
        }
        Command::StartAll => ControlCommand::StartAll,
        Command::TrainAll => ControlCommand::TrainAll,
        Command::Start { instrument } => ControlCommand::StartInstrument(instrument),
        Command::Train { instrument } => ControlCommand::TrainInstrument(instrument),
    };

    let (command_tx, command_rx) = mpsc::channel::<ControlCommand>(32);
    let (snapshot_tx, _snapshot_rx) = watch::channel(FleetSnapshot::default());

    // Ctrl-C → graceful shutdown.
    {
        let tx = command_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(ControlCommand::Shutdown).await;
        });
    }

    info!(command = ?initial, "initial fleet command");
    command_tx.send(initial).await?;

    let options = RuntimeOptions {
        tick: cfg.tick(),
        log_window: cfg.config.log_window,
        echo_output: true,
    };

    let runtime = Runtime::new(fleet, sequencer, command_rx, snapshot_tx, options);
    runtime.run().await?;
    Ok(())
}

pub fn sequencer_options(cfg: &ConfigFile) -> SequencerOptions {
    SequencerOptions {
        readiness_max_attempts: cfg.config.readiness_max_attempts,
        readiness_interval: cfg.readiness_interval(),
        train_stagger: cfg.train_stagger(),
    }
}

/// Simple dry-run output: instruments, directories and launch order.
fn print_dry_run(cfg: &ConfigFile) {
    println!("fleetctl dry-run");
    println!("  config.base_dir = {}", cfg.config.base_dir.display());
    println!("  config.shared_dir = {}", cfg.shared_dir().display());
    println!("  config.interpreter = {}", cfg.config.interpreter);
    println!("  config.tick_ms = {}", cfg.config.tick_ms);
    println!(
        "  readiness = {} attempts every {} ms",
        cfg.config.readiness_max_attempts, cfg.config.readiness_interval_ms
    );
    println!("  config.train_stagger_ms = {}", cfg.config.train_stagger_ms);
    println!();

    let order = RoleGraph::new();
    let launch: Vec<String> = order
        .launch_order()
        .iter()
        .map(|role| format!("{} ({})", role, cfg.roles.script_for(*role)))
        .collect();
    println!("launch order: {}", launch.join(" -> "));
    println!();

    let primary = cfg.primary_instrument();
    let ids = cfg.instrument_ids();
    println!("instruments ({}):", ids.len());
    for id in ids.iter() {
        let dir = if primary.as_deref() == Some(id.as_str()) {
            cfg.config.base_dir.clone()
        } else {
            cfg.config.base_dir.join(id)
        };
        println!("  - {id}");
        println!("      dir: {}", dir.display());
    }

    if !cfg.env.flags.is_empty() {
        println!();
        println!("env flags:");
        for (flag, on) in cfg.env.flags.iter() {
            println!("  {flag} = {}", if *on { "1" } else { "0" });
        }
    }

    debug!("dry-run complete (no execution)");
}

// src/engine/runtime.rs

use std::fmt;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::LogBook;

use super::fleet::LiveFleet;
use super::sequencer::Sequencer;
use super::snapshot::FleetSnapshot;
use super::{ControlCommand, RuntimeOptions};

/// The control loop: the only place that mutates fleet state.
///
/// Commands arrive on `command_rx`; between commands the loop ticks at
/// `options.tick`, draining worker output and advancing the sequencer. After
/// every command and tick a fresh [`FleetSnapshot`] is published on the
/// watch channel.
pub struct Runtime {
    fleet: LiveFleet,
    sequencer: Sequencer,
    command_rx: mpsc::Receiver<ControlCommand>,
    snapshot_tx: watch::Sender<FleetSnapshot>,
    logbook: LogBook,
    options: RuntimeOptions,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("sequencer", &self.sequencer)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        fleet: LiveFleet,
        sequencer: Sequencer,
        command_rx: mpsc::Receiver<ControlCommand>,
        snapshot_tx: watch::Sender<FleetSnapshot>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            fleet,
            sequencer,
            command_rx,
            snapshot_tx,
            logbook: LogBook::new(options.log_window),
            options,
        }
    }

    /// Main loop. Returns once `Shutdown` arrives or every sender is gone,
    /// after stopping all workers.
    pub async fn run(mut self) -> Result<()> {
        info!(tick = ?self.options.tick, "fleet control loop started");

        let mut ticker = tokio::time::interval(self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(ControlCommand::Shutdown) => {
                        info!("shutdown requested");
                        break;
                    }
                    Some(command) => {
                        self.handle_command(command);
                        self.publish();
                    }
                    None => {
                        info!("command channel closed; shutting down");
                        break;
                    }
                },
                _ = ticker.tick() => self.tick(),
            }
        }

        self.sequencer.stop_all(&mut self.fleet);
        self.collect_output();
        self.publish();

        info!("fleet control loop exiting");
        Ok(())
    }

    fn handle_command(&mut self, command: ControlCommand) {
        debug!(?command, "control command received");
        let now = Instant::now();

        let result = match command {
            ControlCommand::StartAll => {
                self.sequencer.start_all(&mut self.fleet, now);
                Ok(())
            }
            ControlCommand::StopAll => {
                self.sequencer.stop_all(&mut self.fleet);
                Ok(())
            }
            ControlCommand::TrainAll => {
                self.sequencer.train_all(&mut self.fleet, now);
                Ok(())
            }
            ControlCommand::TrainInstrument(id) => {
                self.sequencer.train_instrument(&mut self.fleet, &id)
            }
            ControlCommand::StartInstrument(id) => {
                self.sequencer.start_instrument(&mut self.fleet, &id)
            }
            ControlCommand::StopInstrument(id) => {
                self.sequencer.stop_instrument(&mut self.fleet, &id)
            }
            ControlCommand::SetInstruments(ids) => {
                for id in self.fleet.set_instruments(&ids) {
                    self.sequencer.retire(&mut self.fleet, &id);
                }
                Ok(())
            }
            ControlCommand::Shutdown => Ok(()),
        };

        if let Err(err) = result {
            warn!(error = %err, "control command failed");
        }
    }

    fn tick(&mut self) {
        self.collect_output();
        self.sequencer.tick(&mut self.fleet, Instant::now());

        for id in self.fleet.prune_retired() {
            info!(instrument = %id, "retired instrument fully stopped");
        }

        self.publish();
    }

    fn collect_output(&mut self) {
        for line in self.fleet.drain_output() {
            if self.options.echo_output {
                println!("{}", line.text);
            }
            self.logbook.push(&line);
        }
    }

    fn publish(&mut self) {
        let snapshot = self.fleet.snapshot(&self.sequencer, &self.logbook);
        self.snapshot_tx.send_replace(snapshot);
    }
}

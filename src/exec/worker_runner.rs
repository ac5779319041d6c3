// src/exec/worker_runner.rs

//! Spawning one worker process and pumping its output.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{FleetError, Result};
use crate::exec::output::LogLine;
use crate::types::WorkerKey;

/// Everything needed to launch one worker:
/// `<program> <script> <args...>` in `cwd` with `env` added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub script: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
}

/// Spawn the worker and attach its output reader.
///
/// The script must exist beforehand; so must the program when it is given as
/// a path rather than a bare name resolved through `PATH`.
pub(crate) fn spawn_worker(
    key: &WorkerKey,
    spec: &LaunchSpec,
    output_tx: mpsc::Sender<LogLine>,
) -> Result<Child> {
    ensure_exists(key, &spec.script)?;
    if spec.program.components().count() > 1 {
        ensure_exists(key, &spec.program)?;
    }

    info!(
        worker = %key,
        program = ?spec.program,
        script = ?spec.script,
        cwd = ?spec.cwd,
        "starting worker process"
    );

    let mut cmd = Command::new(&spec.program);
    cmd.arg(&spec.script)
        .args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| FleetError::SpawnFailed {
        key: key.clone(),
        source,
    })?;

    spawn_output_reader(key.clone(), child.stdout.take(), child.stderr.take(), output_tx);

    Ok(child)
}

fn ensure_exists(key: &WorkerKey, path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(FleetError::MissingExecutable {
            key: key.clone(),
            path: path.to_path_buf(),
        })
    }
}

/// One reader task per worker: copies stdout and stderr line by line into the
/// output queue, then emits the synthetic exit line once both pipes are closed.
fn spawn_output_reader(
    key: WorkerKey,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    output_tx: mpsc::Sender<LogLine>,
) {
    tokio::spawn(async move {
        let prefix = key.log_prefix();
        let mut out_lines = stdout.map(|s| BufReader::new(s).lines());
        let mut err_lines = stderr.map(|s| BufReader::new(s).lines());

        while out_lines.is_some() || err_lines.is_some() {
            let line = tokio::select! {
                res = next_line(&mut out_lines), if out_lines.is_some() => {
                    if res.is_none() {
                        out_lines = None;
                    }
                    res
                }
                res = next_line(&mut err_lines), if err_lines.is_some() => {
                    if res.is_none() {
                        err_lines = None;
                    }
                    res
                }
            };

            if let Some(raw) = line {
                if output_tx.send(LogLine::output(&key, &prefix, &raw)).await.is_err() {
                    debug!(worker = %key, "output queue closed; stopping reader");
                    return;
                }
            }
        }

        if output_tx.send(LogLine::exited(&key, &prefix)).await.is_err() {
            debug!(worker = %key, "output queue closed before exit line");
        }
        debug!(worker = %key, "output reader finished");
    });
}

async fn next_line<R>(lines: &mut Option<tokio::io::Lines<BufReader<R>>>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let lines = lines.as_mut()?;
    match lines.next_line().await {
        Ok(Some(line)) => Some(line),
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "error reading worker output; closing stream");
            None
        }
    }
}

/// Ask a worker to terminate without waiting for it to exit.
pub(crate) fn request_termination(key: &WorkerKey, child: &mut Child) {
    match child.start_kill() {
        Ok(()) => debug!(worker = %key, pid = ?child.id(), "kill requested"),
        Err(e) => warn!(worker = %key, error = %e, "failed to kill worker process"),
    }
}

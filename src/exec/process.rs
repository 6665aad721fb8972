// src/exec/process.rs

//! The managed child process: spawn, reap, graceful stop.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::errors::{HotloopError, Result};

/// How the child came to an end, as observed by its reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReport {
    /// Exited on its own.
    Exited(ExitStatus),
    /// Exited after a stop request.
    Stopped(ExitStatus),
    /// The reaper could not observe or force an exit.
    Lost,
}

/// What to launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub workdir: PathBuf,
}

/// A running child owned by the supervisor.
///
/// The `Child` itself lives inside the reaper task, which is the only place
/// that waits on it. The supervisor talks to the reaper through two one-shot
/// channels: a stop request carrying the grace period, and the exit report.
pub struct ManagedProcess {
    pid: Option<u32>,
    cycle: u64,
    stop_tx: Option<oneshot::Sender<Duration>>,
    exited_rx: Option<oneshot::Receiver<ExitReport>>,
    reaper: JoinHandle<()>,
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("pid", &self.pid)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl ManagedProcess {
    /// Spawn `spec` with inherited stdout/stderr and start its reaper.
    ///
    /// `on_exit` runs inside the reaper when the process exits **on its own**.
    /// It does not run for stops requested through [`stop`](Self::stop); the
    /// caller of `stop` already knows.
    pub fn spawn<F, Fut>(spec: &LaunchSpec, cycle: u64, on_exit: F) -> Result<Self>
    where
        F: FnOnce(ExitReport) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let program = std::path::absolute(&spec.program).unwrap_or_else(|_| spec.program.clone());

        let mut cmd = Command::new(&program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .current_dir(&spec.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| HotloopError::ProcessStart {
            path: program.clone(),
            source,
        })?;
        let pid = child.id();

        info!(cycle, ?pid, program = ?program, "process started");

        let (stop_tx, stop_rx) = oneshot::channel::<Duration>();
        let (exited_tx, exited_rx) = oneshot::channel::<ExitReport>();

        let reaper = tokio::spawn(reap(child, cycle, stop_rx, exited_tx, on_exit));

        Ok(Self {
            pid,
            cycle,
            stop_tx: Some(stop_tx),
            exited_rx: Some(exited_rx),
            reaper,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Build cycle that started this process.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Ask the process to stop and wait until it is gone.
    ///
    /// Sends an interrupt where the platform has one, waits up to `grace`,
    /// then kills. If the process already exited on its own the recorded
    /// status is returned.
    pub async fn stop(&mut self, grace: Duration) -> Result<ExitStatus> {
        let exited_rx = self
            .exited_rx
            .take()
            .ok_or_else(|| HotloopError::Stop("stop already requested".to_string()))?;

        if let Some(stop_tx) = self.stop_tx.take() {
            if stop_tx.send(grace).is_err() {
                debug!(pid = ?self.pid, "reaper already finished before stop request");
            }
        }

        match exited_rx.await {
            Ok(ExitReport::Exited(status)) | Ok(ExitReport::Stopped(status)) => Ok(status),
            Ok(ExitReport::Lost) => Err(HotloopError::Stop(format!(
                "process {:?} could not be terminated",
                self.pid
            ))),
            Err(_) => Err(HotloopError::Stop(format!(
                "reaper for process {:?} ended without reporting an exit",
                self.pid
            ))),
        }
    }

    /// Give up ownership and return the reaper so it can be joined later.
    ///
    /// This does not stop the child. Without a prior [`stop`](Self::stop) the
    /// reaper keeps waiting for a natural exit and runs `on_exit` then; the
    /// child is killed only if the reaper task itself is dropped.
    pub fn into_reaper(self) -> JoinHandle<()> {
        self.reaper
    }
}

async fn reap<F, Fut>(
    mut child: Child,
    cycle: u64,
    mut stop_rx: oneshot::Receiver<Duration>,
    exited_tx: oneshot::Sender<ExitReport>,
    on_exit: F,
) where
    F: FnOnce(ExitReport) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let pid = child.id();

    tokio::select! {
        status = child.wait() => {
            let report = match status {
                Ok(status) => {
                    info!(cycle, ?pid, %status, "process exited");
                    ExitReport::Exited(status)
                }
                Err(err) => {
                    warn!(cycle, ?pid, error = %err, "failed waiting for process");
                    ExitReport::Lost
                }
            };
            // Nobody may be listening; that is fine.
            let _ = exited_tx.send(report);
            on_exit(report).await;
        }

        // A closed stop channel disables this branch; the child is then left
        // to exit on its own.
        Ok(grace) = &mut stop_rx => {
            let report = terminate(&mut child, pid, grace).await;
            let _ = exited_tx.send(report);
        }
    }

    debug!(cycle, ?pid, "reaper finished");
}

/// Graceful-then-forced termination.
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) -> ExitReport {
    match child.try_wait() {
        Ok(Some(status)) => return ExitReport::Stopped(status),
        Ok(None) => {}
        Err(err) => warn!(?pid, error = %err, "could not poll process state"),
    }

    match send_interrupt(child) {
        Ok(true) => {
            info!(?pid, grace_ms = grace.as_millis() as u64, "interrupt sent; waiting for exit");
            match timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    info!(?pid, %status, "process stopped");
                    return ExitReport::Stopped(status);
                }
                Ok(Err(err)) => {
                    warn!(?pid, error = %err, "failed waiting for interrupted process");
                }
                Err(_) => {
                    warn!(?pid, "process ignored interrupt within grace period; killing");
                }
            }
        }
        Ok(false) => {}
        Err(err) => {
            warn!(?pid, error = %err, "failed to send interrupt; killing");
        }
    }

    force_kill(child, pid).await
}

async fn force_kill(child: &mut Child, pid: Option<u32>) -> ExitReport {
    if let Err(err) = child.kill().await {
        warn!(?pid, error = %err, "failed to kill process");
    }
    match child.wait().await {
        Ok(status) => {
            info!(?pid, %status, "process killed");
            ExitReport::Stopped(status)
        }
        Err(err) => {
            warn!(?pid, error = %err, "failed waiting for killed process");
            ExitReport::Lost
        }
    }
}

/// Send SIGINT. Returns `Ok(false)` where no interrupt primitive exists.
#[cfg(unix)]
fn send_interrupt(child: &Child) -> std::result::Result<bool, String> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // `None` once the child has been reaped.
    let Some(pid) = child.id() else {
        return Ok(false);
    };
    let pid = i32::try_from(pid).map_err(|e| e.to_string())?;
    kill(Pid::from_raw(pid), Signal::SIGINT).map_err(|e| e.to_string())?;
    Ok(true)
}

#[cfg(not(unix))]
fn send_interrupt(_child: &Child) -> std::result::Result<bool, String> {
    Ok(false)
}

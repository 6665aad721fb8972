// src/console/mod.rs

//! Interactive command console.
//!
//! Reads one line at a time and maps it onto supervisor actions:
//! - `rs`: rebuild and restart now, bypassing the debounce gate
//! - `stats`: print a statistics snapshot to stdout
//!
//! Anything else is reported as unknown. End of input ends the console but
//! not the supervisor.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::engine::{CycleReport, StatsSnapshot, Supervisor, TriggerReason, report_cycle_error};
use crate::errors::Result;
use crate::exec::Builder;

/// Line channel depth between the stdin thread and the console task.
const LINE_BUFFER: usize = 16;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Restart,
    Stats,
    /// Blank line.
    Empty,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => ConsoleCommand::Empty,
            "rs" => ConsoleCommand::Restart,
            "stats" => ConsoleCommand::Stats,
            other => ConsoleCommand::Unknown(other.to_string()),
        }
    }
}

/// What a dispatched line did.
#[derive(Debug)]
pub enum ConsoleReply {
    Restarted(Result<CycleReport>),
    Stats(StatsSnapshot),
    Unknown(String),
    Empty,
}

pub struct CommandConsole<B: Builder> {
    supervisor: Arc<Supervisor<B>>,
}

impl<B: Builder> CommandConsole<B> {
    pub fn new(supervisor: Arc<Supervisor<B>>) -> Self {
        Self { supervisor }
    }

    /// Execute one input line against the supervisor.
    pub async fn dispatch(&self, line: &str) -> ConsoleReply {
        match ConsoleCommand::parse(line) {
            ConsoleCommand::Restart => {
                info!("manual restart requested");
                ConsoleReply::Restarted(self.supervisor.trigger_cycle(TriggerReason::Manual).await)
            }
            ConsoleCommand::Stats => ConsoleReply::Stats(self.supervisor.stats().await),
            ConsoleCommand::Unknown(cmd) => ConsoleReply::Unknown(cmd),
            ConsoleCommand::Empty => ConsoleReply::Empty,
        }
    }

    /// Process lines until input ends or `shutdown` flips.
    ///
    /// Replies are reported here: stats go to stdout, everything else to the
    /// log.
    pub async fn run(self, mut lines: mpsc::Receiver<String>, mut shutdown: watch::Receiver<bool>) {
        info!("console ready (commands: rs, stats)");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let line = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                line = lines.recv() => match line {
                    Some(line) => line,
                    None => {
                        info!("console input closed");
                        break;
                    }
                },
            };

            match self.dispatch(&line).await {
                ConsoleReply::Restarted(Ok(report)) => {
                    info!(cycle = report.cycle, pid = ?report.pid, "manual restart complete");
                }
                ConsoleReply::Restarted(Err(err)) => report_cycle_error(TriggerReason::Manual, &err),
                ConsoleReply::Stats(snapshot) => println!("{snapshot}"),
                ConsoleReply::Unknown(cmd) => warn!(command = %cmd, "unknown command"),
                ConsoleReply::Empty => {}
            }
        }

        debug!("console stopped");
    }
}

/// Convenience wrapper: run a console over `lines` until EOF or shutdown.
pub async fn run_console<B: Builder>(
    supervisor: Arc<Supervisor<B>>,
    lines: mpsc::Receiver<String>,
    shutdown: watch::Receiver<bool>,
) {
    CommandConsole::new(supervisor).run(lines, shutdown).await;
}

/// Read stdin on a dedicated OS thread and forward each line.
///
/// The thread ends at EOF, on a read error, or once the receiver is dropped
/// (noticed on the next line). Blocking stdin reads cannot be cancelled, so
/// the thread is detached rather than joined.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER);

    let spawned = std::thread::Builder::new()
        .name("hotloop-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to read console input");
                        break;
                    }
                }
            }
            debug!("stdin reader finished");
        });

    if let Err(err) = spawned {
        // `tx` went down with the closure; the console sees EOF right away.
        warn!(error = %err, "could not start stdin reader; console disabled");
    }

    rx
}

// src/engine/state.rs

use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::exec::{ExitReport, ManagedProcess};
use crate::types::HumanDuration;
use crate::watch::DebounceGate;

/// Where the supervisor is in its cycle.
///
/// Outside of a cycle only `Idle` and `Running` are observable; the others
/// are held while the cycle owns the lock. A failed build or a process exit
/// lands back in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Stopping,
    Building,
    Starting,
    Running,
}

/// Everything the supervisor mutates, behind one lock.
#[derive(Debug)]
pub struct SupervisorState {
    pub(crate) process: Option<ManagedProcess>,
    pub(crate) running: bool,
    pub(crate) phase: Phase,
    /// Holds the last accepted trigger timestamp.
    pub(crate) gate: DebounceGate,
    pub(crate) build_count: u64,
    pub(crate) last_build_duration: Option<Duration>,
    /// Reapers of processes no longer owned; joined at shutdown.
    pub(crate) retired: Vec<JoinHandle<()>>,
    pub(crate) shut_down: bool,
}

impl SupervisorState {
    pub fn new(gate: DebounceGate) -> Self {
        Self {
            process: None,
            running: false,
            phase: Phase::Idle,
            gate,
            build_count: 0,
            last_build_duration: None,
            retired: Vec::new(),
            shut_down: false,
        }
    }

    pub(crate) fn transition(&mut self, next: Phase) {
        if self.phase != next {
            debug!(from = ?self.phase, to = ?next, cycle = self.build_count, "phase change");
            self.phase = next;
        }
    }

    /// Detach the current process, if any, keeping its reaper for shutdown.
    pub(crate) fn retire(&mut self, process: ManagedProcess) {
        self.retired.push(process.into_reaper());
        self.retired.retain(|h| !h.is_finished());
    }

    /// Called from a reaper when its process exited on its own.
    ///
    /// Ignored if the process has already been replaced or stopped.
    pub(crate) fn mark_exited(&mut self, cycle: u64, report: ExitReport) {
        let is_current = self.process.as_ref().is_some_and(|p| p.cycle() == cycle);
        if !is_current {
            debug!(cycle, ?report, "exit of a process no longer owned; ignoring");
            return;
        }

        if let Some(process) = self.process.take() {
            info!(cycle, pid = ?process.pid(), ?report, "process exited; waiting for changes");
            self.retire(process);
        }
        self.running = false;
        self.transition(Phase::Idle);
    }
}

/// Point-in-time copy of the counters, for the `stats` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub build_count: u64,
    pub last_build_duration: Option<Duration>,
    pub running: bool,
    pub pid: Option<u32>,
    pub phase: Phase,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub listeners: usize,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hotloop statistics")?;
        writeln!(f, "------------------")?;
        writeln!(f, "Total runtime:        {}", HumanDuration(self.uptime))?;
        writeln!(f, "Total builds:         {}", self.build_count)?;
        match self.last_build_duration {
            Some(d) => writeln!(f, "Last build duration:  {}", HumanDuration(d))?,
            None => writeln!(f, "Last build duration:  -")?,
        }
        match (self.running, self.pid) {
            (true, Some(pid)) => writeln!(f, "Process:              running (pid {pid})")?,
            (true, None) => writeln!(f, "Process:              running")?,
            (false, _) => writeln!(f, "Process:              not running")?,
        }
        writeln!(f, "Reload listeners:     {}", self.listeners)?;
        writeln!(f, "Watching extensions:  {}", self.extensions.join(", "))?;
        write!(f, "Excluded directories: {}", self.exclude.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_render_lists_counters_and_filters() {
        let snap = StatsSnapshot {
            uptime: Duration::from_secs(65),
            build_count: 3,
            last_build_duration: Some(Duration::from_millis(420)),
            running: true,
            pid: Some(4242),
            phase: Phase::Running,
            extensions: vec![".go".into(), ".mod".into()],
            exclude: vec!["vendor".into()],
            listeners: 2,
        };
        let text = snap.to_string();
        assert!(text.contains("Total runtime:        1m5s"));
        assert!(text.contains("Total builds:         3"));
        assert!(text.contains("Last build duration:  420ms"));
        assert!(text.contains("running (pid 4242)"));
        assert!(text.contains(".go, .mod"));
        assert!(text.contains("Excluded directories: vendor"));
    }

    #[test]
    fn fresh_state_is_idle() {
        let state = SupervisorState::new(DebounceGate::new(vec![".go".into()], Duration::ZERO));
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.running);
        assert!(state.process.is_none());
        assert_eq!(state.build_count, 0);
    }
}

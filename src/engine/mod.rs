// src/engine/mod.rs

//! Supervision engine for hotloop.
//!
//! This module ties together:
//! - the debounce gate (which changes count)
//! - the build backend (how the artifact is produced)
//! - the managed child process (stop previous, start next)
//! - the live reload hub (who hears about it)
//!
//! [`Supervisor`] owns the single lock-guarded [`SupervisorState`] and runs
//! build cycles one at a time. [`runtime`] is the async loop that feeds it
//! filesystem events.

use std::process::ExitStatus;
use std::time::Duration;

use tracing::error;

use crate::errors::HotloopError;

pub mod runtime;
pub mod state;
pub mod supervisor;

pub use runtime::run_event_loop;
pub use state::{Phase, StatsSnapshot, SupervisorState};
pub use supervisor::Supervisor;

/// Why a build cycle was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// First build at startup.
    Initial,
    /// Accepted filesystem change.
    FileChange,
    /// `rs` on the console.
    Manual,
}

/// Summary of a successful build cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub reason: TriggerReason,
    pub build_duration: Duration,
    pub pid: Option<u32>,
    /// Exit status of the process this cycle replaced, if one was running and
    /// stopped cleanly.
    pub replaced: Option<ExitStatus>,
    /// Reload listeners that accepted the notification.
    pub listeners_notified: usize,
}

/// Status line for a failed cycle. Build output is included verbatim.
pub fn report_cycle_error(reason: TriggerReason, err: &HotloopError) {
    match reason {
        TriggerReason::Initial => error!("initial build failed: {err}"),
        TriggerReason::FileChange => error!("rebuild failed: {err}"),
        TriggerReason::Manual => error!("restart failed: {err}"),
    }
}

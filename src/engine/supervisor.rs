// src/engine/supervisor.rs

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::engine::state::{Phase, StatsSnapshot, SupervisorState};
use crate::engine::{CycleReport, TriggerReason};
use crate::errors::{HotloopError, Result};
use crate::exec::{Builder, LaunchSpec, ManagedProcess};
use crate::reload::{ReloadHub, ReloadSignal};
use crate::types::{ChangeEvent, HumanDuration};
use crate::watch::DebounceGate;
use crate::watch::path_utils::relative_str;

/// Owns the child process and serializes build cycles.
///
/// Every cycle (stop previous, build, start, notify) runs while holding the
/// state lock, so two triggers can never interleave. Triggers that arrive
/// during a cycle wait for it; change events that lose the debounce race are
/// dropped.
pub struct Supervisor<B: Builder> {
    config: Arc<SupervisorConfig>,
    builder: B,
    hub: ReloadHub,
    state: Arc<Mutex<SupervisorState>>,
    started_at: Instant,
}

impl<B: Builder> std::fmt::Debug for Supervisor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("root", &self.config.watch.root)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl<B: Builder> Supervisor<B> {
    pub fn new(config: SupervisorConfig, builder: B, hub: ReloadHub) -> Self {
        let gate = DebounceGate::new(config.watch.extensions.clone(), config.watch.debounce);
        Self {
            config: Arc::new(config),
            builder,
            hub,
            state: Arc::new(Mutex::new(SupervisorState::new(gate))),
            started_at: Instant::now(),
        }
    }

    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Feed one filesystem event through the debounce gate.
    ///
    /// Returns `None` when the event was filtered out or arrived inside the
    /// debounce window, otherwise the result of the cycle it triggered.
    pub async fn handle_change(&self, event: &ChangeEvent) -> Option<Result<CycleReport>> {
        // Stamped before waiting on the lock, so an event that queued behind
        // a running cycle is judged by when it was taken off the stream.
        let seen_at = Instant::now();
        let mut state = self.state.lock().await;
        if state.shut_down {
            return None;
        }
        if !state.gate.accept(event, seen_at) {
            return None;
        }

        let shown = relative_str(&self.config.watch.root, &event.path)
            .unwrap_or_else(|| event.path.display().to_string());
        info!(path = %shown, kind = ?event.kind, "change detected; rebuilding");
        Some(self.run_cycle(&mut state, TriggerReason::FileChange).await)
    }

    /// Run a cycle unconditionally. Manual triggers bypass the debounce gate
    /// and leave its anchor untouched.
    pub async fn trigger_cycle(&self, reason: TriggerReason) -> Result<CycleReport> {
        let mut state = self.state.lock().await;
        if state.shut_down {
            return Err(HotloopError::Other(anyhow!("supervisor is shut down")));
        }
        self.run_cycle(&mut state, reason).await
    }

    async fn run_cycle(
        &self,
        state: &mut SupervisorState,
        reason: TriggerReason,
    ) -> Result<CycleReport> {
        state.build_count += 1;
        let cycle = state.build_count;
        info!(cycle, ?reason, "build cycle starting");

        // 1. Stop whatever the previous cycle started.
        let mut replaced = None;
        if let Some(mut previous) = state.process.take() {
            state.transition(Phase::Stopping);
            match previous.stop(self.config.run.stop_timeout).await {
                Ok(status) => replaced = Some(status),
                Err(err) => warn!(cycle, error = %err, "failed to stop previous process; continuing"),
            }
            state.retire(previous);
        }
        state.running = false;

        // 2. Build.
        state.transition(Phase::Building);
        let result = self.builder.build().await;
        let elapsed = result.elapsed;
        let artifact = match result.into_artifact() {
            Ok(artifact) => artifact,
            Err(err) => {
                state.transition(Phase::Idle);
                return Err(err);
            }
        };
        state.last_build_duration = Some(elapsed);
        info!(cycle, elapsed = %HumanDuration(elapsed), artifact = ?artifact, "artifact ready; starting");

        // 3. Start the fresh artifact.
        state.transition(Phase::Starting);
        let spec = LaunchSpec {
            program: artifact,
            args: self.config.run.args.clone(),
            env: self.config.build.env.clone(),
            workdir: self.config.watch.root.clone(),
        };

        let weak_state = Arc::downgrade(&self.state);
        let spawned = ManagedProcess::spawn(&spec, cycle, move |report| async move {
            if let Some(state) = weak_state.upgrade() {
                state.lock().await.mark_exited(cycle, report);
            }
        });
        let process = match spawned {
            Ok(process) => process,
            Err(err) => {
                state.transition(Phase::Idle);
                return Err(err);
            }
        };

        let pid = process.pid();
        state.process = Some(process);
        state.running = true;
        state.transition(Phase::Running);

        // 4. Tell the browsers.
        let listeners_notified = self.hub.broadcast(ReloadSignal { cycle });
        debug!(cycle, listeners_notified, "reload broadcast");

        Ok(CycleReport {
            cycle,
            reason,
            build_duration: elapsed,
            pid,
            replaced,
            listeners_notified,
        })
    }

    /// Consistent copy of the counters. Waits for an in-flight cycle.
    pub async fn stats(&self) -> StatsSnapshot {
        let state = self.state.lock().await;
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            build_count: state.build_count,
            last_build_duration: state.last_build_duration,
            running: state.running,
            pid: state.process.as_ref().and_then(ManagedProcess::pid),
            phase: state.phase,
            extensions: self.config.watch.extensions.clone(),
            exclude: self.config.watch.exclude.clone(),
            listeners: self.hub.listener_count(),
        }
    }

    /// Stop the child (if any), refuse further cycles, and wait for every
    /// reaper to finish. Safe to call more than once.
    pub async fn shutdown(&self) {
        let reapers = {
            let mut state = self.state.lock().await;
            state.shut_down = true;

            if let Some(mut process) = state.process.take() {
                state.transition(Phase::Stopping);
                match process.stop(self.config.run.stop_timeout).await {
                    Ok(status) => info!(pid = ?process.pid(), %status, "process stopped for shutdown"),
                    Err(err) => warn!(error = %err, "failed to stop process during shutdown"),
                }
                state.retire(process);
            }
            state.running = false;
            state.transition(Phase::Idle);

            std::mem::take(&mut state.retired)
        };

        // Reapers may be waiting on the lock in their exit hook.
        for reaper in reapers {
            if let Err(err) = reaper.await {
                debug!(error = %err, "reaper task did not finish cleanly");
            }
        }
    }
}

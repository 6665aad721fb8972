// src/engine/runtime.rs

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::supervisor::Supervisor;
use crate::engine::{TriggerReason, report_cycle_error};
use crate::errors::{HotloopError, Result};
use crate::exec::Builder;
use crate::watch::MonitorStreams;

/// Consume monitor output and drive the supervisor until shutdown.
///
/// - Change events go through [`Supervisor::handle_change`], one at a time.
///   Cycle failures are logged and the loop keeps going.
/// - Watch errors are logged and otherwise ignored.
/// - The change stream ending is fatal: `WatchStreamClosed`.
/// - `shutdown` flipping to `true` (or its sender going away) ends the loop
///   cleanly.
pub async fn run_event_loop<B: Builder>(
    supervisor: Arc<Supervisor<B>>,
    streams: MonitorStreams,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let MonitorStreams {
        mut changes,
        mut errors,
    } = streams;
    let mut errors_open = true;

    info!("event loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    debug!("shutdown sender dropped; leaving event loop");
                    break;
                }
                // Re-checked at the top of the loop.
            }

            event = changes.recv() => match event {
                Some(event) => {
                    if let Some(Err(err)) = supervisor.handle_change(&event).await {
                        report_cycle_error(TriggerReason::FileChange, &err);
                    }
                }
                None => {
                    warn!("change stream closed");
                    return Err(HotloopError::WatchStreamClosed);
                }
            },

            err = errors.recv(), if errors_open => match err {
                Some(err) => warn!(error = %err, "watch error"),
                None => errors_open = false,
            },
        }
    }

    info!("event loop stopped");
    Ok(())
}

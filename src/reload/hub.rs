// src/reload/hub.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Per-listener queue depth. A listener that falls this far behind is
/// dropped on the next broadcast.
pub const LISTENER_BUFFER: usize = 4;

/// Identifier handed out by [`ReloadHub::register`].
pub type ListenerId = u64;

/// One "reload occurred" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSignal {
    /// Build cycle that produced the new process.
    pub cycle: u64,
}

#[derive(Debug, Default)]
struct HubInner {
    next_id: ListenerId,
    listeners: HashMap<ListenerId, mpsc::Sender<ReloadSignal>>,
}

/// The dynamic set of live reload listeners.
///
/// Cheap to clone; all clones share the same set. Broadcasting never blocks:
/// each push is a `try_send`, and any listener whose queue is full or closed
/// is removed.
#[derive(Debug, Clone, Default)]
pub struct ReloadHub {
    inner: Arc<Mutex<HubInner>>,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        // The set stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a listener and return its id plus the receiving end of its queue.
    pub fn register(&self) -> (ListenerId, mpsc::Receiver<ReloadSignal>) {
        let (tx, rx) = mpsc::channel(LISTENER_BUFFER);
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, tx);
        debug!(listener = id, total = inner.listeners.len(), "reload listener registered");
        (id, rx)
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn deregister(&self, id: ListenerId) {
        let mut inner = self.lock();
        if inner.listeners.remove(&id).is_some() {
            debug!(listener = id, total = inner.listeners.len(), "reload listener removed");
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Push `signal` to every listener. Returns how many accepted it.
    pub fn broadcast(&self, signal: ReloadSignal) -> usize {
        let mut inner = self.lock();
        let mut delivered = 0;

        inner.listeners.retain(|id, tx| match tx.try_send(signal) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!(listener = *id, "reload listener too slow; dropping it");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(listener = *id, "reload listener gone; dropping it");
                false
            }
        });

        delivered
    }
}

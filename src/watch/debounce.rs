// src/watch/debounce.rs

//! Lossy burst filter between the filesystem monitor and the supervisor.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::types::ChangeEvent;
use crate::watch::path_utils::dotted_extension;

/// Why an event was not accepted. Useful for trace logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Accepted,
    /// Metadata / access / unknown operation.
    IgnoredKind,
    /// Extension not in the allow-list.
    IgnoredExtension,
    /// Arrived inside the debounce window of the last accepted trigger.
    TooSoon,
}

/// Collapses bursts of qualifying change events into single triggers.
///
/// The window is anchored at the last *accepted* trigger. Rejected events
/// never move the anchor, and nothing is buffered: an event that loses is
/// gone.
#[derive(Debug, Clone)]
pub struct DebounceGate {
    extensions: Vec<String>,
    debounce: Duration,
    last_accepted: Option<Instant>,
}

impl DebounceGate {
    pub fn new(extensions: Vec<String>, debounce: Duration) -> Self {
        Self {
            extensions,
            debounce,
            last_accepted: None,
        }
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    fn classify(&self, event: &ChangeEvent) -> GateDecision {
        if !event.kind.modifies_content() {
            return GateDecision::IgnoredKind;
        }
        match dotted_extension(&event.path) {
            Some(ext) if self.extensions.iter().any(|e| e == ext) => GateDecision::Accepted,
            _ => GateDecision::IgnoredExtension,
        }
    }

    /// Decide whether `event`, observed at `now`, should trigger a cycle.
    ///
    /// On acceptance the anchor moves to `now`; the caller is expected to
    /// start the rebuild right away.
    pub fn check(&mut self, event: &ChangeEvent, now: Instant) -> GateDecision {
        let decision = self.classify(event);
        if decision != GateDecision::Accepted {
            trace!(path = ?event.path, kind = ?event.kind, ?decision, "change event filtered");
            return decision;
        }

        if let Some(last) = self.last_accepted {
            // `now` earlier than `last` (clock skew between callers) counts as
            // zero elapsed.
            if now.saturating_duration_since(last) < self.debounce {
                trace!(path = ?event.path, "change event inside debounce window");
                return GateDecision::TooSoon;
            }
        }

        self.last_accepted = Some(now);
        GateDecision::Accepted
    }

    /// Boolean form of [`check`](Self::check).
    pub fn accept(&mut self, event: &ChangeEvent, now: Instant) -> bool {
        self.check(event, now) == GateDecision::Accepted
    }
}

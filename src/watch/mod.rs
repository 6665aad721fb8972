// src/watch/mod.rs

//! File watching and change filtering.
//!
//! This module is responsible for:
//! - Walking the project tree once and registering per-directory watches
//!   (`monitor`).
//! - Turning `notify` events into [`ChangeEvent`](crate::types::ChangeEvent)s
//!   on one channel and watch errors on another.
//! - Collapsing bursts of qualifying changes into single triggers
//!   (`debounce`).
//!
//! It does **not** know how builds or processes work; the engine decides what
//! an accepted change means.

pub mod debounce;
pub mod monitor;
pub mod path_utils;

pub use debounce::{DebounceGate, GateDecision};
pub use monitor::{
    MonitorHandle, MonitorStreams, change_events_from, collect_watch_dirs, spawn_monitor,
};

// src/reload/mod.rs

//! Live reload notifications.
//!
//! [`ReloadHub`] is the set of connected listeners; the supervisor broadcasts
//! into it after each successful build. [`spawn_reload_server`] accepts
//! websocket listeners on a well-known port independently of build state.

pub mod hub;
pub mod server;

pub use hub::{ListenerId, ReloadHub, ReloadSignal};
pub use server::{RELOAD_MESSAGE, ReloadServerHandle, spawn_reload_server};

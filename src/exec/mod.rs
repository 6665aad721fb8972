// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for everything that touches external
//! processes, using `tokio::process::Command`:
//!
//! - [`backend`] provides the `Builder` trait the supervisor builds through,
//!   plus the `BuildResult` it gets back. Tests replace the backend with a
//!   fake.
//! - [`pipeline`] is the production builder: pre-build scripts, then the
//!   compile step, with captured output.
//! - [`process`] owns the single managed child: spawn with inherited stdio,
//!   a reaper task per child, graceful-then-forced stop.

pub mod backend;
pub mod pipeline;
pub mod process;

pub use backend::{BuildOutcome, BuildResult, Builder};
pub use pipeline::BuildPipeline;
pub use process::{ExitReport, LaunchSpec, ManagedProcess};

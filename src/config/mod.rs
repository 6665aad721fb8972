// src/config/mod.rs

//! Configuration loading and validation for hotloop.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and the validated, immutable
//!   [`SupervisorConfig`] (`model.rs`).
//! - Load a config file from disk and layer CLI overrides on top (`loader.rs`).
//! - Validate durations, extensions, commands and addresses (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{ConfigOverrides, load_and_validate, load_from_path, resolve};
pub use model::{
    BuildConfig, BuildSection, RawConfigFile, ReloadConfig, ReloadSection, RunConfig, RunSection,
    SupervisorConfig, WatchConfig, WatchSection,
};

// src/errors.rs

//! Crate-wide error type and aliases.
//!
//! Only [`HotloopError::WatchInit`] and [`HotloopError::WatchStreamClosed`]
//! are fatal to the supervisor. Everything else is local to one build cycle
//! and is reported without taking the supervisor down.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HotloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to initialise file watcher on {path:?}: {reason}")]
    WatchInit { path: PathBuf, reason: String },

    #[error("file watcher event stream closed")]
    WatchStreamClosed,

    #[error("pre-build script `{script}` failed ({}):\n{output}", describe_code(.code))]
    ScriptFailure {
        script: String,
        code: Option<i32>,
        output: String,
    },

    #[error("build failed ({}):\n{output}", describe_code(.code))]
    CompileFailure { code: Option<i32>, output: String },

    #[error("failed to start process {path:?}: {source}")]
    ProcessStart {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stop process: {0}")]
    Stop(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HotloopError {
    /// True for errors that should end the whole supervisor.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HotloopError::WatchInit { .. } | HotloopError::WatchStreamClosed
        )
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "terminated without exit code".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HotloopError>;

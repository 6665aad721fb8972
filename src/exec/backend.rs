// src/exec/backend.rs

//! Pluggable build backend abstraction.
//!
//! The supervisor talks to a [`Builder`] instead of spawning the compiler
//! itself. Production code uses [`BuildPipeline`](super::pipeline::BuildPipeline);
//! tests swap in a fake that returns scripted results without running any
//! external tool.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::HotloopError;

/// Trait abstracting how the artifact is produced.
pub trait Builder: Send + Sync {
    /// Run the full build (pre-build scripts, then the compile step).
    ///
    /// Implementations must not start the artifact.
    fn build(&self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>>;
}

/// Where a build stopped, or the artifact it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Success {
        artifact: PathBuf,
    },
    /// A pre-build script exited non-zero (or could not be started). Later
    /// scripts and the compile step did not run.
    ScriptFailed {
        script: String,
        code: Option<i32>,
        output: String,
    },
    CompileFailed {
        code: Option<i32>,
        output: String,
    },
}

/// Result of one [`Builder::build`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub outcome: BuildOutcome,
    pub elapsed: Duration,
}

impl BuildResult {
    pub fn success(artifact: impl Into<PathBuf>, elapsed: Duration) -> Self {
        Self {
            outcome: BuildOutcome::Success {
                artifact: artifact.into(),
            },
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Success { .. })
    }

    /// Combined stdout+stderr of the failing step, if any.
    pub fn output(&self) -> Option<&str> {
        match &self.outcome {
            BuildOutcome::Success { .. } => None,
            BuildOutcome::ScriptFailed { output, .. } | BuildOutcome::CompileFailed { output, .. } => {
                Some(output)
            }
        }
    }

    /// Split into the artifact path or the matching error.
    pub fn into_artifact(self) -> Result<PathBuf, HotloopError> {
        match self.outcome {
            BuildOutcome::Success { artifact } => Ok(artifact),
            BuildOutcome::ScriptFailed {
                script,
                code,
                output,
            } => Err(HotloopError::ScriptFailure {
                script,
                code,
                output,
            }),
            BuildOutcome::CompileFailed { code, output } => {
                Err(HotloopError::CompileFailure { code, output })
            }
        }
    }
}

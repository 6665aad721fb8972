// src/exec/pipeline.rs

//! Pre-build scripts followed by the compile step.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{Output, Stdio};
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::config::model::OUTPUT_PLACEHOLDER;
use crate::exec::backend::{BuildOutcome, BuildResult, Builder};

/// Production [`Builder`].
///
/// Every step runs in the watch root with the configured environment
/// overrides merged over the inherited environment. Output is captured, not
/// streamed, so it can be shown verbatim when a step fails.
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    workdir: PathBuf,
    scripts: Vec<String>,
    command: Vec<String>,
    flags: Vec<String>,
    env: BTreeMap<String, String>,
    artifact: PathBuf,
}

impl BuildPipeline {
    pub fn new(config: &SupervisorConfig) -> Self {
        let artifact = config.artifact_path();
        // The compiler runs with `workdir` as cwd, so a relative artifact path
        // would be resolved twice.
        let artifact = std::path::absolute(&artifact).unwrap_or(artifact);

        Self {
            workdir: config.watch.root.clone(),
            scripts: config.build.scripts.clone(),
            command: config.build.command.clone(),
            flags: config.build.flags.clone(),
            env: config.build.env.clone(),
            artifact,
        }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    /// Program and arguments of the compile step, with `{output}` expanded.
    pub fn compile_argv(&self) -> Vec<String> {
        let output = self.artifact.to_string_lossy();
        self.command
            .iter()
            .chain(self.flags.iter())
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output))
            .collect()
    }

    /// Run scripts, then the compiler. Stops at the first failing step.
    pub async fn run(&self) -> BuildResult {
        let started = Instant::now();
        let outcome = self.run_steps().await;
        let elapsed = started.elapsed();

        match &outcome {
            BuildOutcome::Success { artifact } => {
                info!(artifact = ?artifact, elapsed_ms = elapsed.as_millis() as u64, "build succeeded");
            }
            BuildOutcome::ScriptFailed { script, code, .. } => {
                warn!(script = %script, ?code, "pre-build script failed");
            }
            BuildOutcome::CompileFailed { code, .. } => {
                warn!(?code, "compile step failed");
            }
        }

        BuildResult { outcome, elapsed }
    }

    async fn run_steps(&self) -> BuildOutcome {
        for (idx, script) in self.scripts.iter().enumerate() {
            debug!(step = idx, script = %script, "running pre-build script");

            match self.shell(script).output().await {
                Ok(out) if out.status.success() => {}
                Ok(out) => {
                    return BuildOutcome::ScriptFailed {
                        script: script.clone(),
                        code: out.status.code(),
                        output: combined_output(&out),
                    };
                }
                Err(err) => {
                    return BuildOutcome::ScriptFailed {
                        script: script.clone(),
                        code: None,
                        output: format!("could not run script: {err}"),
                    };
                }
            }
        }

        let argv = self.compile_argv();
        let Some((program, args)) = argv.split_first() else {
            return BuildOutcome::CompileFailed {
                code: None,
                output: "no compile command configured".to_string(),
            };
        };

        debug!(program = %program, ?args, "running compile step");

        let mut cmd = Command::new(program);
        cmd.args(args);
        self.prepare(&mut cmd);

        match cmd.output().await {
            Ok(out) if out.status.success() => BuildOutcome::Success {
                artifact: self.artifact.clone(),
            },
            Ok(out) => BuildOutcome::CompileFailed {
                code: out.status.code(),
                output: combined_output(&out),
            },
            Err(err) => BuildOutcome::CompileFailed {
                code: None,
                output: format!("could not run `{program}`: {err}"),
            },
        }
    }

    /// Build a shell command appropriate for the platform.
    fn shell(&self, script: &str) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(script);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(script);
            c
        };
        self.prepare(&mut cmd);
        cmd
    }

    fn prepare(&self, cmd: &mut Command) {
        cmd.current_dir(&self.workdir)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
    }
}

impl Builder for BuildPipeline {
    fn build(&self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>> {
        Box::pin(self.run())
    }
}

fn combined_output(out: &Output) -> String {
    let mut s = String::from_utf8_lossy(&out.stdout).into_owned();
    s.push_str(&String::from_utf8_lossy(&out.stderr));
    s
}

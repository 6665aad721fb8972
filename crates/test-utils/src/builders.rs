#![allow(dead_code)]

use std::path::{Path, PathBuf};

use hotloop::config::{RawConfigFile, SupervisorConfig};

/// Builder for `SupervisorConfig` to simplify test setup.
///
/// Starts from the built-in defaults with live reload disabled and a short
/// stop timeout, so tests never bind the well-known port or wait long.
pub struct SupervisorConfigBuilder {
    config: RawConfigFile,
}

impl SupervisorConfigBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let mut config = RawConfigFile::default();
        config.watch.root = root.as_ref().to_path_buf();
        config.run.stop_timeout = "2s".to_string();
        config.reload.enabled = false;
        config.reload.address = "127.0.0.1:0".to_string();
        Self { config }
    }

    pub fn debounce(mut self, value: &str) -> Self {
        self.config.watch.debounce = value.to_string();
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.config.watch.extensions = exts.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn exclude(mut self, fragments: &[&str]) -> Self {
        self.config.watch.exclude = fragments.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.watch.include.push(dir.into());
        self
    }

    pub fn script(mut self, script: &str) -> Self {
        self.config.build.scripts.push(script.to_string());
        self
    }

    pub fn command(mut self, argv: &[&str]) -> Self {
        self.config.build.command = argv.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn flag(mut self, flag: &str) -> Self {
        self.config.build.flags.push(flag.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config
            .build
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn artifact(mut self, name: &str) -> Self {
        self.config.build.artifact = name.to_string();
        self
    }

    pub fn run_args(mut self, args: &[&str]) -> Self {
        self.config.run.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn stop_timeout(mut self, value: &str) -> Self {
        self.config.run.stop_timeout = value.to_string();
        self
    }

    pub fn raw(&self) -> &RawConfigFile {
        &self.config
    }

    pub fn build(self) -> SupervisorConfig {
        SupervisorConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

// src/config/validate.rs

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::model::{
    BuildConfig, RawConfigFile, ReloadConfig, RunConfig, SupervisorConfig, WatchConfig,
};
use crate::errors::{HotloopError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for SupervisorConfig {
    type Error = crate::errors::HotloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let watch = validate_watch(&raw)?;
        let build = validate_build(&raw)?;
        let run = validate_run(&raw)?;
        let reload = validate_reload(&raw)?;
        Ok(SupervisorConfig::new_unchecked(watch, build, run, reload))
    }
}

fn validate_watch(cfg: &RawConfigFile) -> Result<WatchConfig> {
    let section = &cfg.watch;

    if section.root.as_os_str().is_empty() {
        return Err(config_error("[watch].root must not be empty"));
    }

    let debounce = parse_field("[watch].debounce", &section.debounce)?;

    if section.extensions.is_empty() {
        return Err(config_error("[watch].extensions must list at least one extension"));
    }
    for ext in &section.extensions {
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(config_error(format!(
                "[watch].extensions entry '{ext}' must look like '.go' (leading dot, non-empty)"
            )));
        }
    }

    if section.exclude.iter().any(|frag| frag.is_empty()) {
        // An empty fragment is contained in every path and would exclude the
        // whole tree.
        return Err(config_error("[watch].exclude must not contain empty entries"));
    }

    if section.include.is_empty() {
        return Err(config_error("[watch].include must list at least one directory"));
    }

    Ok(WatchConfig {
        root: section.root.clone(),
        debounce,
        extensions: dedup_preserving_order(&section.extensions),
        exclude: section.exclude.clone(),
        include: section.include.clone(),
    })
}

fn validate_build(cfg: &RawConfigFile) -> Result<BuildConfig> {
    let section = &cfg.build;

    match section.command.first() {
        Some(program) if !program.trim().is_empty() => {}
        _ => {
            return Err(config_error(
                "[build].command must name a program, e.g. [\"go\", \"build\", \"-o\", \"{output}\"]",
            ));
        }
    }

    if section.artifact.trim().is_empty() {
        return Err(config_error("[build].artifact must not be empty"));
    }

    if section.scripts.iter().any(|s| s.trim().is_empty()) {
        return Err(config_error("[build].scripts must not contain empty entries"));
    }

    if let Some(key) = section.env.keys().find(|k| k.is_empty() || k.contains('=')) {
        return Err(config_error(format!(
            "[build].env key '{key}' is not a valid environment variable name"
        )));
    }

    Ok(BuildConfig {
        scripts: section.scripts.clone(),
        command: section.command.clone(),
        flags: section.flags.clone(),
        env: section.env.clone(),
        output_dir: section.output_dir.clone(),
        artifact: section.artifact.clone(),
    })
}

fn validate_run(cfg: &RawConfigFile) -> Result<RunConfig> {
    let stop_timeout = parse_field("[run].stop_timeout", &cfg.run.stop_timeout)?;
    if stop_timeout.is_zero() {
        return Err(config_error("[run].stop_timeout must be greater than zero"));
    }

    Ok(RunConfig {
        args: cfg.run.args.clone(),
        stop_timeout,
    })
}

fn validate_reload(cfg: &RawConfigFile) -> Result<ReloadConfig> {
    let section = &cfg.reload;

    let address: SocketAddr = section.address.parse().map_err(|e| {
        config_error(format!(
            "[reload].address '{}' is not a socket address: {e}",
            section.address
        ))
    })?;

    if !section.path.starts_with('/') {
        return Err(config_error(format!(
            "[reload].path '{}' must start with '/'",
            section.path
        )));
    }

    Ok(ReloadConfig {
        enabled: section.enabled,
        address,
        path: section.path.clone(),
    })
}

fn parse_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| config_error(format!("{field}: {e}")))
}

fn dedup_preserving_order(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

fn config_error(msg: impl Into<String>) -> HotloopError {
    HotloopError::ConfigError(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = SupervisorConfig::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.watch.debounce, Duration::from_secs(1));
        assert_eq!(cfg.watch.extensions, vec![".go", ".mod", ".sum"]);
        assert_eq!(cfg.run.stop_timeout, Duration::from_secs(5));
        assert_eq!(cfg.reload.address.port(), 35729);
        assert_eq!(cfg.reload.path, "/livereload");
    }

    #[test]
    fn extension_without_dot_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.watch.extensions = vec!["go".to_string()];
        match SupervisorConfig::try_from(raw) {
            Err(HotloopError::ConfigError(msg)) => assert!(msg.contains("'go'")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn empty_command_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.build.command.clear();
        assert!(matches!(
            SupervisorConfig::try_from(raw),
            Err(HotloopError::ConfigError(_))
        ));
    }

    #[test]
    fn zero_debounce_is_allowed_but_zero_stop_timeout_is_not() {
        let mut raw = RawConfigFile::default();
        raw.watch.debounce = "0ms".to_string();
        assert!(SupervisorConfig::try_from(raw.clone()).is_ok());

        raw.run.stop_timeout = "0s".to_string();
        assert!(SupervisorConfig::try_from(raw).is_err());
    }

    #[test]
    fn duplicate_extensions_collapse_in_order() {
        let mut raw = RawConfigFile::default();
        raw.watch.extensions = vec![".rs".into(), ".toml".into(), ".rs".into()];
        let cfg = SupervisorConfig::try_from(raw).unwrap();
        assert_eq!(cfg.watch.extensions, vec![".rs", ".toml"]);
    }

    #[test]
    fn bad_reload_address_and_path_are_rejected() {
        let mut raw = RawConfigFile::default();
        raw.reload.address = ":35729".to_string();
        assert!(SupervisorConfig::try_from(raw).is_err());

        let mut raw = RawConfigFile::default();
        raw.reload.path = "livereload".to_string();
        assert!(SupervisorConfig::try_from(raw).is_err());
    }
}

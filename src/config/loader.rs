// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawConfigFile, SupervisorConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it into a
/// [`SupervisorConfig`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SupervisorConfig> {
    let raw_config = load_from_path(&path)?;
    SupervisorConfig::try_from(raw_config)
}

/// Values supplied on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root: Option<PathBuf>,
    pub debounce: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub disable_reload: bool,
}

impl ConfigOverrides {
    pub fn apply(self, raw: &mut RawConfigFile) {
        if let Some(root) = self.root {
            raw.watch.root = root;
        }
        if let Some(debounce) = self.debounce {
            raw.watch.debounce = debounce;
        }
        if let Some(extensions) = self.extensions {
            raw.watch.extensions = extensions;
        }
        if let Some(exclude) = self.exclude {
            raw.watch.exclude = exclude;
        }
        if self.disable_reload {
            raw.reload.enabled = false;
        }
    }
}

/// Resolve the effective configuration.
///
/// - An explicit `path` must exist.
/// - Without one, [`default_config_path`] is used if present, otherwise the
///   built-in defaults apply.
/// - `overrides` are layered on top before validation.
pub fn resolve(path: Option<&Path>, overrides: ConfigOverrides) -> Result<SupervisorConfig> {
    let mut raw = match path {
        Some(p) => load_from_path(p)?,
        None => {
            let default_path = default_config_path();
            if default_path.is_file() {
                debug!(path = ?default_path, "using default config file");
                load_from_path(&default_path)?
            } else {
                debug!("no config file found; using built-in defaults");
                RawConfigFile::default()
            }
        }
    };

    overrides.apply(&mut raw);
    SupervisorConfig::try_from(raw)
}

/// Helper to resolve a default config path: `Hotloop.toml` in the current
/// working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Hotloop.toml")
}

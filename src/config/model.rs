// src/config/model.rs

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// root = "."
/// debounce = "1s"
/// extensions = [".go", ".mod", ".sum"]
/// exclude = ["vendor", "node_modules", ".git"]
///
/// [build]
/// scripts = ["go generate ./..."]
/// command = ["go", "build", "-o", "{output}"]
/// flags = ["-race"]
///
/// [build.env]
/// CGO_ENABLED = "1"
/// ```
///
/// All sections are optional and have defaults suited to a Go project.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub reload: ReloadSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Directory to watch; also the working directory for builds.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Minimum spacing between accepted triggers, e.g. `"1s"` or `"300ms"`.
    #[serde(default = "default_debounce")]
    pub debounce: String,

    /// Extensions that count as source changes, including the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory fragments to skip. A directory is skipped when its path
    /// *contains* any of these strings anywhere.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Root-relative directories to walk at startup.
    #[serde(default = "default_include")]
    pub include: Vec<PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_debounce() -> String {
    "1s".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![".go".to_string(), ".mod".to_string(), ".sum".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        "vendor".to_string(),
        "node_modules".to_string(),
        ".git".to_string(),
    ]
}

fn default_include() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            debounce: default_debounce(),
            extensions: default_extensions(),
            exclude: default_exclude(),
            include: default_include(),
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Shell snippets run in order before the compile step.
    #[serde(default)]
    pub scripts: Vec<String>,

    /// Compile command. Every `{output}` is replaced by the artifact path.
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Extra compiler flags appended after `command`.
    #[serde(default)]
    pub flags: Vec<String>,

    /// Environment overrides for scripts, the compiler and the artifact.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Output directory, relative to the watch root.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Artifact file name without the platform executable suffix.
    #[serde(default = "default_artifact")]
    pub artifact: String,
}

fn default_command() -> Vec<String> {
    ["go", "build", "-o", OUTPUT_PLACEHOLDER]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("bin")
}

fn default_artifact() -> String {
    "app".to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            scripts: Vec::new(),
            command: default_command(),
            flags: Vec::new(),
            env: BTreeMap::new(),
            output_dir: default_output_dir(),
            artifact: default_artifact(),
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub args: Vec<String>,

    /// How long to wait after the interrupt before killing the process.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,
}

fn default_stop_timeout() -> String {
    "5s".to_string()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

/// `[reload]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadSection {
    #[serde(default = "default_reload_enabled")]
    pub enabled: bool,

    #[serde(default = "default_reload_address")]
    pub address: String,

    #[serde(default = "default_reload_path")]
    pub path: String,
}

fn default_reload_enabled() -> bool {
    true
}

fn default_reload_address() -> String {
    format!("0.0.0.0:{DEFAULT_RELOAD_PORT}")
}

fn default_reload_path() -> String {
    "/livereload".to_string()
}

impl Default for ReloadSection {
    fn default() -> Self {
        Self {
            enabled: default_reload_enabled(),
            address: default_reload_address(),
            path: default_reload_path(),
        }
    }
}

/// Placeholder substituted with the artifact path in `build.command`.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Well-known live reload port.
pub const DEFAULT_RELOAD_PORT: u16 = 35729;

/// What to watch and how eagerly to react.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub root: PathBuf,
    pub debounce: Duration,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub include: Vec<PathBuf>,
}

/// How to produce the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub scripts: Vec<String>,
    pub command: Vec<String>,
    pub flags: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub output_dir: PathBuf,
    pub artifact: String,
}

impl BuildConfig {
    /// Absolute-or-root-relative artifact path, with the platform suffix.
    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        let file_name = format!("{}{}", self.artifact, std::env::consts::EXE_SUFFIX);
        root.join(&self.output_dir).join(file_name)
    }
}

/// How to run and stop the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub args: Vec<String>,
    pub stop_timeout: Duration,
}

/// Live reload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadConfig {
    pub enabled: bool,
    pub address: SocketAddr,
    pub path: String,
}

/// Validated, immutable configuration handed to the supervisor.
///
/// Construct via `SupervisorConfig::try_from(RawConfigFile)` (see
/// `validate.rs`), which is the only way to obtain one outside this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub watch: WatchConfig,
    pub build: BuildConfig,
    pub run: RunConfig,
    pub reload: ReloadConfig,
}

impl SupervisorConfig {
    pub(crate) fn new_unchecked(
        watch: WatchConfig,
        build: BuildConfig,
        run: RunConfig,
        reload: ReloadConfig,
    ) -> Self {
        Self {
            watch,
            build,
            run,
            reload,
        }
    }

    /// Where the compile step writes the binary.
    pub fn artifact_path(&self) -> PathBuf {
        self.build.artifact_path(&self.watch.root)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.watch.root.join(&self.build.output_dir)
    }
}

// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::ConfigOverrides;

/// Command-line arguments for `hotloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hotloop",
    version,
    about = "Rebuild and restart a program whenever its sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Hotloop.toml` in the current directory if it exists,
    /// otherwise built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to watch and build in.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Minimum spacing between rebuilds, e.g. `500ms` or `2s`.
    #[arg(long, value_name = "DURATION")]
    pub debounce: Option<String>,

    /// Comma-separated extensions to watch, e.g. `.go,.mod`.
    #[arg(long = "ext", value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Comma-separated directory fragments to skip.
    #[arg(long, value_name = "DIRS", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Do not start the live reload server.
    #[arg(long)]
    pub no_reload: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOTLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the effective configuration, but don't build
    /// or run anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root: self.root.clone(),
            debounce: self.debounce.clone(),
            extensions: self.extensions.clone(),
            exclude: self.exclude.clone(),
            disable_reload: self.no_reload,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod reload;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch as signal_watch;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{SupervisorConfig, resolve};
use crate::console::{run_console, spawn_stdin_reader};
use crate::engine::{Supervisor, TriggerReason, report_cycle_error, run_event_loop};
use crate::exec::BuildPipeline;
use crate::fs::{FileSystem, RealFileSystem};
use crate::reload::{ReloadHub, spawn_reload_server};
use crate::types::HumanDuration;
use crate::watch::spawn_monitor;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config resolution (file, defaults, CLI overrides)
/// - the filesystem monitor
/// - the live reload server
/// - the supervisor with the real build pipeline
/// - the console and the event loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = resolve(args.config.as_deref(), args.overrides())?;
    cfg.watch.root = std::fs::canonicalize(&cfg.watch.root)
        .with_context(|| format!("watch root {:?} is not accessible", cfg.watch.root))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let output_dir = cfg.output_dir();
    if !fs.exists(&output_dir) {
        fs.create_dir_all(&output_dir)
            .with_context(|| format!("cannot create output directory {output_dir:?}"))?;
        info!(dir = ?output_dir, "created output directory");
    }

    // Monitor failure is fatal and should surface before the first build.
    let (monitor, streams) = spawn_monitor(&cfg.watch, Arc::clone(&fs))?;
    info!(
        root = ?cfg.watch.root,
        dirs = monitor.watched_dirs().len(),
        "watching for changes"
    );

    let hub = ReloadHub::new();
    let reload_server = if cfg.reload.enabled {
        match spawn_reload_server(cfg.reload.address, &cfg.reload.path, hub.clone()).await {
            Ok(server) => Some(server),
            Err(err) => {
                warn!(address = %cfg.reload.address, error = %err, "live reload disabled");
                None
            }
        }
    } else {
        debug!("live reload disabled by configuration");
        None
    };

    let builder = BuildPipeline::new(&cfg);
    let supervisor = Arc::new(Supervisor::new(cfg, builder, hub));

    if let Err(err) = supervisor.trigger_cycle(TriggerReason::Initial).await {
        report_cycle_error(TriggerReason::Initial, &err);
    }

    let (shutdown_tx, shutdown_rx) = signal_watch::channel(false);

    let console = tokio::spawn(run_console(
        Arc::clone(&supervisor),
        spawn_stdin_reader(),
        shutdown_rx.clone(),
    ));
    let mut event_loop = tokio::spawn(run_event_loop(
        Arc::clone(&supervisor),
        streams,
        shutdown_rx,
    ));

    let finished = tokio::select! {
        joined = &mut event_loop => Some(joined),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                info!("interrupt received; shutting down");
                None
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for Ctrl+C");
                Some((&mut event_loop).await)
            }
        },
    };

    let _ = shutdown_tx.send(true);
    let loop_result = match finished {
        Some(joined) => joined,
        None => event_loop.await,
    };

    if let Err(err) = console.await {
        debug!(error = %err, "console task ended abnormally");
    }
    supervisor.shutdown().await;
    drop(monitor);
    if let Some(server) = reload_server {
        server.shutdown().await;
    }

    loop_result.context("event loop task failed")??;
    info!("hotloop stopped");
    Ok(())
}

/// Print the effective configuration without building or running anything.
fn print_dry_run(cfg: &SupervisorConfig) {
    println!("hotloop dry-run");
    println!("  watch.root       = {}", cfg.watch.root.display());
    println!("  watch.debounce   = {}", HumanDuration(cfg.watch.debounce));
    println!("  watch.extensions = {}", cfg.watch.extensions.join(", "));
    println!("  watch.exclude    = {}", cfg.watch.exclude.join(", "));
    let include: Vec<_> = cfg
        .watch
        .include
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    println!("  watch.include    = {}", include.join(", "));
    println!();

    let builder = BuildPipeline::new(cfg);
    if !cfg.build.scripts.is_empty() {
        println!("scripts ({}):", cfg.build.scripts.len());
        for script in &cfg.build.scripts {
            println!("  - {script}");
        }
    }
    println!("build: {}", builder.compile_argv().join(" "));
    for (key, value) in &cfg.build.env {
        println!("  env {key}={value}");
    }
    println!("artifact: {}", builder.artifact_path().display());

    if cfg.run.args.is_empty() {
        println!("run: (no arguments)");
    } else {
        println!("run: {}", cfg.run.args.join(" "));
    }
    println!("stop timeout: {}", HumanDuration(cfg.run.stop_timeout));

    if cfg.reload.enabled {
        println!("live reload: ws://{}{}", cfg.reload.address, cfg.reload.path);
    } else {
        println!("live reload: disabled");
    }

    debug!("dry-run complete (no execution)");
}

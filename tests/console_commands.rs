// tests/console_commands.rs
#![cfg(unix)]

mod common;
use crate::common::{
    FakeBuilder, SLEEPER, init_tracing, sleeper_config, supervisor_with, with_timeout,
};

use std::error::Error;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use hotloop::console::{CommandConsole, ConsoleReply, run_console};
use hotloop::engine::TriggerReason;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn rs_restarts_immediately() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "10s"), builder.clone());
    let console = CommandConsole::new(Arc::clone(&supervisor));

    match with_timeout(console.dispatch("rs")).await {
        ConsoleReply::Restarted(Ok(report)) => {
            assert_eq!(report.cycle, 1);
            assert_eq!(report.reason, TriggerReason::Manual);
        }
        other => panic!("expected a restart, got {other:?}"),
    }

    // Again right away: manual restarts ignore the debounce window.
    assert!(matches!(
        with_timeout(console.dispatch("rs")).await,
        ConsoleReply::Restarted(Ok(_))
    ));
    assert_eq!(builder.calls(), 2);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn stats_reports_a_snapshot() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), FakeBuilder::new(SLEEPER));
    let console = CommandConsole::new(Arc::clone(&supervisor));

    with_timeout(supervisor.trigger_cycle(TriggerReason::Initial)).await?;

    let ConsoleReply::Stats(snapshot) = console.dispatch("stats").await else {
        panic!("expected stats");
    };
    assert_eq!(snapshot.build_count, 1);
    assert!(snapshot.running);
    assert!(snapshot.last_build_duration.is_some());
    assert_eq!(snapshot.extensions, vec![".go", ".mod", ".sum"]);
    assert_eq!(snapshot.exclude, vec!["vendor", "node_modules", ".git"]);

    let rendered = snapshot.to_string();
    assert!(rendered.contains("Total builds:         1"));

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unknown_command_leaves_state_unchanged() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), builder.clone());
    let console = CommandConsole::new(Arc::clone(&supervisor));

    let before = supervisor.stats().await;
    match console.dispatch("foo").await {
        ConsoleReply::Unknown(cmd) => assert_eq!(cmd, "foo"),
        other => panic!("expected unknown, got {other:?}"),
    }
    assert!(matches!(console.dispatch("").await, ConsoleReply::Empty));

    let after = supervisor.stats().await;
    assert_eq!(after.build_count, before.build_count);
    assert_eq!(after.running, before.running);
    assert_eq!(builder.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn end_of_input_ends_console_but_not_supervisor() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), FakeBuilder::new(SLEEPER));

    let (line_tx, line_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let console = tokio::spawn(run_console(Arc::clone(&supervisor), line_rx, shutdown_rx));

    line_tx.send("rs".to_string()).await?;
    line_tx.send("bogus".to_string()).await?;
    line_tx.send("stats".to_string()).await?;
    drop(line_tx);

    with_timeout(console).await?;

    // The supervisor is still usable after the console is gone.
    assert_eq!(supervisor.stats().await.build_count, 1);
    with_timeout(supervisor.trigger_cycle(TriggerReason::Manual)).await?;
    assert_eq!(supervisor.stats().await.build_count, 2);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn shutdown_signal_ends_console() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), FakeBuilder::new(SLEEPER));

    let (_line_tx, line_rx) = mpsc::channel::<String>(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let console = tokio::spawn(run_console(Arc::clone(&supervisor), line_rx, shutdown_rx));

    shutdown_tx.send(true)?;
    with_timeout(console).await?;
    Ok(())
}

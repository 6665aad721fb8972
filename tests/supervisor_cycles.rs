// tests/supervisor_cycles.rs
#![cfg(unix)]

mod common;
use crate::common::{
    FakeBuilder, SLEEPER, SupervisorConfigBuilder, init_tracing, pid_alive, sleeper_config,
    supervisor_with, wait_until, with_timeout, write_event,
};

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use hotloop::engine::{Phase, TriggerReason};
use hotloop::errors::HotloopError;
use hotloop::types::{ChangeEvent, ChangeKind};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn build_counter_counts_failed_cycles_too() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), builder.clone());

    with_timeout(supervisor.trigger_cycle(TriggerReason::Initial)).await?;
    builder.fail_next_compile("main.go:1: expected 'package'");
    assert!(
        with_timeout(supervisor.trigger_cycle(TriggerReason::Manual))
            .await
            .is_err()
    );
    with_timeout(supervisor.trigger_cycle(TriggerReason::Manual)).await?;

    let stats = supervisor.stats().await;
    assert_eq!(stats.build_count, 3);
    assert_eq!(builder.calls(), 3);
    assert!(stats.running);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn failed_build_leaves_no_process_running() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), builder.clone());

    let first = with_timeout(supervisor.trigger_cycle(TriggerReason::Initial)).await?;
    let old_pid = first.pid.expect("child should have a pid");
    assert!(pid_alive(old_pid));

    builder.fail_next_compile("undefined: Foo");
    let err = with_timeout(supervisor.trigger_cycle(TriggerReason::Manual))
        .await
        .unwrap_err();
    assert!(matches!(err, HotloopError::CompileFailure { .. }));
    // Build output is reported verbatim.
    assert!(err.to_string().contains("undefined: Foo"));

    let stats = supervisor.stats().await;
    assert!(!stats.running);
    assert_eq!(stats.pid, None);
    assert_eq!(stats.phase, Phase::Idle);
    assert!(wait_until(Duration::from_secs(2), || async { !pid_alive(old_pid) }).await);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn failing_script_is_reported_and_supervisor_stays_live() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), builder.clone());

    builder.fail_next_script("go generate ./...", "generator exploded");
    let err = with_timeout(supervisor.trigger_cycle(TriggerReason::Initial))
        .await
        .unwrap_err();
    assert!(matches!(err, HotloopError::ScriptFailure { ref script, .. } if script == "go generate ./..."));

    // The next trigger works normally.
    let report = with_timeout(supervisor.trigger_cycle(TriggerReason::Manual)).await?;
    assert_eq!(report.cycle, 2);
    assert!(supervisor.stats().await.running);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn change_events_inside_the_window_are_dropped() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "10s"), builder.clone());

    let first = with_timeout(supervisor.handle_change(&write_event("cmd/main.go"))).await;
    assert!(matches!(first, Some(Ok(_))));

    assert!(supervisor.handle_change(&write_event("cmd/main.go")).await.is_none());
    assert!(supervisor.handle_change(&write_event("go.mod")).await.is_none());
    assert_eq!(builder.calls(), 1);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn irrelevant_events_never_trigger() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "0ms"), builder.clone());

    let ignored = [
        write_event("README.md"),
        write_event("Makefile"),
        ChangeEvent::new(PathBuf::from("main.go"), ChangeKind::Metadata),
        ChangeEvent::new(PathBuf::from("main.go"), ChangeKind::Access),
    ];
    for event in &ignored {
        assert!(supervisor.handle_change(event).await.is_none(), "{event:?}");
    }
    assert_eq!(builder.calls(), 0);
    assert_eq!(supervisor.stats().await.build_count, 0);
    Ok(())
}

#[tokio::test]
async fn manual_restart_bypasses_debounce() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "10s"), builder.clone());

    let accepted = with_timeout(supervisor.handle_change(&write_event("main.go"))).await;
    assert!(matches!(accepted, Some(Ok(_))));

    let manual = with_timeout(supervisor.trigger_cycle(TriggerReason::Manual)).await?;
    assert_eq!(manual.cycle, 2);
    assert_eq!(manual.reason, TriggerReason::Manual);

    // The manual cycle did not reopen the window either.
    assert!(supervisor.handle_change(&write_event("main.go")).await.is_none());
    assert_eq!(builder.calls(), 2);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn new_cycle_stops_the_previous_process_first() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), FakeBuilder::new(SLEEPER));

    let first = with_timeout(supervisor.trigger_cycle(TriggerReason::Initial)).await?;
    assert!(first.replaced.is_none());
    let first_pid = first.pid.expect("pid");

    let second = with_timeout(supervisor.trigger_cycle(TriggerReason::Manual)).await?;
    let status = second.replaced.expect("previous process should have been stopped");
    assert!(!status.success());
    assert_ne!(second.pid, Some(first_pid));
    assert!(!pid_alive(first_pid));

    let stats = supervisor.stats().await;
    assert_eq!(stats.pid, second.pid);
    assert_eq!(stats.phase, Phase::Running);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn concurrent_triggers_are_serialized() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER).with_delay(Duration::from_millis(50));
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), builder.clone());

    let (a, b, c, d) = with_timeout(async {
        tokio::join!(
            supervisor.trigger_cycle(TriggerReason::Manual),
            supervisor.trigger_cycle(TriggerReason::Manual),
            supervisor.trigger_cycle(TriggerReason::Manual),
            supervisor.trigger_cycle(TriggerReason::Manual),
        )
    })
    .await;

    let mut cycles = vec![a?.cycle, b?.cycle, c?.cycle, d?.cycle];
    cycles.sort_unstable();
    assert_eq!(cycles, vec![1, 2, 3, 4]);
    assert_eq!(builder.max_concurrent(), 1);
    assert_eq!(supervisor.stats().await.build_count, 4);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn reaper_marks_process_not_running_on_natural_exit() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let config = SupervisorConfigBuilder::new(dir.path())
        .run_args(&["-c", "sleep 0.2"])
        .build();
    let supervisor = supervisor_with(config, FakeBuilder::new("/bin/sh"));

    let report = with_timeout(supervisor.trigger_cycle(TriggerReason::Initial)).await?;
    assert!(report.pid.is_some());

    let exited = wait_until(Duration::from_secs(5), || async {
        !supervisor.stats().await.running
    })
    .await;
    assert!(exited, "supervisor never noticed the exit");

    let stats = supervisor.stats().await;
    assert_eq!(stats.pid, None);
    assert_eq!(stats.phase, Phase::Idle);
    assert_eq!(stats.build_count, 1);

    // A later cycle has nothing to stop.
    let next = with_timeout(supervisor.trigger_cycle(TriggerReason::Manual)).await?;
    assert!(next.replaced.is_none());

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn listeners_receive_one_signal_per_successful_build() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let builder = FakeBuilder::new(SLEEPER);
    let supervisor = supervisor_with(sleeper_config(dir.path(), "1s"), builder.clone());

    let (_a, mut rx_a) = supervisor.hub().register();
    let (_b, mut rx_b) = supervisor.hub().register();

    let report = with_timeout(supervisor.trigger_cycle(TriggerReason::Initial)).await?;
    assert_eq!(report.listeners_notified, 2);
    assert_eq!(rx_a.try_recv()?.cycle, 1);
    assert_eq!(rx_b.try_recv()?.cycle, 1);
    assert!(rx_a.try_recv().is_err());

    builder.fail_next_compile("boom");
    assert!(supervisor.trigger_cycle(TriggerReason::Manual).await.is_err());
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn artifact_that_cannot_start_is_a_cycle_error() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let supervisor = supervisor_with(
        sleeper_config(dir.path(), "1s"),
        FakeBuilder::new(dir.path().join("bin/missing")),
    );

    let err = with_timeout(supervisor.trigger_cycle(TriggerReason::Initial))
        .await
        .unwrap_err();
    assert!(matches!(err, HotloopError::ProcessStart { .. }));

    let stats = supervisor.stats().await;
    assert!(!stats.running);
    assert_eq!(stats.phase, Phase::Idle);
    assert_eq!(stats.build_count, 1);
    assert!(stats.last_build_duration.is_some());
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_the_child_and_refuses_new_cycles() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let supervisor = supervisor_with(sleeper_config(dir.path(), "0ms"), FakeBuilder::new(SLEEPER));

    let report = with_timeout(supervisor.trigger_cycle(TriggerReason::Initial)).await?;
    let pid = report.pid.expect("pid");

    with_timeout(supervisor.shutdown()).await;
    assert!(!pid_alive(pid));
    assert!(!supervisor.stats().await.running);

    assert!(supervisor.trigger_cycle(TriggerReason::Manual).await.is_err());
    assert!(supervisor.handle_change(&write_event("main.go")).await.is_none());

    // Second shutdown is a no-op.
    with_timeout(supervisor.shutdown()).await;
    Ok(())
}

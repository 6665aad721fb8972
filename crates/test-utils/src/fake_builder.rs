use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hotloop::exec::{BuildOutcome, BuildResult, Builder};

/// A fake build backend that:
/// - counts how often it was asked to build
/// - returns queued outcomes first, then succeeds with `artifact`
/// - optionally sleeps to simulate a slow compiler
/// - records the highest number of builds observed in flight at once
///
/// Point `artifact` at an existing program (e.g. `/bin/sleep`) so the
/// supervisor has something real to launch.
#[derive(Clone)]
pub struct FakeBuilder {
    artifact: PathBuf,
    delay: Duration,
    queued: Arc<Mutex<VecDeque<BuildOutcome>>>,
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl FakeBuilder {
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            delay: Duration::ZERO,
            queued: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The next build will fail at the compile step with `output`.
    pub fn fail_next_compile(&self, output: &str) {
        self.queued
            .lock()
            .unwrap()
            .push_back(BuildOutcome::CompileFailed {
                code: Some(2),
                output: output.to_string(),
            });
    }

    /// The next build will fail in the pre-build script `script`.
    pub fn fail_next_script(&self, script: &str, output: &str) {
        self.queued
            .lock()
            .unwrap()
            .push_back(BuildOutcome::ScriptFailed {
                script: script.to_string(),
                code: Some(1),
                output: output.to_string(),
            });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently running `build()` calls seen.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Builder for FakeBuilder {
    fn build(&self) -> Pin<Box<dyn Future<Output = BuildResult> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let queued = self.queued.lock().unwrap().pop_front();
            let outcome = queued.unwrap_or_else(|| BuildOutcome::Success {
                artifact: self.artifact.clone(),
            });

            self.active.fetch_sub(1, Ordering::SeqCst);
            BuildResult {
                outcome,
                elapsed: self.delay.max(Duration::from_millis(1)),
            }
        })
    }
}

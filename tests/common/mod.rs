#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotloop::config::SupervisorConfig;
use hotloop::engine::Supervisor;
use hotloop::reload::ReloadHub;
use hotloop::types::{ChangeEvent, ChangeKind};

pub use hotloop_test_utils::builders::SupervisorConfigBuilder;
pub use hotloop_test_utils::fake_builder::FakeBuilder;
pub use hotloop_test_utils::{init_tracing, wait_until, with_timeout};

/// A long-running program every unix box has.
pub const SLEEPER: &str = "/bin/sleep";

pub fn manifest_path(rel: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(rel)
}

/// Config whose artifact runs `sleep 30` under the given root.
pub fn sleeper_config(root: &Path, debounce: &str) -> SupervisorConfig {
    SupervisorConfigBuilder::new(root)
        .debounce(debounce)
        .run_args(&["30"])
        .build()
}

pub fn supervisor_with(
    config: SupervisorConfig,
    builder: FakeBuilder,
) -> Arc<Supervisor<FakeBuilder>> {
    Arc::new(Supervisor::new(config, builder, ReloadHub::new()))
}

pub fn write_event(path: &str) -> ChangeEvent {
    ChangeEvent::new(PathBuf::from(path), ChangeKind::Write)
}

/// True while a process with `pid` exists (zombies included).
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

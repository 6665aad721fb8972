// src/watch/monitor.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::WatchConfig;
use crate::errors::{HotloopError, Result};
use crate::fs::FileSystem;
use crate::types::{ChangeEvent, ChangeKind};
use crate::watch::path_utils::is_excluded;

/// Handle for the filesystem monitor.
///
/// Owns the underlying `RecommendedWatcher`; dropping this handle removes
/// every watch and closes both event channels.
pub struct MonitorHandle {
    _inner: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl MonitorHandle {
    /// Directories registered at startup, in walk order.
    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched
    }
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("watched", &self.watched.len())
            .finish()
    }
}

/// Receiving ends of the monitor: change events and watch errors.
pub struct MonitorStreams {
    pub changes: mpsc::UnboundedReceiver<ChangeEvent>,
    pub errors: mpsc::UnboundedReceiver<notify::Error>,
}

/// Walk `include` directories under `root` once and return every directory
/// that should be watched.
///
/// A directory whose path below `root` contains an excluded fragment is
/// skipped together with everything beneath it. The components of `root`
/// itself are never matched. Files are never returned.
pub fn collect_watch_dirs(
    fs: &dyn FileSystem,
    root: &Path,
    include: &[PathBuf],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();

    for dir in include {
        let start = if dir.as_os_str() == "." {
            root.to_path_buf()
        } else {
            root.join(dir)
        };

        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            let relative = current.strip_prefix(root).unwrap_or(&current);
            if is_excluded(relative, exclude) {
                debug!(dir = ?current, "skipping excluded directory");
                continue;
            }
            if out.contains(&current) {
                continue;
            }

            let children = fs.read_dir(&current)?;
            out.push(current);

            // Reverse so the stack pops children in sorted order.
            for child in children.into_iter().rev() {
                if fs.is_dir(&child) {
                    stack.push(child);
                }
            }
        }
    }

    Ok(out)
}

/// Map a raw `notify` event onto zero or more [`ChangeEvent`]s.
pub fn change_events_from(event: Event) -> Vec<ChangeEvent> {
    match event.kind {
        // Rename with both halves: first path went away, second appeared.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let kind = if i == 0 {
                    ChangeKind::Remove
                } else {
                    ChangeKind::Create
                };
                ChangeEvent::new(path, kind)
            })
            .collect(),
        kind => {
            let kind = classify(kind);
            event
                .paths
                .into_iter()
                .map(|path| ChangeEvent::new(path, kind))
                .collect()
        }
    }
}

fn classify(kind: EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Create,
        EventKind::Remove(_) => ChangeKind::Remove,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Metadata,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Remove,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Create,
        EventKind::Modify(_) => ChangeKind::Write,
        EventKind::Access(_) => ChangeKind::Access,
        EventKind::Any | EventKind::Other => ChangeKind::Other,
    }
}

/// Start the filesystem monitor.
///
/// Walks the tree once (see [`collect_watch_dirs`]) and registers a
/// non-recursive watch on every directory found. Directories created later are
/// **not** picked up.
///
/// Any failure here is a [`HotloopError::WatchInit`]: the supervisor cannot run
/// without its monitor.
pub fn spawn_monitor(
    config: &WatchConfig,
    fs: Arc<dyn FileSystem>,
) -> Result<(MonitorHandle, MonitorStreams)> {
    let root = config.root.clone();

    let dirs = collect_watch_dirs(fs.as_ref(), &root, &config.include, &config.exclude)
        .map_err(|e| HotloopError::WatchInit {
            path: root.clone(),
            reason: format!("{e:#}"),
        })?;
    if dirs.is_empty() {
        return Err(HotloopError::WatchInit {
            path: root,
            reason: "no directories left to watch after exclusions".to_string(),
        });
    }

    // Channels from the blocking notify callback into the async world.
    let (change_tx, change_rx) = mpsc::unbounded_channel::<ChangeEvent>();
    let (error_tx, error_rx) = mpsc::unbounded_channel::<notify::Error>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in change_events_from(event) {
                    if change_tx.send(change).is_err() {
                        // Receiver gone: the supervisor is shutting down.
                        return;
                    }
                }
            }
            Err(err) => {
                if let Err(err) = error_tx.send(err) {
                    eprintln!("hotloop: file watch error after shutdown: {}", err.0);
                }
            }
        },
        Config::default(),
    )
    .map_err(|e| HotloopError::WatchInit {
        path: root.clone(),
        reason: e.to_string(),
    })?;

    for dir in &dirs {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| HotloopError::WatchInit {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
    }

    info!(root = ?root, dirs = dirs.len(), "file monitor started");

    Ok((
        MonitorHandle {
            _inner: watcher,
            watched: dirs,
        },
        MonitorStreams {
            changes: change_rx,
            errors: error_rx,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};

    fn tree() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("./main.go");
        fs.add_file("./internal/api/handler.go");
        fs.add_file("./vendor/github.com/x/y.go");
        fs.add_file("./.git/HEAD");
        fs.add_dir("./cmd/server");
        fs
    }

    #[test]
    fn walk_skips_excluded_subtrees() {
        let fs = tree();
        let dirs = collect_watch_dirs(
            &fs,
            Path::new("."),
            &[PathBuf::from(".")],
            &["vendor".to_string(), ".git".to_string()],
        )
        .unwrap();

        let dirs: Vec<String> = dirs.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(
            dirs,
            vec![".", "./cmd", "./cmd/server", "./internal", "./internal/api"]
        );
    }

    #[test]
    fn walk_respects_include_dirs() {
        let fs = tree();
        let dirs = collect_watch_dirs(&fs, Path::new("."), &[PathBuf::from("internal")], &[])
            .unwrap();
        assert_eq!(
            dirs,
            vec![PathBuf::from("./internal"), PathBuf::from("./internal/api")]
        );
    }

    #[test]
    fn walk_fails_on_missing_include_dir() {
        let fs = tree();
        assert!(collect_watch_dirs(&fs, Path::new("."), &[PathBuf::from("nope")], &[]).is_err());
    }

    #[test]
    fn exclusions_ignore_components_above_the_root() {
        let fs = MockFileSystem::new();
        fs.add_file("./vendor-tools/proj/cmd/main.go");
        fs.add_file("./vendor-tools/proj/vendor/lib.go");

        let dirs = collect_watch_dirs(
            &fs,
            Path::new("./vendor-tools/proj"),
            &[PathBuf::from(".")],
            &["vendor".to_string()],
        )
        .unwrap();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("./vendor-tools/proj"),
                PathBuf::from("./vendor-tools/proj/cmd"),
            ]
        );
    }

    #[test]
    fn fully_excluded_include_list_is_a_watch_init_error() {
        let fs = tree();
        let config = WatchConfig {
            root: PathBuf::from("."),
            debounce: std::time::Duration::from_millis(500),
            extensions: vec![".go".to_string()],
            exclude: vec!["vendor".to_string()],
            include: vec![PathBuf::from("vendor")],
        };
        match spawn_monitor(&config, Arc::new(fs)) {
            Err(HotloopError::WatchInit { reason, .. }) => {
                assert!(reason.contains("no directories"));
            }
            Err(other) => panic!("expected WatchInit, got {other:?}"),
            Ok(_) => panic!("monitor should not start with nothing to watch"),
        }
    }

    #[test]
    fn notify_kinds_map_to_change_kinds() {
        let write = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("a.go"));
        assert_eq!(change_events_from(write)[0].kind, ChangeKind::Write);

        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("a.go"));
        assert_eq!(change_events_from(create)[0].kind, ChangeKind::Create);

        let chmod = Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)))
            .add_path(PathBuf::from("a.go"));
        assert_eq!(change_events_from(chmod)[0].kind, ChangeKind::Metadata);

        let read = Event::new(EventKind::Access(AccessKind::Read)).add_path(PathBuf::from("a.go"));
        assert_eq!(change_events_from(read)[0].kind, ChangeKind::Access);
    }

    #[test]
    fn rename_both_splits_into_remove_and_create() {
        let ev = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("old.go"))
            .add_path(PathBuf::from("new.go"));
        let out = change_events_from(ev);
        assert_eq!(
            out,
            vec![
                ChangeEvent::new("old.go", ChangeKind::Remove),
                ChangeEvent::new("new.go", ChangeKind::Create),
            ]
        );
    }
}

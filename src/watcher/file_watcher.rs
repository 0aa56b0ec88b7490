//! Polling file watcher
//!
//! Each call to `check_for_changes` rescans the watched tree and diffs file
//! modification times against the previous snapshot.

use crate::error::{AssetError, Result};
use crate::utils::system_time_to_nanos;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileEventKind {
    Added,
    Modified,
    Removed,
}

/// One detected change
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WatcherState {
    #[default]
    Idle,
    Watching,
}

/// Recursive polling watcher over one directory
#[derive(Debug, Default)]
pub struct FileWatcher {
    root: PathBuf,
    state: WatcherState,
    filter: Option<String>,
    snapshot: FxHashMap<PathBuf, u64>,
}

impl FileWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only report files with this extension (`"png"` or `".png"`); empty clears
    pub fn set_file_filter(&mut self, filter: impl Into<String>) {
        let filter = filter.into();
        self.filter = match filter.trim() {
            "" => None,
            f if f.starts_with('.') => Some(f.to_ascii_lowercase()),
            f => Some(format!(".{}", f.to_ascii_lowercase())),
        };
    }

    pub fn file_filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn is_watching(&self) -> bool {
        self.state == WatcherState::Watching
    }

    pub fn watch_path(&self) -> &Path {
        &self.root
    }

    /// Files in the current snapshot
    pub fn tracked_files(&self) -> usize {
        self.snapshot.len()
    }

    /// Start watching `directory`; the initial scan reports no events
    pub fn start(&mut self, directory: impl Into<PathBuf>) -> Result<()> {
        if self.is_watching() {
            tracing::warn!(path = %self.root.display(), "file watcher is already watching, stop it first");
            return Ok(());
        }

        let directory = directory.into();
        if !directory.is_dir() {
            tracing::error!(path = %directory.display(), "cannot watch a missing directory");
            return Err(AssetError::IoError(format!(
                "not a directory: {}",
                directory.display()
            )));
        }

        self.root = directory;
        self.snapshot.clear();
        self.state = WatcherState::Watching;
        if let Some(scan) = self.scan() {
            self.snapshot = scan.files;
        }

        tracing::info!(
            path = %self.root.display(),
            files = self.snapshot.len(),
            "file watcher started"
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.is_watching() {
            return;
        }
        self.state = WatcherState::Idle;
        self.snapshot.clear();
        tracing::info!(path = %self.root.display(), "file watcher stopped");
    }

    fn passes_filter(&self, path: &Path) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| filter[1..].eq_ignore_ascii_case(ext))
    }

    fn scan(&self) -> Option<Scan> {
        let mut scan = Scan::default();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if e.depth() == 0 {
                        tracing::debug!(error = %e, "watch root unreadable, skipping scan");
                        return None;
                    }
                    if let Some(path) = e.path() {
                        scan.unreadable.push(path.to_path_buf());
                    }
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.passes_filter(entry.path()) {
                continue;
            }

            match entry.metadata().ok().and_then(|meta| meta.modified().ok()) {
                Some(modified) => {
                    scan.files
                        .insert(entry.into_path(), system_time_to_nanos(modified));
                }
                None => scan.unreadable.push(entry.into_path()),
            }
        }

        Some(scan)
    }

    /// Rescan and report what changed since the last call.
    ///
    /// No-op while idle. Parts of the tree that cannot be read keep their
    /// previous state and are retried on the next call.
    pub fn check_for_changes(&mut self) -> Vec<FileEvent> {
        if !self.is_watching() {
            return Vec::new();
        }

        let Some(mut scan) = self.scan() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for (path, modified) in &scan.files {
            match self.snapshot.get(path) {
                None => events.push(FileEvent {
                    path: path.clone(),
                    kind: FileEventKind::Added,
                }),
                Some(previous) if previous != modified => events.push(FileEvent {
                    path: path.clone(),
                    kind: FileEventKind::Modified,
                }),
                Some(_) => {}
            }
        }

        for (path, modified) in &self.snapshot {
            if scan.files.contains_key(path) {
                continue;
            }
            if scan.is_unreadable(path) {
                scan.files.insert(path.clone(), *modified);
            } else {
                events.push(FileEvent {
                    path: path.clone(),
                    kind: FileEventKind::Removed,
                });
            }
        }

        events.sort_by(|a, b| a.path.cmp(&b.path));
        self.snapshot = scan.files;
        events
    }
}

#[derive(Default)]
struct Scan {
    files: FxHashMap<PathBuf, u64>,
    unreadable: Vec<PathBuf>,
}

impl Scan {
    fn is_unreadable(&self, path: &Path) -> bool {
        self.unreadable.iter().any(|prefix| path.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn touch(path: &Path, offset_secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
            .unwrap();
    }

    #[test]
    fn test_idle_is_noop() {
        let mut watcher = FileWatcher::new();
        assert_eq!(watcher.state(), WatcherState::Idle);
        assert!(watcher.check_for_changes().is_empty());
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = FileWatcher::new();
        assert!(watcher.start(dir.path().join("nope")).is_err());
        assert!(!watcher.is_watching());
    }

    #[test]
    fn test_detects_add_modify_remove() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("textures")).unwrap();
        let existing = dir.path().join("textures/a.png");
        std::fs::write(&existing, b"a").unwrap();

        let mut watcher = FileWatcher::new();
        watcher.start(dir.path()).unwrap();
        assert_eq!(watcher.tracked_files(), 1);
        assert!(watcher.check_for_changes().is_empty());

        let added = dir.path().join("textures/b.png");
        std::fs::write(&added, b"b").unwrap();
        touch(&existing, 30);

        let events = watcher.check_for_changes();
        assert_eq!(
            events,
            vec![
                FileEvent { path: existing.clone(), kind: FileEventKind::Modified },
                FileEvent { path: added.clone(), kind: FileEventKind::Added },
            ]
        );

        std::fs::remove_file(&added).unwrap();
        assert_eq!(
            watcher.check_for_changes(),
            vec![FileEvent { path: added, kind: FileEventKind::Removed }]
        );
        assert!(watcher.check_for_changes().is_empty());
    }

    #[test]
    fn test_filter_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = FileWatcher::new();
        watcher.set_file_filter("PNG");
        assert_eq!(watcher.file_filter(), Some(".png"));
        watcher.start(dir.path()).unwrap();

        std::fs::write(dir.path().join("keep.png"), b"").unwrap();
        std::fs::write(dir.path().join("skip.lua"), b"").unwrap();
        let events = watcher.check_for_changes();
        assert_eq!(events.len(), 1);
        assert!(events[0].path.ends_with("keep.png"));

        watcher.set_file_filter("");
        assert_eq!(watcher.file_filter(), None);
    }

    #[test]
    fn test_stop_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = FileWatcher::new();
        watcher.start(dir.path()).unwrap();
        watcher.stop();
        std::fs::write(dir.path().join("late.png"), b"").unwrap();
        assert!(watcher.check_for_changes().is_empty());
        assert_eq!(watcher.tracked_files(), 0);
    }
}

//! Asset-aware change feed on top of [`FileWatcher`]
//!
//! Filters out non-asset files, classifies the rest and collapses repeated
//! events for one path until the pending changes are drained.

use crate::assets::AssetType;
use crate::error::Result;
use crate::watcher::file_watcher::{FileEventKind, FileWatcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetWatchEvent {
    Added,
    Modified,
    Removed,
}

impl From<FileEventKind> for AssetWatchEvent {
    fn from(kind: FileEventKind) -> Self {
        match kind {
            FileEventKind::Added => AssetWatchEvent::Added,
            FileEventKind::Modified => AssetWatchEvent::Modified,
            FileEventKind::Removed => AssetWatchEvent::Removed,
        }
    }
}

/// A classified change to an asset file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetChangeInfo {
    pub file_path: PathBuf,
    pub event: AssetWatchEvent,
    pub asset_type: AssetType,
}

pub type ChangeCallback = Box<dyn FnMut(&AssetChangeInfo) + Send>;

#[derive(Default)]
struct Debounce {
    recent: FxHashSet<PathBuf>,
    pending: Vec<AssetChangeInfo>,
}

/// Thread-safe asset change watcher
#[derive(Default)]
pub struct AssetFileWatcher {
    watcher: Mutex<FileWatcher>,
    debounce: Mutex<Debounce>,
    callback: Mutex<Option<ChangeCallback>>,
}

impl AssetFileWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// True for recognized asset files that are not hidden or editor temp files
    pub fn is_asset_file(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.is_empty() || name.starts_with('.') || name.contains('~') {
            return false;
        }
        !AssetType::from_path(path).is_none()
    }

    /// Restrict the underlying poll to one extension
    pub fn set_file_filter(&self, filter: impl Into<String>) {
        self.watcher.lock().set_file_filter(filter);
    }

    pub fn start(&self, directory: impl Into<PathBuf>) -> Result<()> {
        self.watcher.lock().start(directory)
    }

    /// Stop watching and forget pending changes
    pub fn stop(&self) {
        self.watcher.lock().stop();
        let mut debounce = self.debounce.lock();
        debounce.pending.clear();
        debounce.recent.clear();
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_watching()
    }

    pub fn watch_path(&self) -> PathBuf {
        self.watcher.lock().watch_path().to_path_buf()
    }

    pub fn set_change_callback(&self, callback: impl FnMut(&AssetChangeInfo) + Send + 'static) {
        *self.callback.lock() = Some(Box::new(callback));
    }

    /// Poll the file system once and queue asset changes
    pub fn check_for_changes(&self) -> usize {
        let events = self.watcher.lock().check_for_changes();
        events
            .into_iter()
            .filter(|event| self.on_file_changed(&event.path, event.kind))
            .count()
    }

    /// Queue one raw change; returns whether it was accepted
    pub(crate) fn on_file_changed(&self, path: &Path, kind: FileEventKind) -> bool {
        if !Self::is_asset_file(path) {
            return false;
        }

        let change = AssetChangeInfo {
            file_path: path.to_path_buf(),
            event: kind.into(),
            asset_type: AssetType::from_path(path),
        };

        {
            let mut debounce = self.debounce.lock();
            if !debounce.recent.insert(change.file_path.clone()) {
                tracing::trace!(path = %path.display(), "debounced asset change");
                return false;
            }
            debounce.pending.push(change.clone());
        }

        tracing::info!(
            event = ?change.event,
            asset_type = %change.asset_type,
            path = %path.display(),
            "asset file changed"
        );
        true
    }

    pub fn pending_count(&self) -> usize {
        self.debounce.lock().pending.len()
    }

    /// Take every pending change and reset the debounce window
    pub fn drain_changes(&self) -> Vec<AssetChangeInfo> {
        let mut debounce = self.debounce.lock();
        debounce.recent.clear();
        std::mem::take(&mut debounce.pending)
    }

    /// Hand pending changes to the registered callback.
    ///
    /// Without a callback the changes stay queued. The callback runs with no
    /// lock held, so it may call back into the watcher.
    pub fn process_changes(&self) -> usize {
        let Some(mut callback) = self.callback.lock().take() else {
            return 0;
        };

        let changes = self.drain_changes();
        for change in &changes {
            callback(change);
        }

        // Keep a replacement installed from inside the callback
        let mut slot = self.callback.lock();
        if slot.is_none() {
            *slot = Some(callback);
        }
        changes.len()
    }
}

impl Drop for AssetFileWatcher {
    fn drop(&mut self) {
        self.watcher.get_mut().stop();
    }
}

impl std::fmt::Debug for AssetFileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetFileWatcher")
            .field("watching", &self.is_watching())
            .field("pending", &self.pending_count())
            .finish()
    }
}

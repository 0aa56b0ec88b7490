// File Watching Module
//
// - Portable polling watcher with extension filter
// - Asset classification and per-drain debouncing

pub mod asset_watcher;
pub mod file_watcher;

pub use asset_watcher::{AssetChangeInfo, AssetFileWatcher, AssetWatchEvent, ChangeCallback};
pub use file_watcher::{FileEvent, FileEventKind, FileWatcher, WatcherState};

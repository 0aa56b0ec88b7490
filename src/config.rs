//! Pipeline configuration
//!
//! Loaded from a JSON document, every field optional:
//!
//! ```json
//! {
//!     "content_root": "assets",
//!     "cache_dir": ".cache",
//!     "registry_file": "AssetRegistry.json",
//!     "worker_threads": 4,
//!     "watch_filter": null,
//!     "artifact_identity": "slangc-2024.1"
//! }
//! ```

use crate::error::{AssetError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings shared by the registry, loader, watcher and artifact caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory all asset paths are relative to
    pub content_root: PathBuf,
    /// Artifact cache directory (relative values resolve under `content_root`)
    pub cache_dir: PathBuf,
    /// Registry document (relative to `content_root`); `None` disables persistence
    pub registry_file: Option<PathBuf>,
    /// Worker threads for the rayon scheduler, 0 = rayon default
    pub worker_threads: usize,
    /// Extension filter for the raw file watcher
    pub watch_filter: Option<String>,
    /// Build toolchain identity stored in artifact records
    pub artifact_identity: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("assets"),
            cache_dir: PathBuf::from(".cache"),
            registry_file: Some(PathBuf::from("AssetRegistry.json")),
            worker_threads: 0,
            watch_filter: None,
            artifact_identity: concat!("archetype_assets-", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PipelineConfig {
    /// Default configuration rooted at `content_root`
    pub fn with_content_root(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            ..Self::default()
        }
    }

    /// Parse configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AssetError::ConfigError(e.to_string()))
    }

    /// Read configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AssetError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Write configuration as pretty JSON
    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AssetError::SerializationError(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Absolute location of the artifact cache
    pub fn cache_path(&self) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            self.content_root.join(&self.cache_dir)
        }
    }

    /// Absolute location of the registry document, if persistence is enabled
    pub fn registry_path(&self) -> Option<PathBuf> {
        self.registry_file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                self.content_root.join(file)
            }
        })
    }

    /// Extension filter normalized to start with a dot
    pub fn normalized_watch_filter(&self) -> Option<String> {
        self.watch_filter
            .as_deref()
            .filter(|f| !f.is_empty())
            .map(|f| {
                if f.starts_with('.') {
                    f.to_string()
                } else {
                    format!(".{f}")
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json_str(r#"{ "content_root": "game/content" }"#)
            .expect("valid config");
        assert_eq!(config.content_root, PathBuf::from("game/content"));
        assert_eq!(config.cache_path(), PathBuf::from("game/content/.cache"));
        assert_eq!(
            config.registry_path(),
            Some(PathBuf::from("game/content/AssetRegistry.json"))
        );
        assert_eq!(config.worker_threads, 0);
    }

    #[test]
    fn test_registry_disabled() {
        let config = PipelineConfig::from_json_str(r#"{ "registry_file": null }"#).unwrap();
        assert_eq!(config.registry_path(), None);
    }

    #[test]
    fn test_watch_filter_normalized() {
        let mut config = PipelineConfig::default();
        config.watch_filter = Some("png".to_string());
        assert_eq!(config.normalized_watch_filter().as_deref(), Some(".png"));
        config.watch_filter = Some(".slang".to_string());
        assert_eq!(config.normalized_watch_filter().as_deref(), Some(".slang"));
        config.watch_filter = Some(String::new());
        assert_eq!(config.normalized_watch_filter(), None);
    }

    #[test]
    fn test_invalid_json() {
        let err = PipelineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, AssetError::ConfigError(_)));
    }
}

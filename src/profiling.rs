//! # Tracing bootstrap
//!
//! Every subsystem logs through `tracing`; nothing is printed until the
//! application installs a subscriber. With the `profiling` feature enabled:
//!
//! ```toml
//! [dependencies]
//! archetype_assets = { version = "0.3", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! use archetype_assets::profiling::{init_tracing, LogConfig};
//!
//! let _guard = init_tracing(&LogConfig {
//!     level: "debug".into(),
//!     json: true,
//!     file: Some("logs/assets.json".into()),
//!     ansi: false,
//! })?;
//! ```
//!
//! Keep the returned guard alive for the lifetime of the program; dropping it
//! flushes and stops the background writer.
//!
//! Each tick runs inside an `asset_tick` span, so per-frame timing shows up
//! in any span-aware subscriber.

use crate::error::{AssetError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    /// One JSON object per line instead of plain text
    pub json: bool,
    /// Log file; stdout when unset
    pub file: Option<PathBuf>,
    /// Colored output (stdout only)
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn max_level(&self) -> Result<Level> {
        self.level
            .parse::<Level>()
            .map_err(|e| AssetError::ConfigError(format!("invalid log level {:?}: {e}", self.level)))
    }
}

/// Install the global subscriber described by `config`
pub fn init_tracing(config: &LogConfig) -> Result<WorkerGuard> {
    let level = config.max_level()?;

    let (writer, guard) = match &config.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| AssetError::ConfigError(format!("log file has no name: {}", path.display())))?;
            std::fs::create_dir_all(directory)?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let builder = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_max_level(level)
        .with_ansi(config.ansi && config.file.is_none());

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| AssetError::ConfigError(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogConfig::default().max_level().unwrap(), Level::INFO);
        let config = LogConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(matches!(config.max_level(), Err(AssetError::ConfigError(_))));
    }

    #[test]
    fn test_config_from_json() {
        let config: LogConfig = serde_json::from_str(r#"{ "level": "debug", "json": true }"#).unwrap();
        assert_eq!(config.level, "debug");
        assert!(config.json);
        assert!(config.ansi);
    }
}

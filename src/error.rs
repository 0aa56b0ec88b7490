// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use crate::assets::{AssetHandle, AssetType};
use std::fmt;
use std::path::PathBuf;

/// Asset pipeline error type
#[derive(Debug, Clone)]
pub enum AssetError {
    /// IO error (file operations, directory walks, etc.)
    IoError(String),

    /// Serialization error (registry document, binary records)
    SerializationError(String),

    /// Deserialization error (registry document, descriptors, binary records)
    DeserializationError(String),

    /// Binary file does not start with the expected magic tag
    InvalidMagic,

    /// Binary file was written with another format version
    VersionMismatch { expected: u32, found: u32 },

    /// Binary data ended before a field could be read
    UnexpectedEof { offset: usize, needed: usize },

    /// Handle has no registry entry
    InvalidHandle(AssetHandle),

    /// No importer registered for the asset type
    NoImporter(AssetType),

    /// Importer could not produce data for a source file
    ImportFailed { path: PathBuf, reason: String },

    /// Path does not live under the content root
    OutsideContentRoot(PathBuf),

    /// External build step (shader compiler, ...) failed
    CompileFailed(String),

    /// Configuration could not be read or is invalid
    ConfigError(String),

    /// Task scheduler could not be created or rejected a task
    SchedulerError(String),

    /// Worker thread panicked while loading an asset
    WorkerPanic(String),
}

impl AssetError {
    /// Shorthand for an import failure on `path`
    pub fn import_failed(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        AssetError::ImportFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::IoError(msg) => write!(f, "IO error: {msg}"),
            AssetError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            AssetError::DeserializationError(msg) => write!(f, "Deserialization error: {msg}"),
            AssetError::InvalidMagic => write!(f, "Invalid binary magic header"),
            AssetError::VersionMismatch { expected, found } => {
                write!(f, "Binary version mismatch: expected {expected}, found {found}")
            }
            AssetError::UnexpectedEof { offset, needed } => {
                write!(f, "Unexpected end of binary data at offset {offset} (needed {needed} bytes)")
            }
            AssetError::InvalidHandle(handle) => write!(f, "Invalid asset handle: {handle}"),
            AssetError::NoImporter(asset_type) => {
                write!(f, "No importer found for asset type: {asset_type}")
            }
            AssetError::ImportFailed { path, reason } => {
                write!(f, "Failed to import {}: {reason}", path.display())
            }
            AssetError::OutsideContentRoot(path) => {
                write!(f, "Path is outside the content root: {}", path.display())
            }
            AssetError::CompileFailed(msg) => write!(f, "Compile failed: {msg}"),
            AssetError::ConfigError(msg) => write!(f, "Config error: {msg}"),
            AssetError::SchedulerError(msg) => write!(f, "Scheduler error: {msg}"),
            AssetError::WorkerPanic(msg) => write!(f, "Worker panicked: {msg}"),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::IoError(err.to_string())
    }
}

impl From<speedy::Error> for AssetError {
    fn from(err: speedy::Error) -> Self {
        AssetError::DeserializationError(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AssetError::VersionMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(err.to_string(), "Binary version mismatch: expected 2, found 1");

        let err = AssetError::import_failed("textures/brick.png", "bad header");
        assert_eq!(err.to_string(), "Failed to import textures/brick.png: bad header");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AssetError = io.into();
        assert!(matches!(err, AssetError::IoError(msg) if msg.contains("missing")));
    }
}

//! Asset registry: handle -> metadata for every known source file
//!
//! The registry is persisted as a JSON document:
//!
//! ```json
//! {
//!   "Assets": [
//!     { "Handle": 1, "FilePath": "textures/brick.png", "AssetType": "Texture2D", "LastModifiedTime": 1700000000000000000 }
//!   ]
//! }
//! ```

use crate::assets::{AssetHandle, AssetMetadata, AssetType};
use crate::error::{AssetError, Result};
use crate::utils::posix_string;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RegistryRecord {
    handle: u64,
    file_path: String,
    asset_type: String,
    last_modified_time: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(rename = "Assets", default)]
    assets: Vec<RegistryRecord>,
}

/// Ordered handle -> metadata table with a path index
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    entries: BTreeMap<AssetHandle, AssetMetadata>,
    path_index: FxHashMap<PathBuf, AssetHandle>,
    next_handle: u64,
    dirty: bool,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            path_index: FxHashMap::default(),
            next_handle: 1,
            dirty: false,
        }
    }

    /// Classify `relative_path` by extension and upsert its metadata.
    ///
    /// A path already in the registry keeps its handle; a new path gets a
    /// fresh one. Unrecognized files are recorded with `AssetType::None`.
    pub fn register_or_update(&mut self, relative_path: &Path, last_modified: u64) -> AssetHandle {
        let key = PathBuf::from(posix_string(relative_path));
        let asset_type = AssetType::from_path(&key);

        if let Some(&handle) = self.path_index.get(&key) {
            if let Some(meta) = self.entries.get_mut(&handle) {
                if meta.asset_type != asset_type || meta.last_modified != last_modified {
                    meta.asset_type = asset_type;
                    meta.last_modified = last_modified;
                    self.dirty = true;
                }
                return handle;
            }
        }

        let handle = self.allocate_handle();
        self.insert(
            handle,
            AssetMetadata {
                asset_type,
                file_path: key,
                last_modified,
            },
        );
        handle
    }

    fn allocate_handle(&mut self) -> AssetHandle {
        let handle = AssetHandle::from_raw(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Insert an entry under a known handle, replacing any previous one
    pub fn insert(&mut self, handle: AssetHandle, metadata: AssetMetadata) {
        if !handle.is_valid() {
            tracing::warn!("refusing to register the invalid handle");
            return;
        }
        if let Some(previous) = self.entries.remove(&handle) {
            self.path_index.remove(&previous.file_path);
        }
        self.next_handle = self.next_handle.max(handle.raw() + 1);
        self.path_index.insert(metadata.file_path.clone(), handle);
        self.entries.insert(handle, metadata);
        self.dirty = true;
    }

    /// Current metadata, `None` for unknown handles
    pub fn lookup(&self, handle: AssetHandle) -> Option<&AssetMetadata> {
        self.entries.get(&handle)
    }

    pub fn contains(&self, handle: AssetHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Known, non-zero handle whose type is recognized
    pub fn is_handle_valid(&self, handle: AssetHandle) -> bool {
        handle.is_valid() && self.lookup(handle).is_some_and(AssetMetadata::is_valid)
    }

    pub fn asset_type(&self, handle: AssetHandle) -> AssetType {
        self.lookup(handle)
            .map(|meta| meta.asset_type)
            .unwrap_or(AssetType::None)
    }

    pub fn file_path(&self, handle: AssetHandle) -> Option<&Path> {
        self.lookup(handle).map(|meta| meta.file_path.as_path())
    }

    pub fn handle_for_path(&self, relative_path: &Path) -> Option<AssetHandle> {
        let key = PathBuf::from(posix_string(relative_path));
        self.path_index.get(&key).copied()
    }

    /// Remove an entry; its handle is never handed out again by this registry
    pub fn remove(&mut self, handle: AssetHandle) -> Option<AssetMetadata> {
        let removed = self.entries.remove(&handle)?;
        self.path_index.remove(&removed.file_path);
        self.dirty = true;
        Some(removed)
    }

    /// Entries in handle order
    pub fn iter(&self) -> impl Iterator<Item = (AssetHandle, &AssetMetadata)> {
        self.entries.iter().map(|(handle, meta)| (*handle, meta))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Changed since the last persist or load
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Serialize the full table to the registry document format
    pub fn to_document_string(&self) -> Result<String> {
        let document = RegistryDocument {
            assets: self
                .entries
                .iter()
                .map(|(handle, meta)| RegistryRecord {
                    handle: handle.raw(),
                    file_path: posix_string(&meta.file_path),
                    asset_type: meta.asset_type.as_str().to_string(),
                    last_modified_time: meta.last_modified,
                })
                .collect(),
        };
        serde_json::to_string_pretty(&document)
            .map_err(|e| AssetError::SerializationError(e.to_string()))
    }

    /// Parse a registry document
    pub fn from_document_str(text: &str) -> Result<Self> {
        let document: RegistryDocument = serde_json::from_str(text)
            .map_err(|e| AssetError::DeserializationError(e.to_string()))?;

        let mut registry = Self::new();
        for record in document.assets {
            let handle = AssetHandle::from_raw(record.handle);
            let file_path = PathBuf::from(posix_string(Path::new(&record.file_path)));
            if file_path.as_os_str().is_empty() {
                tracing::warn!(%handle, "skipping registry record with an empty path");
                continue;
            }
            if !handle.is_valid() {
                tracing::warn!(path = %record.file_path, "skipping registry record with handle 0");
                continue;
            }
            if registry.path_index.contains_key(&file_path) || registry.contains(handle) {
                tracing::warn!(%handle, path = %record.file_path, "skipping duplicate registry record");
                continue;
            }
            // Unknown type names load as AssetType::None
            let asset_type = record.asset_type.parse().unwrap_or_default();
            registry.insert(
                handle,
                AssetMetadata {
                    asset_type,
                    file_path,
                    last_modified: record.last_modified_time,
                },
            );
        }
        registry.dirty = false;
        Ok(registry)
    }

    /// Write the registry document to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_document_string()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Write-then-rename so a crash never leaves a truncated document
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, text)?;
        std::fs::rename(&temp, path)?;
        Ok(())
    }

    /// Persist to `path`; failures are logged, never raised
    pub fn persist(&mut self, path: &Path) -> bool {
        match self.save(path) {
            Ok(()) => {
                self.dirty = false;
                tracing::debug!(path = %path.display(), entries = self.len(), "asset registry saved");
                true
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to save asset registry");
                false
            }
        }
    }

    /// Load from `path`; a missing or corrupt document yields an empty registry
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::info!(path = %path.display(), error = %e, "no asset registry, starting empty");
                return Self::new();
            }
        };

        match Self::from_document_str(&text) {
            Ok(registry) => {
                tracing::info!(path = %path.display(), entries = registry.len(), "asset registry loaded");
                registry
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "corrupt asset registry, starting empty");
                Self::new()
            }
        }
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use archetype_assets::prelude::*;
//! ```

pub use crate::assets::importers::ShaderCompiler;
pub use crate::assets::types::{ShaderArtifact, ShaderKind};
pub use crate::assets::{
    Asset, AssetHandle, AssetImporter, AssetManager, AssetMetadata, AssetRegistry, AssetState,
    AssetType, LoadPriority, Material, Pipeline, Scene, Script, Shader, SharedAsset, Texture2D,
};
pub use crate::cache::{ArtifactCache, CacheStatus};
pub use crate::config::PipelineConfig;
pub use crate::error::{AssetError, Result};
pub use crate::scheduler::{DeferredScheduler, TaskScheduler};
pub use crate::watcher::{AssetChangeInfo, AssetFileWatcher, AssetWatchEvent};

// Asset Pipeline Module
//
// Provides asset management with:
// - Content-addressed registry
// - Async CPU-side loading on worker threads
// - Owning-thread finalize with dependency cascade
// - Per-type importer dispatch

pub mod descriptors;
pub mod importer;
pub mod importers;
pub mod manager;
pub mod registry;
pub mod request;
pub mod types;

pub use descriptors::{MaterialDescriptor, PipelineDescriptor, SceneDocument};
pub use importer::{AssetImporter, ImporterTable, LoadContext};
pub use manager::{AssetManager, CompletionQueue, RegistrySync, TickReport};
pub use registry::AssetRegistry;
pub use request::{AsyncLoadRequest, CpuData, LoadPriority};
pub use types::{Material, Pipeline, Scene, Script, Shader, Texture2D};

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Stable 64-bit identifier of a registry entry. Zero is never a valid handle.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AssetHandle(u64);

impl AssetHandle {
    pub const INVALID: AssetHandle = AssetHandle(0);

    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AssetHandle {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Kind of content an asset file holds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetType {
    #[default]
    None,
    Scene,
    Texture2D,
    Material,
    Script,
    Shader,
    Pipeline,
}

impl AssetType {
    /// Every recognized type, `None` excluded
    pub const ALL: [AssetType; 6] = [
        AssetType::Scene,
        AssetType::Texture2D,
        AssetType::Material,
        AssetType::Script,
        AssetType::Shader,
        AssetType::Pipeline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::None => "None",
            AssetType::Scene => "Scene",
            AssetType::Texture2D => "Texture2D",
            AssetType::Material => "Material",
            AssetType::Script => "Script",
            AssetType::Shader => "Shader",
            AssetType::Pipeline => "Pipeline",
        }
    }

    /// Classify by file extension (case-insensitive, with or without the dot)
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        match extension.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" | "tga" | "hdr" => AssetType::Texture2D,
            "gxscene" | "scene" => AssetType::Scene,
            "slang" | "hlsl" | "glsl" | "vert" | "frag" | "comp" => AssetType::Shader,
            "mat" | "material" => AssetType::Material,
            "pipeline" | "gxpipe" => AssetType::Pipeline,
            "lua" | "gxscript" => AssetType::Script,
            // .cs sources belong to the script runtime, not the registry
            _ => AssetType::None,
        }
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(AssetType::None)
    }

    pub fn is_none(self) -> bool {
        self == AssetType::None
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = std::convert::Infallible;

    /// Unknown names map to `AssetType::None`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Scene" => AssetType::Scene,
            "Texture2D" => AssetType::Texture2D,
            "Material" => AssetType::Material,
            "Script" => AssetType::Script,
            "Shader" => AssetType::Shader,
            "Pipeline" => AssetType::Pipeline,
            _ => AssetType::None,
        })
    }
}

/// Registry record for one source file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetMetadata {
    pub asset_type: AssetType,
    /// Path relative to the content root, forward slashes
    pub file_path: PathBuf,
    /// Source mtime in nanoseconds since the UNIX epoch
    pub last_modified: u64,
}

impl AssetMetadata {
    /// Only typed entries count as assets
    pub fn is_valid(&self) -> bool {
        !self.asset_type.is_none()
    }
}

/// Lifecycle of one load request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AssetState {
    #[default]
    NotLoaded,
    Loading,
    ReadyForGpu,
    Loaded,
    Failed,
}

/// Trait for finalized, consumer-visible resources
pub trait Asset: Any + Send + Sync {
    /// Which registry type produced this resource
    fn asset_type(&self) -> AssetType;

    /// Get approximate memory size in bytes
    fn memory_size(&self) -> usize {
        std::mem::size_of_val(self)
    }

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Reference-counted handle to a published resource
pub type SharedAsset = Arc<dyn Asset>;

/// Implement [`Asset`] for a resource type
#[macro_export]
macro_rules! impl_asset {
    ($ty:ty, $kind:expr) => {
        $crate::impl_asset!($ty, $kind, |_: &$ty| ::std::mem::size_of::<$ty>());
    };
    ($ty:ty, $kind:expr, $size:expr) => {
        impl $crate::assets::Asset for $ty {
            fn asset_type(&self) -> $crate::assets::AssetType {
                $kind
            }

            fn memory_size(&self) -> usize {
                let size: fn(&$ty) -> usize = $size;
                size(self)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn into_any(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::sync::Arc<dyn ::std::any::Any + Send + Sync> {
                self
            }
        }
    };
}

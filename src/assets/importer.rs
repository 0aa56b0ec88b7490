//! Importer dispatch: AssetType -> importer

use crate::assets::importers::{
    MaterialImporter, PipelineImporter, SceneImporter, ScriptImporter, ShaderCompiler,
    ShaderImporter, TextureImporter,
};
use crate::assets::request::CpuData;
use crate::assets::{AssetHandle, AssetMetadata, AssetType, SharedAsset};
use crate::config::PipelineConfig;
use crate::error::Result;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a worker needs to decode one file
#[derive(Clone, Debug)]
pub struct LoadContext {
    pub handle: AssetHandle,
    pub asset_type: AssetType,
    /// Path relative to the content root
    pub relative_path: PathBuf,
    /// Path on disk
    pub full_path: PathBuf,
}

/// Two-phase importer for one asset type.
///
/// `load_cpu` runs on a worker thread and must not touch owner-thread state.
/// `finalize` runs on the owning thread during `tick` and turns the payload
/// into the published resource; `None` counts as a failed load.
pub trait AssetImporter: Send + Sync {
    fn asset_type(&self) -> AssetType;

    fn load_cpu(&self, ctx: &LoadContext) -> Result<CpuData>;

    fn finalize(
        &self,
        handle: AssetHandle,
        metadata: &AssetMetadata,
        data: CpuData,
    ) -> Option<SharedAsset>;
}

/// Type -> importer lookup
#[derive(Default, Clone)]
pub struct ImporterTable {
    importers: FxHashMap<AssetType, Arc<dyn AssetImporter>>,
}

impl ImporterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every built-in importer; shaders compile through `compiler`
    pub fn with_defaults(config: &PipelineConfig, compiler: Arc<dyn ShaderCompiler>) -> Self {
        let mut table = Self::new();
        table.register(TextureImporter);
        table.register(SceneImporter);
        table.register(MaterialImporter);
        table.register(PipelineImporter);
        table.register(ScriptImporter);
        table.register(ShaderImporter::new(config, compiler));
        table
    }

    /// Register an importer, replacing any previous one for its type
    pub fn register<I: AssetImporter + 'static>(&mut self, importer: I) {
        self.register_arc(Arc::new(importer));
    }

    pub fn register_arc(&mut self, importer: Arc<dyn AssetImporter>) {
        let asset_type = importer.asset_type();
        if self.importers.insert(asset_type, importer).is_some() {
            tracing::debug!(%asset_type, "replaced importer");
        }
    }

    pub fn get(&self, asset_type: AssetType) -> Option<&Arc<dyn AssetImporter>> {
        self.importers.get(&asset_type)
    }

    pub fn contains(&self, asset_type: AssetType) -> bool {
        self.importers.contains_key(&asset_type)
    }

    /// Materialize a resource through the importer registered for its type
    pub fn finalize(
        &self,
        handle: AssetHandle,
        metadata: &AssetMetadata,
        data: CpuData,
    ) -> Option<SharedAsset> {
        match self.get(metadata.asset_type) {
            Some(importer) => importer.finalize(handle, metadata, data),
            None => {
                tracing::error!(
                    %handle,
                    asset_type = %metadata.asset_type,
                    "No importer found for asset type"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for ImporterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.importers.keys().copied().collect();
        types.sort();
        f.debug_struct("ImporterTable").field("types", &types).finish()
    }
}

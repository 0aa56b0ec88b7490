//! Load requests and the CPU-side payload produced by worker threads

use crate::assets::descriptors::{
    Dependencies, MaterialDescriptor, PipelineDescriptor, SceneDocument,
};
use crate::assets::types::ShaderArtifact;
use crate::assets::{AssetHandle, AssetState, AssetType};
use crate::error::AssetError;
use crate::scheduler::TaskId;
use std::path::PathBuf;

pub use crate::scheduler::LoadPriority;

/// Decoded pixels
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneData {
    pub document: SceneDocument,
    pub dependencies: Dependencies,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderData {
    pub artifact: ShaderArtifact,
    /// Compiler ran instead of the artifact cache answering
    pub rebuilt: bool,
}

/// Worker output, one case per asset type
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CpuData {
    #[default]
    None,
    Texture(TextureData),
    Scene(SceneData),
    Material(MaterialDescriptor),
    Pipeline(PipelineDescriptor),
    Shader(ShaderData),
    Script(String),
}

impl CpuData {
    /// Handles that must be loaded alongside this asset
    pub fn dependencies(&self) -> Dependencies {
        match self {
            CpuData::Scene(scene) => scene.dependencies.clone(),
            CpuData::Material(material) => material.dependencies(),
            CpuData::Pipeline(pipeline) => pipeline.dependencies(),
            _ => Dependencies::new(),
        }
    }

    pub fn asset_type(&self) -> AssetType {
        match self {
            CpuData::None => AssetType::None,
            CpuData::Texture(_) => AssetType::Texture2D,
            CpuData::Scene(_) => AssetType::Scene,
            CpuData::Material(_) => AssetType::Material,
            CpuData::Pipeline(_) => AssetType::Pipeline,
            CpuData::Shader(_) => AssetType::Shader,
            CpuData::Script(_) => AssetType::Script,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CpuData::None)
    }
}

/// One load of one handle, from submission until finalize
#[derive(Debug)]
pub struct AsyncLoadRequest {
    pub handle: AssetHandle,
    pub asset_type: AssetType,
    /// Path relative to the content root
    pub file_path: PathBuf,
    pub priority: LoadPriority,
    pub state: AssetState,
    pub task: Option<TaskId>,
    pub cpu_data: CpuData,
    pub error: Option<AssetError>,
}

impl AsyncLoadRequest {
    pub fn new(
        handle: AssetHandle,
        asset_type: AssetType,
        file_path: impl Into<PathBuf>,
        priority: LoadPriority,
    ) -> Self {
        Self {
            handle,
            asset_type,
            file_path: file_path.into(),
            priority,
            state: AssetState::NotLoaded,
            task: None,
            cpu_data: CpuData::None,
            error: None,
        }
    }

    /// Worker finished decoding
    pub fn complete(&mut self, cpu_data: CpuData) {
        self.cpu_data = cpu_data;
        self.state = AssetState::ReadyForGpu;
    }

    pub fn fail(&mut self, error: AssetError) {
        self.cpu_data = CpuData::None;
        self.error = Some(error);
        self.state = AssetState::Failed;
    }

    /// Drop the CPU payload once it has been consumed
    pub fn take_cpu_data(&mut self) -> CpuData {
        std::mem::take(&mut self.cpu_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_state_transitions() {
        let h = AssetHandle::from_raw(3);
        let mut request = AsyncLoadRequest::new(h, AssetType::Script, "a.lua", LoadPriority::Normal);
        assert_eq!(request.state, AssetState::NotLoaded);

        request.complete(CpuData::Script("return 1".into()));
        assert_eq!(request.state, AssetState::ReadyForGpu);
        assert_eq!(request.cpu_data.asset_type(), AssetType::Script);
        assert!(!request.take_cpu_data().is_none());
        assert!(request.cpu_data.is_none());

        request.fail(AssetError::import_failed("a.lua", "boom"));
        assert_eq!(request.state, AssetState::Failed);
        assert!(request.error.is_some());
    }

    #[test]
    fn test_scene_payload_dependencies() {
        let deps: Dependencies = smallvec![AssetHandle::from_raw(4), AssetHandle::from_raw(9)];
        let data = CpuData::Scene(SceneData {
            document: SceneDocument::default(),
            dependencies: deps.clone(),
        });
        assert_eq!(data.dependencies(), deps);
        assert!(CpuData::Script(String::new()).dependencies().is_empty());
    }
}

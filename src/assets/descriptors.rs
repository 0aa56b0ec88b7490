//! Authored JSON documents for scenes, materials and pipelines
//!
//! These are the on-disk descriptor formats. Each one can list the asset
//! handles it references so the loader can schedule them.

use crate::assets::AssetHandle;
use crate::error::{AssetError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::Path;

/// Handles referenced by a document, distinct and in first-seen order
pub type Dependencies = SmallVec<[AssetHandle; 4]>;

fn push_dependency(deps: &mut Dependencies, handle: Option<AssetHandle>) {
    if let Some(handle) = handle {
        if handle.is_valid() && !deps.contains(&handle) {
            deps.push(handle);
        }
    }
}

fn parse_document<T: for<'de> Deserialize<'de>>(path: &Path, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| AssetError::import_failed(path, e))
}

/// One entity of a scene document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SceneEntity {
    #[serde(rename = "Entity")]
    pub name: String,
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<AssetHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<AssetHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<AssetHandle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SceneEntity>,
}

impl SceneEntity {
    fn collect_dependencies(&self, deps: &mut Dependencies) {
        push_dependency(deps, self.texture);
        push_dependency(deps, self.material);
        push_dependency(deps, self.script);
        for child in &self.children {
            child.collect_dependencies(deps);
        }
    }
}

/// Scene file: a named tree of entities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SceneDocument {
    #[serde(rename = "Scene")]
    pub name: String,
    #[serde(default)]
    pub entities: Vec<SceneEntity>,
}

impl SceneDocument {
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        parse_document(path, bytes)
    }

    /// Every asset referenced anywhere in the entity tree
    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::new();
        for entity in &self.entities {
            entity.collect_dependencies(&mut deps);
        }
        deps
    }

    pub fn entity_count(&self) -> usize {
        fn count(entity: &SceneEntity) -> usize {
            1 + entity.children.iter().map(count).sum::<usize>()
        }
        self.entities.iter().map(count).sum()
    }
}

/// Material file: shader, pipeline and bound textures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MaterialDescriptor {
    pub shader: AssetHandle,
    pub pipeline: AssetHandle,
    #[serde(default)]
    pub textures: Vec<AssetHandle>,
    #[serde(default)]
    pub base_color: [f32; 4],
}

impl MaterialDescriptor {
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        let descriptor: Self = parse_document(path, bytes)?;
        if !descriptor.shader.is_valid() || !descriptor.pipeline.is_valid() {
            return Err(AssetError::import_failed(
                path,
                "material is missing a Shader or Pipeline reference",
            ));
        }
        Ok(descriptor)
    }

    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::new();
        push_dependency(&mut deps, Some(self.shader));
        push_dependency(&mut deps, Some(self.pipeline));
        for texture in &self.textures {
            push_dependency(&mut deps, Some(*texture));
        }
        deps
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Blending {
    #[default]
    None,
    Alpha,
    Additive,
    Multiplicative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cull {
    #[default]
    None,
    Front,
    Back,
    FrontBack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fill {
    #[default]
    Solid,
    Wireframe,
    Point,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Pipeline file: fixed-function state plus the shader it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PipelineDescriptor {
    pub shader: Option<AssetHandle>,
    pub blending: Blending,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub cull: Cull,
    pub front_face: FrontFace,
    pub fill: Fill,
    pub topology: Topology,
    pub line_width: f32,
}

impl Default for PipelineDescriptor {
    fn default() -> Self {
        Self {
            shader: None,
            blending: Blending::None,
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::Less,
            cull: Cull::None,
            front_face: FrontFace::CounterClockwise,
            fill: Fill::Solid,
            topology: Topology::TriangleList,
            line_width: 1.0,
        }
    }
}

impl PipelineDescriptor {
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        parse_document(path, bytes)
    }

    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::new();
        push_dependency(&mut deps, self.shader);
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(id: u64) -> AssetHandle {
        AssetHandle::from_raw(id)
    }

    #[test]
    fn test_scene_dependencies_are_distinct() {
        let json = br#"{
            "Scene": "Courtyard",
            "Entities": [
                { "Entity": "Wall", "Texture": 11, "Material": 20 },
                { "Entity": "Floor", "Texture": 11, "Children": [
                    { "Entity": "Tile", "Texture": 12, "Script": 0 }
                ]}
            ]
        }"#;
        let scene = SceneDocument::parse(Path::new("courtyard.gxscene"), json).unwrap();
        assert_eq!(scene.name, "Courtyard");
        assert_eq!(scene.entity_count(), 3);
        assert_eq!(scene.dependencies().as_slice(), &[h(11), h(20), h(12)]);
    }

    #[test]
    fn test_material_requires_shader_and_pipeline() {
        let ok = br#"{ "Shader": 5, "Pipeline": 6, "Textures": [7, 7, 8] }"#;
        let material = MaterialDescriptor::parse(Path::new("brick.mat"), ok).unwrap();
        assert_eq!(material.dependencies().as_slice(), &[h(5), h(6), h(7), h(8)]);

        let missing = br#"{ "Shader": 5, "Pipeline": 0 }"#;
        assert!(MaterialDescriptor::parse(Path::new("brick.mat"), missing).is_err());
    }

    #[test]
    fn test_pipeline_defaults() {
        let pipeline =
            PipelineDescriptor::parse(Path::new("opaque.pipeline"), br#"{ "Cull": "Back" }"#)
                .unwrap();
        assert_eq!(pipeline.cull, Cull::Back);
        assert_eq!(pipeline.depth_compare, CompareOp::Less);
        assert!(pipeline.depth_test);
        assert!(pipeline.dependencies().is_empty());
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let err = SceneDocument::parse(Path::new("broken.gxscene"), b"{").unwrap_err();
        assert!(err.to_string().contains("broken.gxscene"));
    }
}

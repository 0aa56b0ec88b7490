//! Finalized resource types published by the asset manager

use crate::assets::descriptors::{PipelineDescriptor, SceneEntity};
use crate::assets::{AssetHandle, AssetType};
use crate::cache::codec::{BinaryReader, BinaryRecord, BinaryWriter};
use crate::error::Result;
use crate::impl_asset;
use speedy::{Readable, Writable};
use std::path::PathBuf;

/// RGBA texture ready for upload
#[derive(Clone, Debug, PartialEq)]
pub struct Texture2D {
    pub debug_name: String,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixels: Vec<u8>,
}

impl Texture2D {
    /// 16x16 magenta/black checkerboard for assets that never became available
    pub fn checkerboard() -> Self {
        const SIZE: u32 = 16;
        const MAGENTA: [u8; 4] = [255, 0, 255, 255];
        const BLACK: [u8; 4] = [0, 0, 0, 255];

        let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
        for y in 0..SIZE {
            for x in 0..SIZE {
                let texel = if (x % 2) ^ (y % 2) == 1 { MAGENTA } else { BLACK };
                pixels.extend_from_slice(&texel);
            }
        }

        Self {
            debug_name: "checkerboard".to_string(),
            width: SIZE,
            height: SIZE,
            channels: 4,
            pixels,
        }
    }
}

impl_asset!(Texture2D, AssetType::Texture2D, |t: &Texture2D| t.pixels.len());

/// Loaded scene graph description
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub name: String,
    pub entities: Vec<SceneEntity>,
    pub dependencies: Vec<AssetHandle>,
}

impl_asset!(Scene, AssetType::Scene);

/// Shader + pipeline + texture bindings
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub shader: AssetHandle,
    pub pipeline: AssetHandle,
    pub textures: Vec<AssetHandle>,
    pub base_color: [f32; 4],
}

impl_asset!(Material, AssetType::Material);

/// Fixed-function pipeline state
#[derive(Clone, Debug, PartialEq)]
pub struct Pipeline {
    pub descriptor: PipelineDescriptor,
}

impl_asset!(Pipeline, AssetType::Pipeline);

/// Script source handed to the scripting runtime
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    pub source: String,
}

impl_asset!(Script, AssetType::Script, |s: &Script| s.source.len());

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Readable, Writable)]
pub enum ShaderKind {
    #[default]
    Graphics,
    Compute,
}

impl ShaderKind {
    /// Guess the kind from shader source markers
    pub fn detect(source: &str) -> Self {
        const COMPUTE_MARKERS: [&str; 4] = [
            "[shader(\"compute\")]",
            "DispatchThreadID",
            "GroupThreadID",
            "computeMain",
        ];
        if COMPUTE_MARKERS.iter().any(|marker| source.contains(marker)) {
            ShaderKind::Compute
        } else {
            ShaderKind::Graphics
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Readable, Writable)]
pub struct ShaderBinding {
    pub set: u32,
    pub binding: u32,
    pub name: String,
    pub count: u32,
}

/// Layout information extracted by the compiler
#[derive(Clone, Debug, Default, PartialEq, Eq, Readable, Writable)]
pub struct ShaderReflection {
    pub entry_points: Vec<String>,
    pub bindings: Vec<ShaderBinding>,
    pub push_constant_size: u32,
}

/// Compiled output cached between runs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderArtifact {
    pub kind: ShaderKind,
    /// One bytecode blob per entry point
    pub bytecode: Vec<Vec<u32>>,
    pub pipeline_cache: Vec<u8>,
    pub reflection: ShaderReflection,
}

impl BinaryRecord for ShaderArtifact {
    fn write_record(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write(&self.kind)?;
        writer.write(&self.bytecode)?;
        writer.write(&self.pipeline_cache)?;
        writer.write(&self.reflection)
    }

    fn read_record(reader: &mut BinaryReader) -> Result<Self> {
        Ok(Self {
            kind: reader.read()?,
            bytecode: reader.read()?,
            pipeline_cache: reader.read()?,
            reflection: reader.read()?,
        })
    }
}

/// Compiled shader
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shader {
    pub source_path: PathBuf,
    pub artifact: ShaderArtifact,
}

impl Shader {
    pub fn kind(&self) -> ShaderKind {
        self.artifact.kind
    }
}

impl_asset!(Shader, AssetType::Shader, |s: &Shader| {
    s.artifact.bytecode.iter().map(|b| b.len() * 4).sum::<usize>()
        + s.artifact.pipeline_cache.len()
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Asset;
    use std::sync::Arc;

    #[test]
    fn test_checkerboard_layout() {
        let tex = Texture2D::checkerboard();
        assert_eq!(tex.pixels.len(), 16 * 16 * 4);
        assert_eq!(&tex.pixels[0..4], &[0, 0, 0, 255]);
        assert_eq!(&tex.pixels[4..8], &[255, 0, 255, 255]);
        assert_eq!(tex.memory_size(), 1024);
    }

    #[test]
    fn test_shader_kind_detection() {
        assert_eq!(
            ShaderKind::detect("[shader(\"compute\")] void main(uint3 id : SV_DispatchThreadID) {}"),
            ShaderKind::Compute
        );
        assert_eq!(ShaderKind::detect("float4 fragmentMain() {}"), ShaderKind::Graphics);
    }

    #[test]
    fn test_downcast_through_asset_trait() {
        let script: Arc<dyn Asset> = Arc::new(Script {
            source: "print('hi')".to_string(),
        });
        assert_eq!(script.asset_type(), AssetType::Script);
        let concrete = script.into_any().downcast::<Script>().unwrap();
        assert_eq!(concrete.source, "print('hi')");
    }

    #[test]
    fn test_shader_artifact_record() {
        let artifact = ShaderArtifact {
            kind: ShaderKind::Compute,
            bytecode: vec![vec![0x0723_0203, 0x0001_0000]],
            pipeline_cache: vec![1, 2, 3],
            reflection: ShaderReflection {
                entry_points: vec!["computeMain".to_string()],
                bindings: vec![ShaderBinding {
                    set: 0,
                    binding: 1,
                    name: "Output".to_string(),
                    count: 1,
                }],
                push_constant_size: 16,
            },
        };
        let mut writer = BinaryWriter::new(1);
        writer.write_record(&artifact).unwrap();
        let mut reader = BinaryReader::from_bytes(writer.into_inner(), 1).unwrap();
        assert_eq!(reader.read_record::<ShaderArtifact>().unwrap(), artifact);
    }
}

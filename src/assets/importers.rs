//! Built-in importers

use crate::assets::descriptors::{MaterialDescriptor, PipelineDescriptor, SceneDocument};
use crate::assets::importer::{AssetImporter, LoadContext};
use crate::assets::request::{CpuData, SceneData, ShaderData, TextureData};
use crate::assets::types::{
    Material, Pipeline, Scene, Script, Shader, ShaderArtifact, ShaderKind, Texture2D,
};
use crate::assets::{AssetHandle, AssetMetadata, AssetType, SharedAsset};
use crate::cache::ArtifactCache;
use crate::config::PipelineConfig;
use crate::error::{AssetError, Result};
use crate::utils::posix_string;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn read_source(ctx: &LoadContext) -> Result<Vec<u8>> {
    std::fs::read(&ctx.full_path).map_err(|e| AssetError::import_failed(&ctx.full_path, e))
}

fn read_source_text(ctx: &LoadContext) -> Result<String> {
    std::fs::read_to_string(&ctx.full_path)
        .map_err(|e| AssetError::import_failed(&ctx.full_path, e))
}

fn payload_mismatch(metadata: &AssetMetadata, data: &CpuData) -> Option<SharedAsset> {
    tracing::error!(
        path = %metadata.file_path.display(),
        expected = %metadata.asset_type,
        found = %data.asset_type(),
        "importer received a payload for another asset type"
    );
    None
}

/// Decodes any format the `image` crate understands into RGBA8
#[derive(Debug, Default, Clone, Copy)]
pub struct TextureImporter;

impl AssetImporter for TextureImporter {
    fn asset_type(&self) -> AssetType {
        AssetType::Texture2D
    }

    fn load_cpu(&self, ctx: &LoadContext) -> Result<CpuData> {
        let bytes = read_source(ctx)?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| AssetError::import_failed(&ctx.full_path, e))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(CpuData::Texture(TextureData {
            width,
            height,
            channels: 4,
            pixels: image.into_raw(),
        }))
    }

    fn finalize(&self, _: AssetHandle, metadata: &AssetMetadata, data: CpuData) -> Option<SharedAsset> {
        match data {
            CpuData::Texture(texture) => Some(Arc::new(Texture2D {
                debug_name: metadata
                    .file_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                width: texture.width,
                height: texture.height,
                channels: texture.channels,
                pixels: texture.pixels,
            })),
            other => payload_mismatch(metadata, &other),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SceneImporter;

impl AssetImporter for SceneImporter {
    fn asset_type(&self) -> AssetType {
        AssetType::Scene
    }

    fn load_cpu(&self, ctx: &LoadContext) -> Result<CpuData> {
        let document = SceneDocument::parse(&ctx.full_path, &read_source(ctx)?)?;
        let dependencies = document.dependencies();
        Ok(CpuData::Scene(SceneData {
            document,
            dependencies,
        }))
    }

    fn finalize(&self, _: AssetHandle, metadata: &AssetMetadata, data: CpuData) -> Option<SharedAsset> {
        match data {
            CpuData::Scene(scene) => Some(Arc::new(Scene {
                name: scene.document.name,
                entities: scene.document.entities,
                dependencies: scene.dependencies.into_vec(),
            })),
            other => payload_mismatch(metadata, &other),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MaterialImporter;

impl AssetImporter for MaterialImporter {
    fn asset_type(&self) -> AssetType {
        AssetType::Material
    }

    fn load_cpu(&self, ctx: &LoadContext) -> Result<CpuData> {
        MaterialDescriptor::parse(&ctx.full_path, &read_source(ctx)?).map(CpuData::Material)
    }

    fn finalize(&self, _: AssetHandle, metadata: &AssetMetadata, data: CpuData) -> Option<SharedAsset> {
        match data {
            CpuData::Material(material) => Some(Arc::new(Material {
                shader: material.shader,
                pipeline: material.pipeline,
                textures: material.textures,
                base_color: material.base_color,
            })),
            other => payload_mismatch(metadata, &other),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineImporter;

impl AssetImporter for PipelineImporter {
    fn asset_type(&self) -> AssetType {
        AssetType::Pipeline
    }

    fn load_cpu(&self, ctx: &LoadContext) -> Result<CpuData> {
        PipelineDescriptor::parse(&ctx.full_path, &read_source(ctx)?).map(CpuData::Pipeline)
    }

    fn finalize(&self, _: AssetHandle, metadata: &AssetMetadata, data: CpuData) -> Option<SharedAsset> {
        match data {
            CpuData::Pipeline(descriptor) => Some(Arc::new(Pipeline { descriptor })),
            other => payload_mismatch(metadata, &other),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptImporter;

impl AssetImporter for ScriptImporter {
    fn asset_type(&self) -> AssetType {
        AssetType::Script
    }

    fn load_cpu(&self, ctx: &LoadContext) -> Result<CpuData> {
        read_source_text(ctx).map(CpuData::Script)
    }

    fn finalize(&self, _: AssetHandle, metadata: &AssetMetadata, data: CpuData) -> Option<SharedAsset> {
        match data {
            CpuData::Script(source) => Some(Arc::new(Script { source })),
            other => payload_mismatch(metadata, &other),
        }
    }
}

/// External shader toolchain
pub trait ShaderCompiler: Send + Sync {
    /// Toolchain identity; a change invalidates every cached artifact
    fn identity(&self) -> String;

    fn compile(&self, source: &Path, kind: ShaderKind) -> Result<ShaderArtifact>;
}

/// Compiler for builds without a shader toolchain; every compile fails
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingShaderCompiler;

impl ShaderCompiler for MissingShaderCompiler {
    fn identity(&self) -> String {
        "none".to_string()
    }

    fn compile(&self, source: &Path, _kind: ShaderKind) -> Result<ShaderArtifact> {
        Err(AssetError::CompileFailed(format!(
            "no shader compiler available for {}",
            source.display()
        )))
    }
}

/// Compiles shaders through the artifact cache
pub struct ShaderImporter {
    compiler: Arc<dyn ShaderCompiler>,
    cache: ArtifactCache<ShaderArtifact>,
    cache_dir: PathBuf,
}

impl ShaderImporter {
    pub const CACHE_EXTENSION: &'static str = "gxcache";

    pub fn new(config: &PipelineConfig, compiler: Arc<dyn ShaderCompiler>) -> Self {
        let identity = format!("{}+{}", config.artifact_identity, compiler.identity());
        Self {
            compiler,
            cache: ArtifactCache::new(identity),
            cache_dir: config.cache_path().join("shaders"),
        }
    }

    /// Artifact location for a content-relative shader path
    pub fn cache_file(&self, relative_path: &Path) -> PathBuf {
        self.cache_dir.join(format!(
            "{}.{}",
            posix_string(relative_path),
            Self::CACHE_EXTENSION
        ))
    }

    pub fn cache(&self) -> &ArtifactCache<ShaderArtifact> {
        &self.cache
    }
}

impl AssetImporter for ShaderImporter {
    fn asset_type(&self) -> AssetType {
        AssetType::Shader
    }

    fn load_cpu(&self, ctx: &LoadContext) -> Result<CpuData> {
        let kind = ShaderKind::detect(&read_source_text(ctx)?);
        let cache_file = self.cache_file(&ctx.relative_path);
        let (artifact, rebuilt) = self.cache.load_or_build(&ctx.full_path, &cache_file, || {
            tracing::info!(path = %ctx.relative_path.display(), ?kind, "compiling shader");
            self.compiler.compile(&ctx.full_path, kind)
        })?;
        Ok(CpuData::Shader(ShaderData { artifact, rebuilt }))
    }

    fn finalize(&self, _: AssetHandle, metadata: &AssetMetadata, data: CpuData) -> Option<SharedAsset> {
        match data {
            CpuData::Shader(shader) => Some(Arc::new(Shader {
                source_path: metadata.file_path.clone(),
                artifact: shader.artifact,
            })),
            other => payload_mismatch(metadata, &other),
        }
    }
}

impl std::fmt::Debug for ShaderImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderImporter")
            .field("identity", &self.cache.identity())
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(root: &Path, relative: &str, asset_type: AssetType) -> LoadContext {
        LoadContext {
            handle: AssetHandle::from_raw(1),
            asset_type,
            relative_path: PathBuf::from(relative),
            full_path: root.join(relative),
        }
    }

    fn metadata(relative: &str, asset_type: AssetType) -> AssetMetadata {
        AssetMetadata {
            asset_type,
            file_path: PathBuf::from(relative),
            last_modified: 0,
        }
    }

    #[derive(Default)]
    struct CountingCompiler {
        calls: AtomicUsize,
    }

    impl ShaderCompiler for CountingCompiler {
        fn identity(&self) -> String {
            "counting-1".to_string()
        }

        fn compile(&self, _source: &Path, kind: ShaderKind) -> Result<ShaderArtifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ShaderArtifact {
                kind,
                bytecode: vec![vec![0x0723_0203]],
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_texture_decode() {
        let dir = tempfile::tempdir().unwrap();
        let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        image.save(dir.path().join("brick.png")).unwrap();

        let ctx = context(dir.path(), "brick.png", AssetType::Texture2D);
        let data = TextureImporter.load_cpu(&ctx).unwrap();
        let asset = TextureImporter
            .finalize(ctx.handle, &metadata("textures/brick.png", AssetType::Texture2D), data)
            .unwrap();
        let texture = asset.as_any().downcast_ref::<Texture2D>().unwrap();
        assert_eq!((texture.width, texture.height, texture.channels), (3, 2, 4));
        assert_eq!(&texture.pixels[0..4], &[10, 20, 30, 255]);
        assert_eq!(texture.debug_name, "brick.png");
    }

    #[test]
    fn test_corrupt_texture_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let ctx = context(dir.path(), "bad.png", AssetType::Texture2D);
        assert!(matches!(
            TextureImporter.load_cpu(&ctx),
            Err(AssetError::ImportFailed { .. })
        ));
    }

    #[test]
    fn test_wrong_payload_is_rejected() {
        let meta = metadata("a.lua", AssetType::Script);
        assert!(ScriptImporter
            .finalize(AssetHandle::from_raw(1), &meta, CpuData::None)
            .is_none());
    }

    #[test]
    fn test_shader_compiles_once() {
        let dir = tempfile::tempdir().unwrap();
        let shader_dir = dir.path().join("shaders");
        std::fs::create_dir_all(&shader_dir).unwrap();
        std::fs::write(
            shader_dir.join("blur.slang"),
            "[shader(\"compute\")] void computeMain() {}",
        )
        .unwrap();

        let config = PipelineConfig::with_content_root(dir.path());
        let compiler = Arc::new(CountingCompiler::default());
        let importer = ShaderImporter::new(&config, compiler.clone());
        let ctx = context(dir.path(), "shaders/blur.slang", AssetType::Shader);

        let first = importer.load_cpu(&ctx).unwrap();
        let second = importer.load_cpu(&ctx).unwrap();
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);

        match (first, second) {
            (CpuData::Shader(a), CpuData::Shader(b)) => {
                assert!(a.rebuilt);
                assert!(!b.rebuilt);
                assert_eq!(a.artifact, b.artifact);
                assert_eq!(b.artifact.kind, ShaderKind::Compute);
            }
            other => panic!("unexpected payloads: {other:?}"),
        }
        assert!(importer.cache_file(&ctx.relative_path).is_file());
    }

    #[test]
    fn test_missing_compiler_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lit.slang"), "float4 main() {}").unwrap();
        let config = PipelineConfig::with_content_root(dir.path());
        let importer = ShaderImporter::new(&config, Arc::new(MissingShaderCompiler));
        let ctx = context(dir.path(), "lit.slang", AssetType::Shader);
        assert!(matches!(importer.load_cpu(&ctx), Err(AssetError::CompileFailed(_))));
    }
}

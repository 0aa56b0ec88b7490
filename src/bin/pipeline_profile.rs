#![allow(dead_code, unused_imports)]

use archetype_assets::assets::importers::ShaderCompiler;
use archetype_assets::assets::types::{ShaderArtifact, ShaderKind};
use archetype_assets::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "profiling")]
use archetype_assets::profiling::{init_tracing, LogConfig};

/// Stand-in toolchain: packs the source bytes into words
struct WordCompiler;

impl ShaderCompiler for WordCompiler {
    fn identity(&self) -> String {
        "word-compiler-1".to_string()
    }

    fn compile(&self, source: &Path, kind: ShaderKind) -> Result<ShaderArtifact> {
        let text = std::fs::read(source)?;
        let words = text
            .chunks(4)
            .map(|c| c.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
            .collect();
        Ok(ShaderArtifact {
            kind,
            bytecode: vec![words],
            ..Default::default()
        })
    }
}

fn write_content(root: &Path, textures: usize) -> std::io::Result<()> {
    std::fs::create_dir_all(root.join("textures"))?;
    std::fs::create_dir_all(root.join("shaders"))?;
    std::fs::create_dir_all(root.join("scenes"))?;

    for i in 0..textures {
        let image = image::RgbaImage::from_fn(64, 64, |x, y| {
            image::Rgba([(x * 4) as u8, (y * 4) as u8, i as u8, 255])
        });
        image
            .save(root.join(format!("textures/tex_{i}.png")))
            .map_err(std::io::Error::other)?;
    }
    std::fs::write(root.join("shaders/lit.slang"), "float4 fragmentMain() { return 1; }")?;
    Ok(())
}

#[cfg(feature = "profiling")]
fn main() -> Result<()> {
    let _guard = init_tracing(&LogConfig {
        level: "debug".to_string(),
        json: true,
        file: Some("trace.json".into()),
        ansi: false,
    })?;

    let dir = tempfile_dir()?;
    write_content(&dir, 64)?;

    let config = PipelineConfig::with_content_root(&dir);
    let mut manager = AssetManager::with_worker_pool(config, Arc::new(WordCompiler))?;

    println!("Synchronizing registry...");
    let sync = manager.synchronize_registry()?;
    println!("Registered {} assets", sync.added);

    // Scene referencing every texture, registered after the textures have handles
    let entities: Vec<String> = manager
        .registry()
        .iter()
        .filter(|(_, meta)| meta.asset_type == AssetType::Texture2D)
        .map(|(handle, _)| format!(r#"{{ "Entity": "quad_{handle}", "Texture": {handle} }}"#))
        .collect();
    std::fs::write(
        dir.join("scenes/gallery.gxscene"),
        format!(r#"{{ "Scene": "Gallery", "Entities": [{}] }}"#, entities.join(",")),
    )?;

    let start = Instant::now();
    let scene = manager.import("scenes/gallery.gxscene")?;
    let shader = manager.import("shaders/lit.slang")?;

    let mut ticks = 0;
    while manager.in_flight_count() > 0 && start.elapsed() < Duration::from_secs(30) {
        let report = manager.tick();
        ticks += 1;
        if !report.is_empty() {
            println!("tick {ticks}: {report:?}");
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    println!(
        "Loaded {} assets in {:?} over {ticks} ticks (scene: {}, shader: {})",
        manager.loaded_count(),
        start.elapsed(),
        manager.is_asset_loaded(scene),
        manager.is_asset_loaded(shader),
    );

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[cfg(feature = "profiling")]
fn tempfile_dir() -> Result<std::path::PathBuf> {
    let dir = std::env::temp_dir().join(format!("archetype_assets_profile_{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("pipeline_profile binary requires --features profiling");
}

use archetype_assets::assets::types::{ShaderArtifact, ShaderBinding, ShaderKind, ShaderReflection};
use archetype_assets::cache::{ArtifactCache, BinaryReader, BinaryWriter};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample_artifact() -> ShaderArtifact {
    ShaderArtifact {
        kind: ShaderKind::Graphics,
        bytecode: vec![vec![0x0723_0203; 4096], vec![0x0001_0000; 2048]],
        pipeline_cache: vec![7; 16 * 1024],
        reflection: ShaderReflection {
            entry_points: vec!["vertexMain".into(), "fragmentMain".into()],
            bindings: (0..8)
                .map(|i| ShaderBinding {
                    set: 0,
                    binding: i,
                    name: format!("binding_{i}"),
                    count: 1,
                })
                .collect(),
            push_constant_size: 128,
        },
    }
}

fn bench_artifact_encode(c: &mut Criterion) {
    let artifact = sample_artifact();
    c.bench_function("artifact_encode", |b| {
        b.iter(|| {
            let mut writer = BinaryWriter::new(1);
            writer.write_record(black_box(&artifact)).unwrap();
            writer.into_inner()
        });
    });
}

fn bench_artifact_decode(c: &mut Criterion) {
    let mut writer = BinaryWriter::new(1);
    writer.write_record(&sample_artifact()).unwrap();
    let bytes = writer.into_inner();

    c.bench_function("artifact_decode", |b| {
        b.iter(|| {
            let mut reader = BinaryReader::from_bytes(black_box(bytes.clone()), 1).unwrap();
            reader.read_record::<ShaderArtifact>().unwrap()
        });
    });
}

fn bench_cache_hit(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("lit.slang");
    let cache_file = dir.path().join("lit.slang.gxcache");
    std::fs::write(&source, "float4 fragmentMain() : SV_Target { return 1; }").unwrap();

    let cache = ArtifactCache::<ShaderArtifact>::new("bench");
    cache.save(&source, &cache_file, &sample_artifact()).unwrap();

    c.bench_function("artifact_cache_hit", |b| {
        b.iter(|| cache.load(black_box(&source), black_box(&cache_file)).unwrap());
    });
}

criterion_group!(benches, bench_artifact_encode, bench_artifact_decode, bench_cache_hit);
criterion_main!(benches);

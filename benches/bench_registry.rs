use archetype_assets::assets::AssetRegistry;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::PathBuf;

const EXTENSIONS: [&str; 6] = ["png", "gxscene", "slang", "mat", "pipeline", "lua"];

fn paths(count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| PathBuf::from(format!("dir_{}/asset_{i}.{}", i % 32, EXTENSIONS[i % EXTENSIONS.len()])))
        .collect()
}

fn populated(count: usize) -> AssetRegistry {
    let mut registry = AssetRegistry::new();
    for (i, path) in paths(count).iter().enumerate() {
        registry.register_or_update(path, i as u64);
    }
    registry
}

fn bench_register(c: &mut Criterion) {
    let paths = paths(10_000);
    c.bench_function("registry_register_10k", |b| {
        b.iter(|| {
            let mut registry = AssetRegistry::new();
            for path in &paths {
                registry.register_or_update(black_box(path), 1);
            }
            registry
        });
    });
}

fn bench_document_round_trip(c: &mut Criterion) {
    let registry = populated(10_000);
    c.bench_function("registry_document_10k", |b| {
        b.iter(|| {
            let text = registry.to_document_string().unwrap();
            AssetRegistry::from_document_str(black_box(&text)).unwrap()
        });
    });
}

fn bench_path_lookup(c: &mut Criterion) {
    let registry = populated(10_000);
    let probe = PathBuf::from("dir_8/asset_5000.slang");
    c.bench_function("registry_path_lookup", |b| {
        b.iter(|| registry.handle_for_path(black_box(&probe)));
    });
}

criterion_group!(benches, bench_register, bench_document_round_trip, bench_path_lookup);
criterion_main!(benches);

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use vantage_blocks::{AIR, BlockRegistry};
use vantage_chunk::{ChunkBlocks, MemoryChunkStore};
use vantage_mesh_cpu::{ChunkNeighborhood, build_chunk_geometry};
use vantage_world::{ChunkKey, NEIGHBORHOOD};

fn neighborhood_with(reg: &BlockRegistry, fill: impl Fn(usize, usize, usize) -> &'static str) -> ChunkNeighborhood {
    let key = ChunkKey::new("bench", 0, 0, 0);
    let store = MemoryChunkStore::new();
    for &(dx, dy, dz) in NEIGHBORHOOD.iter() {
        let k = key.offset(dx, dy, dz);
        store.insert(ChunkBlocks::from_fn(k, |x, y, z| {
            reg.id_by_name(fill(x, y, z)).unwrap_or(AIR)
        }));
    }
    ChunkNeighborhood::gather(&store, &key).unwrap()
}

fn bench_flat(c: &mut Criterion) {
    let reg = BlockRegistry::builtin();
    let neigh = neighborhood_with(&reg, |_, y, _| if y < 8 { "stone" } else if y == 8 { "grass" } else { "air" });
    c.bench_function("chunk_geometry_flat_16", |b| {
        b.iter(|| black_box(build_chunk_geometry(&neigh, &reg)))
    });
}

fn bench_checkerboard(c: &mut Criterion) {
    let reg = BlockRegistry::builtin();
    // worst case: every solid block exposes all six faces
    let neigh = neighborhood_with(&reg, |x, y, z| if (x + y + z) % 2 == 0 { "stone" } else { "air" });
    c.bench_function("chunk_geometry_checkerboard_16", |b| {
        b.iter(|| black_box(build_chunk_geometry(&neigh, &reg)))
    });
}

criterion_group!(benches, bench_flat, bench_checkerboard);
criterion_main!(benches);

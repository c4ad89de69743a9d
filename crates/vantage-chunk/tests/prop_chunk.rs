use proptest::prelude::*;
use vantage_blocks::{AIR, BlockId};
use vantage_chunk::{ChunkBlocks, ChunkStore, MemoryChunkStore};
use vantage_world::{BlockPos, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, CHUNK_VOLUME, ChunkKey};

fn small_i32() -> impl Strategy<Value = i32> {
    -100_000i32..=100_000
}

#[test]
fn idx_is_unique_and_in_range() {
    let mut seen = vec![false; CHUNK_VOLUME];
    for y in 0..CHUNK_SIZE_Y {
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                let i = ChunkBlocks::idx(x, y, z);
                assert!(i < CHUNK_VOLUME);
                assert!(!seen[i]);
                seen[i] = true;
            }
        }
    }
    assert!(seen.into_iter().all(|b| b));
}

#[test]
fn store_reports_loaded_chunks_and_block_ids() {
    let store = MemoryChunkStore::new();
    let key = ChunkKey::new("w", -1, 0, 2);
    store.insert(ChunkBlocks::from_fn(key.clone(), |x, y, _| if y == 0 { 1 + x as BlockId } else { AIR }));
    assert!(store.is_chunk_loaded(&key));
    assert!(!store.is_chunk_loaded(&ChunkKey::new("other", -1, 0, 2)));
    // world x = -16 is local x = 0 of chunk -1
    assert_eq!(store.block_at(&BlockPos::new("w", -16, 0, 32)), Some(1));
    assert_eq!(store.block_at(&BlockPos::new("w", -1, 0, 32)), Some(16));
    assert_eq!(store.block_at(&BlockPos::new("w", -1, 1, 32)), Some(AIR));
    assert_eq!(store.block_at(&BlockPos::new("w", 0, 0, 32)), None);
    assert!(store.remove(&key).is_some());
    assert!(store.is_empty());
}

proptest! {
    // get_local reads from linearized storage at idx
    #[test]
    fn get_local_matches_linear(cx in small_i32(), cz in small_i32()) {
        let blocks: Vec<BlockId> = (0..CHUNK_VOLUME).map(|i| (i % 65535) as BlockId).collect();
        let buf = ChunkBlocks::from_blocks(ChunkKey::new("w", cx, 0, cz), blocks);
        for y in 0..CHUNK_SIZE_Y { for z in 0..CHUNK_SIZE_Z { for x in 0..CHUNK_SIZE_X {
            let i = ChunkBlocks::idx(x, y, z);
            prop_assert_eq!(buf.get_local(x, y, z), buf.as_slice()[i]);
        }}}
    }

    // contains_world agrees with get_world for points in and around the chunk
    #[test]
    fn contains_world_and_get_world_agree(cx in small_i32(), cy in -64i32..64, cz in small_i32(), dx in -1i32..=16, dy in -1i32..=16, dz in -1i32..=16) {
        let key = ChunkKey::new("w", cx, cy, cz);
        let buf = ChunkBlocks::from_fn(key.clone(), |x, y, z| (x + y * 16 + z * 256) as BlockId);
        let (x0, y0, z0) = key.coord.origin();
        let pos = BlockPos::new("w", x0 + dx, y0 + dy, z0 + dz);
        let inside = (0..16).contains(&dx) && (0..16).contains(&dy) && (0..16).contains(&dz);
        prop_assert_eq!(buf.contains_world(&pos), inside);
        match buf.get_world(&pos) {
            Some(id) => {
                prop_assert!(inside);
                prop_assert_eq!(id, (dx + dy * 16 + dz * 256) as BlockId);
            }
            None => prop_assert!(!inside),
        }
        // another world never matches
        prop_assert!(!buf.contains_world(&BlockPos::new("v", x0, y0, z0)));
    }
}

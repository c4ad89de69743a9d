//! Loaded chunk block data and the storage seam the tracker and mesher read from.
#![forbid(unsafe_code)]

mod store;

pub use store::{ChunkStore, MemoryChunkStore};

use std::sync::Arc;

use vantage_blocks::{AIR, BlockId};
use vantage_world::{BlockPos, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, CHUNK_VOLUME, ChunkKey};

/// Block ids of one loaded chunk. Immutable once built; clones share the array.
#[derive(Clone, Debug)]
pub struct ChunkBlocks {
    pub key: ChunkKey,
    blocks: Arc<[BlockId]>,
}

impl ChunkBlocks {
    #[inline]
    pub fn idx(x: usize, y: usize, z: usize) -> usize {
        (y * CHUNK_SIZE_Z + z) * CHUNK_SIZE_X + x
    }

    /// Builds from a linear array in [`ChunkBlocks::idx`] order; short or long input is padded
    /// with air or truncated.
    pub fn from_blocks(key: ChunkKey, blocks: Vec<BlockId>) -> Self {
        let mut b = blocks;
        if b.len() != CHUNK_VOLUME {
            b.resize(CHUNK_VOLUME, AIR);
        }
        ChunkBlocks {
            key,
            blocks: b.into(),
        }
    }

    pub fn filled(key: ChunkKey, id: BlockId) -> Self {
        Self::from_blocks(key, vec![id; CHUNK_VOLUME])
    }

    /// Fills every cell for which `f(x, y, z)` (chunk-local) returns a block id.
    pub fn from_fn(key: ChunkKey, mut f: impl FnMut(usize, usize, usize) -> BlockId) -> Self {
        let mut blocks = vec![AIR; CHUNK_VOLUME];
        for y in 0..CHUNK_SIZE_Y {
            for z in 0..CHUNK_SIZE_Z {
                for x in 0..CHUNK_SIZE_X {
                    blocks[Self::idx(x, y, z)] = f(x, y, z);
                }
            }
        }
        Self::from_blocks(key, blocks)
    }

    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> BlockId {
        self.blocks[Self::idx(x, y, z)]
    }

    #[inline]
    pub fn contains_world(&self, pos: &BlockPos) -> bool {
        self.key.contains(pos)
    }

    pub fn get_world(&self, pos: &BlockPos) -> Option<BlockId> {
        if !self.contains_world(pos) {
            return None;
        }
        let (lx, ly, lz) = pos.local();
        Some(self.get_local(lx, ly, lz))
    }

    /// Shared handle to the raw array, as carried by store payloads.
    #[inline]
    pub fn shared(&self) -> Arc<[BlockId]> {
        Arc::clone(&self.blocks)
    }

    #[inline]
    pub fn as_slice(&self) -> &[BlockId] {
        &self.blocks
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.blocks.iter().any(|b| *b != AIR)
    }

    #[inline]
    pub fn is_all_air(&self) -> bool {
        !self.has_non_air()
    }
}

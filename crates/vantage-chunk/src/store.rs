use std::sync::RwLock;

use hashbrown::HashMap;
use vantage_blocks::BlockId;
use vantage_world::{BlockPos, ChunkKey};

use crate::ChunkBlocks;

/// Read access to loaded chunks. Shared between the main loop and mesh workers.
pub trait ChunkStore: Send + Sync {
    fn chunk_blocks(&self, key: &ChunkKey) -> Option<ChunkBlocks>;

    fn is_chunk_loaded(&self, key: &ChunkKey) -> bool {
        self.chunk_blocks(key).is_some()
    }

    /// Block id at a world position, if its chunk is loaded.
    fn block_at(&self, pos: &BlockPos) -> Option<BlockId> {
        let chunk = self.chunk_blocks(&pos.chunk())?;
        let (x, y, z) = pos.local();
        Some(chunk.get_local(x, y, z))
    }
}

#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<ChunkKey, ChunkBlocks>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous data if the key was already loaded.
    pub fn insert(&self, chunk: ChunkBlocks) -> Option<ChunkBlocks> {
        let mut map = self.chunks.write().unwrap_or_else(|p| p.into_inner());
        let prev = map.insert(chunk.key.clone(), chunk);
        if let Some(prev) = &prev {
            log::warn!("chunk {} replaced while loaded", prev.key);
        }
        prev
    }

    pub fn remove(&self, key: &ChunkKey) -> Option<ChunkBlocks> {
        self.chunks
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(key)
    }

    pub fn loaded_keys(&self) -> Vec<ChunkKey> {
        self.chunks
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkStore for MemoryChunkStore {
    fn chunk_blocks(&self, key: &ChunkKey) -> Option<ChunkBlocks> {
        self.chunks
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    fn is_chunk_loaded(&self, key: &ChunkKey) -> bool {
        self.chunks
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(key)
    }
}

use std::fmt;

use vantage_blocks::{AIR, BlockId};
use vantage_chunk::{ChunkBlocks, ChunkStore};
use vantage_world::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, ChunkKey, NEIGHBORHOOD, NEIGHBORHOOD_CENTER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NeighborhoodError {
    /// A chunk of the 3x3x3 block was not loaded when geometry was requested.
    Missing(ChunkKey),
}

impl fmt::Display for NeighborhoodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeighborhoodError::Missing(key) => write!(f, "neighbor chunk {} is not loaded", key),
        }
    }
}

impl std::error::Error for NeighborhoodError {}

/// True when the chunk and all 26 of its neighbors are loaded.
pub fn can_prepare(store: &dyn ChunkStore, key: &ChunkKey) -> bool {
    NEIGHBORHOOD
        .iter()
        .all(|&(dx, dy, dz)| store.is_chunk_loaded(&key.offset(dx, dy, dz)))
}

/// Snapshot of the 27 chunks needed to mesh the center chunk.
pub struct ChunkNeighborhood {
    pub center: ChunkKey,
    chunks: Vec<ChunkBlocks>,
}

impl ChunkNeighborhood {
    pub fn gather(store: &dyn ChunkStore, center: &ChunkKey) -> Result<Self, NeighborhoodError> {
        let mut chunks = Vec::with_capacity(NEIGHBORHOOD.len());
        for &(dx, dy, dz) in NEIGHBORHOOD.iter() {
            let key = center.offset(dx, dy, dz);
            match store.chunk_blocks(&key) {
                Some(c) => chunks.push(c),
                None => return Err(NeighborhoodError::Missing(key)),
            }
        }
        Ok(Self {
            center: center.clone(),
            chunks,
        })
    }

    #[inline]
    pub fn center_chunk(&self) -> &ChunkBlocks {
        &self.chunks[NEIGHBORHOOD_CENTER]
    }

    /// Block at a position relative to the center chunk's origin. Coordinates may step one
    /// chunk outside the center in any direction; anything further reads as air.
    #[inline]
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> BlockId {
        let (sx, sy, sz) = (CHUNK_SIZE_X as i32, CHUNK_SIZE_Y as i32, CHUNK_SIZE_Z as i32);
        let (dx, dy, dz) = (x.div_euclid(sx), y.div_euclid(sy), z.div_euclid(sz));
        if dx.abs() > 1 || dy.abs() > 1 || dz.abs() > 1 {
            return AIR;
        }
        let sector = (NEIGHBORHOOD_CENTER as i32 + dx * 9 + dy * 3 + dz) as usize;
        self.chunks[sector].get_local(
            x.rem_euclid(sx) as usize,
            y.rem_euclid(sy) as usize,
            z.rem_euclid(sz) as usize,
        )
    }
}

//! View-distance predicate shared by chunk, block and entity relevance.
//!
//! The horizontal test multiplies the absolute x and z deltas and compares the
//! product against `horizontal²`, which yields a diamond/hyperbolic footprint:
//! a chunk straight along one axis stays in view regardless of distance on that
//! axis. The vertical test is a plain `|dy| <= vertical`.

use serde::{Deserialize, Serialize};

use crate::chunk_coord::ChunkCoord;
use crate::pos::{BlockPos, ChunkKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewDistance {
    pub horizontal: i32,
    pub vertical: i32,
}

impl ViewDistance {
    #[inline]
    pub const fn new(horizontal: i32, vertical: i32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}

impl Default for ViewDistance {
    fn default() -> Self {
        Self::new(4, 2)
    }
}

/// World-agnostic relevance test between two chunk coordinates.
#[inline]
pub fn within_view_distance(a: ChunkCoord, b: ChunkCoord, view: ViewDistance) -> bool {
    // Deltas span up to 2^32 - 1; their product still fits in u64.
    let dx = u64::from(a.cx.abs_diff(b.cx));
    let dy = u64::from(a.cy.abs_diff(b.cy));
    let dz = u64::from(a.cz.abs_diff(b.cz));
    let h = u64::from(view.horizontal.unsigned_abs());
    dx * dz <= h * h && u64::try_from(view.vertical).is_ok_and(|v| dy <= v)
}

/// Chunk relevance for an observer standing in `observer_chunk`. Cross-world is never relevant.
#[inline]
pub fn chunk_in_view(chunk: &ChunkKey, observer_chunk: &ChunkKey, view: ViewDistance) -> bool {
    chunk.world == observer_chunk.world && within_view_distance(chunk.coord, observer_chunk.coord, view)
}

/// Block relevance: the containing chunk is tested with the same predicate.
#[inline]
pub fn block_in_view(block: &BlockPos, observer_chunk: &ChunkKey, view: ViewDistance) -> bool {
    block.world == observer_chunk.world
        && within_view_distance(block.chunk_coord(), observer_chunk.coord, view)
}

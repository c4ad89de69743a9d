//! World addressing: world ids, block and chunk coordinates, and view-distance relevance.
#![forbid(unsafe_code)]

mod chunk_coord;
mod pos;
pub mod relevance;

pub use chunk_coord::{ChunkCoord, NEIGHBORHOOD, NEIGHBORHOOD_CENTER};
pub use pos::{BlockPos, ChunkKey, WorldId};
pub use relevance::ViewDistance;

pub const CHUNK_SIZE_X: usize = 16;
pub const CHUNK_SIZE_Y: usize = 16;
pub const CHUNK_SIZE_Z: usize = 16;
pub const CHUNK_VOLUME: usize = CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z;

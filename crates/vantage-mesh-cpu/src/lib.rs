//! CPU chunk geometry: per-texture face lists with neighbor culling across chunk borders.
#![forbid(unsafe_code)]

mod build;
mod chunk;
pub mod face;
mod mesh_build;
mod neighborhood;

pub use build::{build_chunk_geometry, build_chunk_geometry_from_store};
pub use chunk::ChunkGeometry;
pub use face::Face;
pub use mesh_build::MeshBuild;
pub use neighborhood::{ChunkNeighborhood, NeighborhoodError, can_prepare};

use std::fmt;
use std::sync::Arc;

use vantage_blocks::BlockRegistry;
use vantage_chunk::ChunkStore;
use vantage_mesh_cpu::{ChunkGeometry, NeighborhoodError, build_chunk_geometry_from_store};
use vantage_world::ChunkKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A chunk of the neighborhood unloaded after readiness was decided. The mesh goes back to
    /// not-ready; this is not counted as a failure.
    MissingNeighbor(ChunkKey),
    Failed(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::MissingNeighbor(k) => write!(f, "neighbor chunk {} missing", k),
            BuildError::Failed(msg) => write!(f, "geometry build failed: {}", msg),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<NeighborhoodError> for BuildError {
    fn from(value: NeighborhoodError) -> Self {
        match value {
            NeighborhoodError::Missing(k) => BuildError::MissingNeighbor(k),
        }
    }
}

/// Produces CPU geometry for one chunk on a worker thread.
pub trait GeometryBuilder: Send + Sync {
    fn build(&self, key: &ChunkKey, store: &dyn ChunkStore) -> Result<ChunkGeometry, BuildError>;
}

/// Face-culling block mesher backed by a block registry.
pub struct BlockGeometryBuilder {
    reg: Arc<BlockRegistry>,
}

impl BlockGeometryBuilder {
    pub fn new(reg: Arc<BlockRegistry>) -> Self {
        Self { reg }
    }
}

impl GeometryBuilder for BlockGeometryBuilder {
    fn build(&self, key: &ChunkKey, store: &dyn ChunkStore) -> Result<ChunkGeometry, BuildError> {
        Ok(build_chunk_geometry_from_store(store, key, &self.reg)?)
    }
}

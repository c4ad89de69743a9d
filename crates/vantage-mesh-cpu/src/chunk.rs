use std::collections::HashMap;

use vantage_blocks::TextureId;
use vantage_geom::Aabb;
use vantage_world::ChunkKey;

use crate::mesh_build::MeshBuild;

/// Finished CPU geometry for one chunk, one part per texture that has faces.
#[derive(Clone, Debug)]
pub struct ChunkGeometry {
    pub key: ChunkKey,
    pub bbox: Aabb,
    pub parts: HashMap<TextureId, MeshBuild>,
}

impl ChunkGeometry {
    pub fn empty(key: ChunkKey) -> Self {
        let bbox = key.coord.bounds();
        Self {
            key,
            bbox,
            parts: HashMap::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn quad_count(&self) -> usize {
        self.parts.values().map(MeshBuild::quad_count).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.parts.values().map(MeshBuild::vertex_count).sum()
    }
}

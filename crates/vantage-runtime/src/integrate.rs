use vantage_mesh_cpu::ChunkGeometry;
use vantage_world::ChunkKey;

/// Lifecycle notifications for systems that follow meshes (e.g. a renderer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshEvent {
    AfterChunkMeshCreated(ChunkKey),
    BeforeChunkMeshRemoved(ChunkKey),
}

impl MeshEvent {
    pub fn key(&self) -> &ChunkKey {
        match self {
            MeshEvent::AfterChunkMeshCreated(k) | MeshEvent::BeforeChunkMeshRemoved(k) => k,
        }
    }
}

/// Turns finished geometry into a main-thread resource. Never called from a worker, so the
/// resource does not need to be `Send`.
pub trait MeshIntegrator {
    type Resource;

    fn integrate(&mut self, geometry: ChunkGeometry) -> Self::Resource;

    fn dispose(&mut self, key: &ChunkKey, resource: Self::Resource);
}

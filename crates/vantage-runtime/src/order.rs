use vantage_world::{BlockPos, ChunkKey};

/// A mesh eligible for a build: ready, not in flight, no unintegrated result.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub key: &'a ChunkKey,
    /// Monotonic sequence assigned when the mesh became ready for build.
    pub ready_seq: u64,
}

/// Picks which candidate the next idle worker builds. Called under the registry lock.
pub trait MeshGenerationOrder: Send + Sync {
    fn select_next(&self, candidates: &[Candidate<'_>], focus: &[BlockPos]) -> Option<usize>;
}

/// Oldest readiness first.
#[derive(Clone, Copy, Debug, Default)]
pub struct FifoOrder;

impl MeshGenerationOrder for FifoOrder {
    fn select_next(&self, candidates: &[Candidate<'_>], _focus: &[BlockPos]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.ready_seq)
            .map(|(i, _)| i)
    }
}

/// Chunk closest to any focus point in its world first; ties and focus-less worlds fall back
/// to readiness order.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestFocusFirst;

impl NearestFocusFirst {
    fn distance(key: &ChunkKey, focus: &[BlockPos]) -> i64 {
        focus
            .iter()
            .filter(|p| p.world == key.world)
            .map(|p| key.coord.distance_sq(p.chunk_coord()))
            .min()
            .unwrap_or(i64::MAX)
    }
}

impl MeshGenerationOrder for NearestFocusFirst {
    fn select_next(&self, candidates: &[Candidate<'_>], focus: &[BlockPos]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| (Self::distance(c.key, focus), c.ready_seq))
            .map(|(i, _)| i)
    }
}

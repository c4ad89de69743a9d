use hashbrown::HashSet;
use vantage_world::{BlockPos, ChunkKey, ViewDistance};

use crate::ids::{EntityId, ObserverId};

/// Tracking state owned per connected observer.
#[derive(Debug, Clone)]
pub struct ObserverState {
    pub id: ObserverId,
    pub position: BlockPos,
    pub view: ViewDistance,
    /// Chunks whose payload has been sent and not yet removed.
    pub transmitted: HashSet<ChunkKey>,
    pub relevant: HashSet<EntityId>,
}

impl ObserverState {
    pub fn new(id: ObserverId, position: BlockPos, view: ViewDistance) -> Self {
        Self {
            id,
            position,
            view,
            transmitted: HashSet::new(),
            relevant: HashSet::new(),
        }
    }

    #[inline]
    pub fn chunk(&self) -> ChunkKey {
        self.position.chunk()
    }

    /// Sorted snapshot of the transmitted chunk keys.
    pub fn transmitted_sorted(&self) -> Vec<ChunkKey> {
        let mut v: Vec<ChunkKey> = self.transmitted.iter().cloned().collect();
        v.sort();
        v
    }
}

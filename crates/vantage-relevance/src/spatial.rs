use hashbrown::{HashMap, HashSet};
use vantage_world::{BlockPos, ChunkKey, WorldId};

use crate::ids::EntityId;

/// Closed classification of everything the tracker reasons about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpatialKind {
    /// A loaded chunk.
    Chunk(ChunkKey),
    /// A single block entity at a fixed position.
    Block(BlockPos),
    /// One per world; relevant to every observer inside that world.
    WorldMarker(WorldId),
    /// The multiverse entity; relevant to every observer.
    GlobalMarker,
    /// A moving location-tagged entity announced to nearby observers.
    Broadcast(BlockPos),
}

impl SpatialKind {
    /// Chunk whose relevance carries this entity along, if it is chunk-bound.
    pub fn chunk(&self) -> Option<ChunkKey> {
        match self {
            SpatialKind::Chunk(k) => Some(k.clone()),
            SpatialKind::Block(p) | SpatialKind::Broadcast(p) => Some(p.chunk()),
            SpatialKind::WorldMarker(_) | SpatialKind::GlobalMarker => None,
        }
    }
}

/// Entities grouped by category, with block and broadcast entities bucketed by chunk.
#[derive(Default, Debug)]
pub struct SpatialIndex {
    kinds: HashMap<EntityId, SpatialKind>,
    chunks: HashMap<ChunkKey, EntityId>,
    contents: HashMap<ChunkKey, HashSet<EntityId>>,
    worlds: HashMap<WorldId, HashSet<EntityId>>,
    globals: HashSet<EntityId>,
    broadcast: HashSet<EntityId>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn kind(&self, id: EntityId) -> Option<&SpatialKind> {
        self.kinds.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.kinds.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Adds or reclassifies an entity. Returns the previous kind.
    pub fn insert(&mut self, id: EntityId, kind: SpatialKind) -> Option<SpatialKind> {
        let prev = self.remove(id);
        match &kind {
            SpatialKind::Chunk(key) => {
                if let Some(old) = self.chunks.insert(key.clone(), id) {
                    // A second entity claimed the same chunk; the older one stops being indexed.
                    log::warn!("chunk {} re-registered: {} replaces {}", key, id, old);
                    self.kinds.remove(&old);
                }
            }
            SpatialKind::Block(pos) => {
                self.contents.entry(pos.chunk()).or_default().insert(id);
            }
            SpatialKind::Broadcast(pos) => {
                self.contents.entry(pos.chunk()).or_default().insert(id);
                self.broadcast.insert(id);
            }
            SpatialKind::WorldMarker(w) => {
                self.worlds.entry(w.clone()).or_default().insert(id);
            }
            SpatialKind::GlobalMarker => {
                self.globals.insert(id);
            }
        }
        self.kinds.insert(id, kind);
        prev
    }

    pub fn remove(&mut self, id: EntityId) -> Option<SpatialKind> {
        let kind = self.kinds.remove(&id)?;
        match &kind {
            SpatialKind::Chunk(key) => {
                if self.chunks.get(key) == Some(&id) {
                    self.chunks.remove(key);
                }
            }
            SpatialKind::Block(pos) => self.unbucket(&pos.chunk(), id),
            SpatialKind::Broadcast(pos) => {
                self.unbucket(&pos.chunk(), id);
                self.broadcast.remove(&id);
            }
            SpatialKind::WorldMarker(w) => {
                if let Some(set) = self.worlds.get_mut(w) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.worlds.remove(w);
                    }
                }
            }
            SpatialKind::GlobalMarker => {
                self.globals.remove(&id);
            }
        }
        Some(kind)
    }

    fn unbucket(&mut self, chunk: &ChunkKey, id: EntityId) {
        if let Some(set) = self.contents.get_mut(chunk) {
            set.remove(&id);
            if set.is_empty() {
                self.contents.remove(chunk);
            }
        }
    }

    #[inline]
    pub fn chunk_entity(&self, key: &ChunkKey) -> Option<EntityId> {
        self.chunks.get(key).copied()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Loaded chunk entities in every world.
    pub fn chunk_entities(&self) -> impl Iterator<Item = (&ChunkKey, EntityId)> + '_ {
        self.chunks.iter().map(|(k, e)| (k, *e))
    }

    /// Block and broadcast entities inside `key`.
    pub fn contents_of(&self, key: &ChunkKey) -> impl Iterator<Item = EntityId> + '_ {
        self.contents.get(key).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Chunks that hold at least one block or broadcast entity.
    pub fn occupied_chunks(&self) -> impl Iterator<Item = &ChunkKey> + '_ {
        self.contents.keys()
    }

    pub fn world_markers(&self, world: &WorldId) -> impl Iterator<Item = EntityId> + '_ {
        self.worlds.get(world).into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn global_markers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.globals.iter().copied()
    }

    pub fn broadcast_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.broadcast.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_follow_reclassification() {
        let mut idx = SpatialIndex::new();
        let e = EntityId(7);
        idx.insert(e, SpatialKind::Broadcast(BlockPos::new("w", 1, 1, 1)));
        let c0 = ChunkKey::new("w", 0, 0, 0);
        let c1 = ChunkKey::new("w", 1, 0, 0);
        assert_eq!(idx.contents_of(&c0).collect::<Vec<_>>(), vec![e]);

        let prev = idx.insert(e, SpatialKind::Broadcast(BlockPos::new("w", 17, 1, 1)));
        assert!(matches!(prev, Some(SpatialKind::Broadcast(_))));
        assert_eq!(idx.contents_of(&c0).count(), 0);
        assert_eq!(idx.contents_of(&c1).collect::<Vec<_>>(), vec![e]);
        assert_eq!(idx.occupied_chunks().count(), 1);

        idx.remove(e);
        assert!(idx.is_empty());
        assert_eq!(idx.broadcast_entities().count(), 0);
        assert_eq!(idx.occupied_chunks().count(), 0);
    }

    #[test]
    fn markers_are_grouped_by_world() {
        let mut idx = SpatialIndex::new();
        idx.insert(EntityId(1), SpatialKind::GlobalMarker);
        idx.insert(EntityId(2), SpatialKind::WorldMarker("a".into()));
        idx.insert(EntityId(3), SpatialKind::WorldMarker("b".into()));
        idx.insert(EntityId(4), SpatialKind::Chunk(ChunkKey::new("a", 0, 0, 0)));
        assert_eq!(idx.global_markers().collect::<Vec<_>>(), vec![EntityId(1)]);
        assert_eq!(idx.world_markers(&"a".into()).collect::<Vec<_>>(), vec![EntityId(2)]);
        assert_eq!(idx.chunk_entity(&ChunkKey::new("a", 0, 0, 0)), Some(EntityId(4)));
        assert_eq!(idx.chunk_entity(&ChunkKey::new("b", 0, 0, 0)), None);
    }
}

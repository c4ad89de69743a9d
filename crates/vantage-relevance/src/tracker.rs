use std::fmt;

use hashbrown::{HashMap, HashSet};
use vantage_chunk::{ChunkBlocks, ChunkStore};
use vantage_world::relevance::{block_in_view, chunk_in_view};
use vantage_world::{BlockPos, ChunkKey, ViewDistance};

use crate::ids::{EntityId, ObserverId};
use crate::listener::{ListenerHandle, ListenerRegistry, RelevanceListener};
use crate::observer::ObserverState;
use crate::payload::{ChunkPayload, ObserverSink, RemoveChunk, StoreChunk};
use crate::spatial::{SpatialIndex, SpatialKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    UnknownObserver(ObserverId),
    ObserverAlreadyConnected(ObserverId),
    UnknownEntity(EntityId),
    EntityAlreadyTracked(EntityId),
    /// Only block and broadcast entities carry a position that can move.
    NotMovable(EntityId),
    ChunkAlreadyLoaded(ChunkKey),
    ChunkNotLoaded(ChunkKey),
    /// The chunk store had no block data for a chunk announced as loaded.
    ChunkDataMissing(ChunkKey),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::UnknownObserver(o) => write!(f, "observer {} is not connected", o),
            TrackerError::ObserverAlreadyConnected(o) => {
                write!(f, "observer {} is already connected", o)
            }
            TrackerError::UnknownEntity(e) => write!(f, "entity {} is not tracked", e),
            TrackerError::EntityAlreadyTracked(e) => write!(f, "entity {} is already tracked", e),
            TrackerError::NotMovable(e) => write!(f, "entity {} has no movable position", e),
            TrackerError::ChunkAlreadyLoaded(k) => write!(f, "chunk {} is already loaded", k),
            TrackerError::ChunkNotLoaded(k) => write!(f, "chunk {} is not loaded", k),
            TrackerError::ChunkDataMissing(k) => write!(f, "no block data for chunk {}", k),
        }
    }
}

impl std::error::Error for TrackerError {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub observers: usize,
    pub entities: usize,
    pub loaded_chunks: usize,
    pub transmitted_chunks: usize,
    pub stores_sent: u64,
    pub removes_sent: u64,
    pub notifications: u64,
    pub relocations: u64,
}

#[derive(Default)]
struct Counters {
    stores_sent: u64,
    removes_sent: u64,
    notifications: u64,
    relocations: u64,
}

/// Owns every observer's relevant set and announces only the deltas.
///
/// A chunk entity is relevant to an observer when the chunk is loaded, in the observer's world
/// and within its view distance. Block and broadcast entities are relevant when their containing
/// chunk is in view. World markers are relevant inside their world; global markers always.
/// The set of chunks transmitted to an observer always equals its relevant loaded chunks.
#[derive(Default)]
pub struct RelevanceTracker {
    index: SpatialIndex,
    observers: HashMap<ObserverId, ObserverState>,
    listeners: ListenerRegistry,
    counters: Counters,
}

struct Desired {
    relevant: HashSet<EntityId>,
    chunks: HashMap<ChunkKey, ChunkBlocks>,
}

impl RelevanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(
        &mut self,
        priority: i32,
        listener: Box<dyn RelevanceListener>,
    ) -> ListenerHandle {
        self.listeners.add(priority, listener)
    }

    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        self.listeners.remove(handle)
    }

    #[inline]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    #[inline]
    pub fn observer(&self, id: ObserverId) -> Option<&ObserverState> {
        self.observers.get(&id)
    }

    pub fn observers(&self) -> impl Iterator<Item = &ObserverState> + '_ {
        self.observers.values()
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            observers: self.observers.len(),
            entities: self.index.len(),
            loaded_chunks: self.index.chunk_count(),
            transmitted_chunks: self.observers.values().map(|o| o.transmitted.len()).sum(),
            stores_sent: self.counters.stores_sent,
            removes_sent: self.counters.removes_sent,
            notifications: self.counters.notifications,
            relocations: self.counters.relocations,
        }
    }

    fn sorted_observer_ids(&self) -> Vec<ObserverId> {
        let mut ids: Vec<ObserverId> = self.observers.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Per-entity relevance rule, without consulting the chunk store.
    pub fn is_entity_relevant(
        &self,
        observer: ObserverId,
        entity: EntityId,
    ) -> Result<bool, TrackerError> {
        let obs = self
            .observers
            .get(&observer)
            .ok_or(TrackerError::UnknownObserver(observer))?;
        let kind = self
            .index
            .kind(entity)
            .ok_or(TrackerError::UnknownEntity(entity))?;
        Ok(kind_in_view(kind, &obs.position, obs.view))
    }

    fn compute_desired(&self, pos: &BlockPos, view: ViewDistance, store: &dyn ChunkStore) -> Desired {
        let observer_chunk = pos.chunk();
        let mut relevant: HashSet<EntityId> = self.index.global_markers().collect();
        relevant.extend(self.index.world_markers(&pos.world));
        let mut chunks = HashMap::new();
        for (key, entity) in self.index.chunk_entities() {
            if !chunk_in_view(key, &observer_chunk, view) {
                continue;
            }
            match store.chunk_blocks(key) {
                Some(blocks) => {
                    relevant.insert(entity);
                    chunks.insert(key.clone(), blocks);
                }
                None => log::debug!("chunk {} indexed but has no block data; skipped", key),
            }
        }
        for key in self.index.occupied_chunks() {
            if chunk_in_view(key, &observer_chunk, view) {
                relevant.extend(self.index.contents_of(key));
            }
        }
        Desired { relevant, chunks }
    }

    /// Replaces an observer's relevant set with `desired`: one listener call with the symmetric
    /// difference, then removals, then stores.
    fn apply_desired(&mut self, id: ObserverId, desired: Desired, sink: &mut dyn ObserverSink) {
        let Some(obs) = self.observers.get_mut(&id) else {
            return;
        };
        let mut changed: Vec<EntityId> = obs
            .relevant
            .symmetric_difference(&desired.relevant)
            .copied()
            .collect();
        changed.sort();
        let mut removes: Vec<ChunkKey> = obs
            .transmitted
            .iter()
            .filter(|k| !desired.chunks.contains_key(*k))
            .cloned()
            .collect();
        removes.sort();
        let mut stores: Vec<(ChunkKey, ChunkBlocks)> = desired
            .chunks
            .into_iter()
            .filter(|(k, _)| !obs.transmitted.contains(k))
            .collect();
        stores.sort_by(|a, b| a.0.cmp(&b.0));
        obs.relevant = desired.relevant;

        if !changed.is_empty() {
            self.counters.notifications += 1;
            self.listeners.notify(id, &changed);
        }
        for key in removes {
            forget_transmitted(obs, &key);
            log::debug!("remove chunk {} -> {}", key, id);
            self.counters.removes_sent += 1;
            sink.deliver(id, ChunkPayload::Remove(RemoveChunk { key }));
        }
        for (key, blocks) in stores {
            record_transmitted(obs, &key);
            log::debug!("store chunk {} -> {}", key, id);
            self.counters.stores_sent += 1;
            sink.deliver(
                id,
                ChunkPayload::Store(StoreChunk {
                    key,
                    blocks: blocks.shared(),
                }),
            );
        }
    }

    pub fn observer_connected(
        &mut self,
        id: ObserverId,
        position: BlockPos,
        view: ViewDistance,
        store: &dyn ChunkStore,
        sink: &mut dyn ObserverSink,
    ) -> Result<(), TrackerError> {
        if self.observers.contains_key(&id) {
            return Err(TrackerError::ObserverAlreadyConnected(id));
        }
        log::info!("observer {} connected at {:?} view {:?}", id, position, view);
        let desired = self.compute_desired(&position, view, store);
        self.observers
            .insert(id, ObserverState::new(id, position, view));
        self.apply_desired(id, desired, sink);
        Ok(())
    }

    /// Drops all tracking for the observer. Nothing is sent.
    pub fn observer_disconnected(&mut self, id: ObserverId) -> Result<ObserverState, TrackerError> {
        let state = self
            .observers
            .remove(&id)
            .ok_or(TrackerError::UnknownObserver(id))?;
        log::info!(
            "observer {} disconnected ({} chunks transmitted)",
            id,
            state.transmitted.len()
        );
        Ok(state)
    }

    /// Location update. Staying in the same chunk does no relevance work. Moving to another
    /// world tears the old world's relevant set down and rebuilds it in the new world.
    pub fn observer_moved(
        &mut self,
        id: ObserverId,
        position: BlockPos,
        store: &dyn ChunkStore,
        sink: &mut dyn ObserverSink,
    ) -> Result<(), TrackerError> {
        let obs = self
            .observers
            .get_mut(&id)
            .ok_or(TrackerError::UnknownObserver(id))?;
        let old = std::mem::replace(&mut obs.position, position.clone());
        let view = obs.view;
        if old.world != position.world {
            log::info!(
                "observer {} relocating {} -> {}; rebuilding relevant set",
                id,
                old.world,
                position.world
            );
            self.counters.relocations += 1;
        } else if old.chunk_coord() == position.chunk_coord() {
            return Ok(());
        }
        let desired = self.compute_desired(&position, view, store);
        self.apply_desired(id, desired, sink);
        Ok(())
    }

    pub fn set_view_distance(
        &mut self,
        id: ObserverId,
        view: ViewDistance,
        store: &dyn ChunkStore,
        sink: &mut dyn ObserverSink,
    ) -> Result<(), TrackerError> {
        let obs = self
            .observers
            .get_mut(&id)
            .ok_or(TrackerError::UnknownObserver(id))?;
        if obs.view == view {
            return Ok(());
        }
        obs.view = view;
        let position = obs.position.clone();
        let desired = self.compute_desired(&position, view, store);
        self.apply_desired(id, desired, sink);
        Ok(())
    }

    /// A chunk finished loading; its block data must already be in `store`.
    pub fn chunk_loaded(
        &mut self,
        entity: EntityId,
        key: ChunkKey,
        store: &dyn ChunkStore,
        sink: &mut dyn ObserverSink,
    ) -> Result<(), TrackerError> {
        if self.index.chunk_entity(&key).is_some() {
            return Err(TrackerError::ChunkAlreadyLoaded(key));
        }
        if self.index.contains(entity) {
            return Err(TrackerError::EntityAlreadyTracked(entity));
        }
        let blocks = store
            .chunk_blocks(&key)
            .ok_or_else(|| TrackerError::ChunkDataMissing(key.clone()))?;
        self.index.insert(entity, SpatialKind::Chunk(key.clone()));
        let contents: Vec<EntityId> = self.index.contents_of(&key).collect();

        for id in self.sorted_observer_ids() {
            let Some(obs) = self.observers.get_mut(&id) else {
                continue;
            };
            if !chunk_in_view(&key, &obs.chunk(), obs.view) {
                continue;
            }
            let mut changed = vec![entity];
            obs.relevant.insert(entity);
            for e in &contents {
                if obs.relevant.insert(*e) {
                    changed.push(*e);
                }
            }
            changed.sort();
            self.counters.notifications += 1;
            self.listeners.notify(id, &changed);
            record_transmitted(obs, &key);
            log::debug!("store chunk {} -> {}", key, id);
            self.counters.stores_sent += 1;
            sink.deliver(
                id,
                ChunkPayload::Store(StoreChunk {
                    key: key.clone(),
                    blocks: blocks.shared(),
                }),
            );
        }
        Ok(())
    }

    /// A chunk unloaded. Observers holding it get `RemoveChunk`. Block and broadcast entities
    /// inside keep their own relevance.
    pub fn chunk_unloaded(
        &mut self,
        key: &ChunkKey,
        sink: &mut dyn ObserverSink,
    ) -> Result<EntityId, TrackerError> {
        let entity = self
            .index
            .chunk_entity(key)
            .ok_or_else(|| TrackerError::ChunkNotLoaded(key.clone()))?;
        self.index.remove(entity);
        for id in self.sorted_observer_ids() {
            let Some(obs) = self.observers.get_mut(&id) else {
                continue;
            };
            let was_relevant = obs.relevant.remove(&entity);
            let was_sent = obs.transmitted.contains(key);
            if was_relevant {
                self.counters.notifications += 1;
                self.listeners.notify(id, &[entity]);
            }
            if was_sent {
                forget_transmitted(obs, key);
                log::debug!("remove chunk {} -> {}", key, id);
                self.counters.removes_sent += 1;
                sink.deliver(id, ChunkPayload::Remove(RemoveChunk { key: key.clone() }));
            }
        }
        Ok(entity)
    }

    /// Registers a non-observer entity. Chunk kinds go through [`Self::chunk_loaded`].
    pub fn entity_added(
        &mut self,
        entity: EntityId,
        kind: SpatialKind,
        store: &dyn ChunkStore,
        sink: &mut dyn ObserverSink,
    ) -> Result<(), TrackerError> {
        if let SpatialKind::Chunk(key) = kind {
            return self.chunk_loaded(entity, key, store, sink);
        }
        if self.index.contains(entity) {
            return Err(TrackerError::EntityAlreadyTracked(entity));
        }
        for id in self.sorted_observer_ids() {
            let Some(obs) = self.observers.get_mut(&id) else {
                continue;
            };
            if kind_in_view(&kind, &obs.position, obs.view) && obs.relevant.insert(entity) {
                self.counters.notifications += 1;
                self.listeners.notify(id, &[entity]);
            }
        }
        self.index.insert(entity, kind);
        Ok(())
    }

    pub fn entity_removed(
        &mut self,
        entity: EntityId,
        sink: &mut dyn ObserverSink,
    ) -> Result<SpatialKind, TrackerError> {
        match self.index.kind(entity) {
            None => return Err(TrackerError::UnknownEntity(entity)),
            Some(SpatialKind::Chunk(key)) => {
                let key = key.clone();
                self.chunk_unloaded(&key, sink)?;
                return Ok(SpatialKind::Chunk(key));
            }
            Some(_) => {}
        }
        let kind = self
            .index
            .remove(entity)
            .ok_or(TrackerError::UnknownEntity(entity))?;
        for id in self.sorted_observer_ids() {
            if let Some(obs) = self.observers.get_mut(&id) {
                if obs.relevant.remove(&entity) {
                    self.counters.notifications += 1;
                    self.listeners.notify(id, &[entity]);
                }
            }
        }
        Ok(kind)
    }

    /// Moves a block or broadcast entity. Broadcast entities that change chunk or world notify
    /// every connected observer; relevant sets are still updated exactly.
    pub fn entity_moved(&mut self, entity: EntityId, to: BlockPos) -> Result<(), TrackerError> {
        let (old, broadcast) = match self.index.kind(entity) {
            None => return Err(TrackerError::UnknownEntity(entity)),
            Some(SpatialKind::Broadcast(p)) => (p.clone(), true),
            Some(SpatialKind::Block(p)) => (p.clone(), false),
            Some(_) => return Err(TrackerError::NotMovable(entity)),
        };
        let crossed = old.world != to.world || old.chunk_coord() != to.chunk_coord();
        let kind = if broadcast {
            SpatialKind::Broadcast(to)
        } else {
            SpatialKind::Block(to)
        };
        if !crossed {
            self.index.insert(entity, kind);
            return Ok(());
        }
        for id in self.sorted_observer_ids() {
            let Some(obs) = self.observers.get_mut(&id) else {
                continue;
            };
            let now = kind_in_view(&kind, &obs.position, obs.view);
            let flipped = if now {
                obs.relevant.insert(entity)
            } else {
                obs.relevant.remove(&entity)
            };
            if flipped || broadcast {
                self.counters.notifications += 1;
                self.listeners.notify(id, &[entity]);
            }
        }
        self.index.insert(entity, kind);
        Ok(())
    }
}

fn kind_in_view(kind: &SpatialKind, position: &BlockPos, view: ViewDistance) -> bool {
    match kind {
        SpatialKind::Chunk(key) => chunk_in_view(key, &position.chunk(), view),
        SpatialKind::Block(p) | SpatialKind::Broadcast(p) => block_in_view(p, &position.chunk(), view),
        SpatialKind::WorldMarker(w) => *w == position.world,
        SpatialKind::GlobalMarker => true,
    }
}

fn record_transmitted(obs: &mut ObserverState, key: &ChunkKey) {
    if !obs.transmitted.insert(key.clone()) {
        log::error!(
            "observer {}: chunk {} stored twice without a removal; relevance bookkeeping is out of sync",
            obs.id,
            key
        );
        panic!("chunk {} already transmitted to observer {}", key, obs.id);
    }
}

fn forget_transmitted(obs: &mut ObserverState, key: &ChunkKey) {
    if !obs.transmitted.remove(key) {
        log::error!(
            "observer {}: removing chunk {} that was never transmitted; relevance bookkeeping is out of sync",
            obs.id,
            key
        );
        panic!("failed to remove chunk {} from observer {}: no transmission record", key, obs.id);
    }
}

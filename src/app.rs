use std::cell::Cell;
use std::error::Error;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::{HashMap, HashSet};
use vantage_blocks::BlockRegistry;
use vantage_chunk::MemoryChunkStore;
use vantage_mesh_cpu::ChunkGeometry;
use vantage_relevance::{
    ChunkLoadRule, ChunkPayload, EntityId, ObserverId, RelevanceTracker, TrackerStats,
};
use vantage_runtime::{
    BlockGeometryBuilder, FifoOrder, MeshEvent, MeshGenerationOrder, MeshIntegrator, MeshPipeline,
    NearestFocusFirst, PipelineStats,
};
use vantage_world::{BlockPos, ChunkKey, WorldId};

use crate::config::{OrderKind, ServerConfig};
use crate::event::{Event, EventEnvelope, EventQueue};
use crate::terrain::FlatTerrain;

/// What a renderer would keep after uploading a chunk mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshSummary {
    pub parts: usize,
    pub quads: usize,
}

/// Integration without a GPU: counts what would have been uploaded.
#[derive(Debug, Default)]
pub struct HeadlessIntegrator {
    pub integrated: u64,
    pub disposed: u64,
    pub live_parts: usize,
    pub live_quads: usize,
}

impl MeshIntegrator for HeadlessIntegrator {
    type Resource = MeshSummary;

    fn integrate(&mut self, geometry: ChunkGeometry) -> MeshSummary {
        let summary = MeshSummary {
            parts: geometry.parts.len(),
            quads: geometry.quad_count(),
        };
        self.integrated += 1;
        self.live_parts += summary.parts;
        self.live_quads += summary.quads;
        summary
    }

    fn dispose(&mut self, _key: &ChunkKey, resource: MeshSummary) {
        self.disposed += 1;
        self.live_parts = self.live_parts.saturating_sub(resource.parts);
        self.live_quads = self.live_quads.saturating_sub(resource.quads);
    }
}

const WALK_DIRS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Scripted observer: one block along `step` every `every` ticks.
struct Walker {
    id: ObserverId,
    origin: BlockPos,
    step: (i32, i32),
    every: u64,
}

impl Walker {
    fn position_at(&self, tick: u64) -> BlockPos {
        let n = i32::try_from(tick / self.every).unwrap_or(i32::MAX);
        BlockPos::new(
            self.origin.world.clone(),
            self.origin.x.saturating_add(self.step.0.saturating_mul(n)),
            self.origin.y,
            self.origin.z.saturating_add(self.step.1.saturating_mul(n)),
        )
    }
}

/// Client-side view of what was sent, rebuilt from the payload stream.
#[derive(Debug, Default)]
struct Replica {
    chunks: HashSet<ChunkKey>,
    stores: u64,
    removes: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct RunSummary {
    pub ticks: u64,
    pub tracker: TrackerStats,
    pub pipeline: PipelineStats,
    pub relevance_changes: u64,
    pub mesh_events: u64,
    pub replica_anomalies: u64,
}

/// Headless authority loop: observers walk, chunks stream in and out around them, the tracker
/// keeps every replica in sync and the mesh pipeline builds geometry for loaded chunks.
pub struct App {
    cfg: ServerConfig,
    store: Arc<MemoryChunkStore>,
    terrain: FlatTerrain,
    tracker: RelevanceTracker,
    pipeline: MeshPipeline<HeadlessIntegrator>,
    load_rule: ChunkLoadRule,
    queue: EventQueue,
    walkers: Vec<Walker>,
    chunk_entities: HashMap<ChunkKey, EntityId>,
    next_entity: u64,
    load_dirty: bool,
    payload_tx: Sender<(ObserverId, ChunkPayload)>,
    payload_rx: Receiver<(ObserverId, ChunkPayload)>,
    replicas: HashMap<ObserverId, Replica>,
    relevance_changes: Rc<Cell<u64>>,
    mesh_events: u64,
    replica_anomalies: u64,
}

impl App {
    pub fn new(cfg: ServerConfig, reg: Arc<BlockRegistry>) -> Result<Self, Box<dyn Error>> {
        let store = Arc::new(MemoryChunkStore::new());
        let order: Arc<dyn MeshGenerationOrder> = match cfg.mesh.order {
            OrderKind::Fifo => Arc::new(FifoOrder),
            OrderKind::Nearest => Arc::new(NearestFocusFirst),
        };
        let pipeline = MeshPipeline::new(
            cfg.pipeline_config(),
            store.clone(),
            Arc::new(BlockGeometryBuilder::new(reg.clone())),
            order,
            HeadlessIntegrator::default(),
        )?;

        let mut tracker = RelevanceTracker::new();
        let relevance_changes = Rc::new(Cell::new(0u64));
        let counter = relevance_changes.clone();
        tracker.add_listener(
            0,
            Box::new(move |_observer: ObserverId, changed: &[EntityId]| {
                counter.set(counter.get() + changed.len() as u64);
            }),
        );

        let world = WorldId::new(&cfg.world.id);
        let mut queue = EventQueue::new();
        let mut walkers = Vec::new();
        for i in 0..cfg.sim.observers {
            let id = ObserverId(u64::from(i) + 1);
            let origin = BlockPos::new(world.clone(), i as i32 * 48, cfg.world.ground_height, 0);
            queue.emit_now(Event::ObserverConnected {
                id,
                at: origin.clone(),
            });
            walkers.push(Walker {
                id,
                origin,
                step: WALK_DIRS[i as usize % WALK_DIRS.len()],
                every: 2,
            });
        }

        let (payload_tx, payload_rx) = unbounded();
        Ok(Self {
            terrain: FlatTerrain::new(&reg, cfg.world.ground_height),
            load_rule: cfg.load_rule(),
            cfg,
            store,
            tracker,
            pipeline,
            queue,
            walkers,
            chunk_entities: HashMap::new(),
            next_entity: 1,
            load_dirty: false,
            payload_tx,
            payload_rx,
            replicas: HashMap::new(),
            relevance_changes,
            mesh_events: 0,
            replica_anomalies: 0,
        })
    }

    /// Runs `ticks` ticks, paced to `sim.tick_ms` when `paced` is set, then disconnects every
    /// observer. The summary is taken before the disconnects.
    pub fn run(&mut self, ticks: u64, paced: bool) -> Result<RunSummary, Box<dyn Error>> {
        let tick_len = Duration::from_millis(self.cfg.sim.tick_ms);
        for _ in 0..ticks {
            let start = Instant::now();
            self.step()?;
            if paced {
                if let Some(rest) = tick_len.checked_sub(start.elapsed()) {
                    thread::sleep(rest);
                }
            }
        }
        self.verify_replicas();
        let summary = self.summary(ticks);
        for w in self.walkers.drain(..) {
            self.queue.emit_now(Event::ObserverDisconnected { id: w.id });
        }
        self.step()?;
        self.pipeline.shutdown();
        Ok(summary)
    }

    pub fn step(&mut self) -> Result<(), Box<dyn Error>> {
        let tick = self.queue.now;
        if tick > 0 {
            for w in &self.walkers {
                if tick % w.every == 0 && self.tracker.observer(w.id).is_some() {
                    self.queue.emit_now(Event::ObserverMoved {
                        id: w.id,
                        to: w.position_at(tick),
                    });
                }
            }
        }
        let rebuild_every = self.cfg.sim.rebuild_every;
        if rebuild_every > 0 && tick > 0 && tick % rebuild_every == 0 {
            let mut keys: Vec<ChunkKey> = self.tracker.observers().map(|o| o.chunk()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                self.request_rebuild(key);
            }
        }
        self.queue.emit_now(Event::Tick);

        let mut processed = 0usize;
        let max_events = 200_000usize;
        while let Some(env) = self.queue.pop_ready() {
            self.handle_event(env)?;
            processed += 1;
            if processed >= max_events {
                log::warn!("[tick {}] event budget exhausted; {} carried over", tick, self.queue.pending());
                break;
            }
        }
        self.drain_payloads();
        let every = self.cfg.sim.stats_every;
        if every > 0 && tick % every == 0 {
            self.log_stats(tick);
        }
        self.queue.advance_tick();
        Ok(())
    }

    fn handle_event(&mut self, env: EventEnvelope) -> Result<(), Box<dyn Error>> {
        Self::log_event(env.tick, &env.kind);
        match env.kind {
            Event::Tick => self.mesh_tick(),
            Event::ObserverConnected { id, at } => {
                self.tracker.observer_connected(
                    id,
                    at,
                    self.cfg.view_distance(),
                    self.store.as_ref(),
                    &mut self.payload_tx,
                )?;
                self.replicas.entry(id).or_default();
                self.mark_load_dirty();
            }
            Event::ObserverMoved { id, to } => {
                let before = self.tracker.observer(id).map(|o| o.chunk());
                self.tracker
                    .observer_moved(id, to, self.store.as_ref(), &mut self.payload_tx)?;
                if before != self.tracker.observer(id).map(|o| o.chunk()) {
                    self.mark_load_dirty();
                }
            }
            Event::ObserverDisconnected { id } => {
                self.tracker.observer_disconnected(id)?;
                self.replicas.remove(&id);
                self.mark_load_dirty();
            }
            Event::LoadSetChanged => {
                self.load_dirty = false;
                self.refresh_load_set();
            }
            Event::EnsureChunkLoaded { key } => self.load_chunk(key)?,
            Event::EnsureChunkUnloaded { key } => self.unload_chunk(&key)?,
            Event::ChunkRebuildRequested { key } => {
                if !self.pipeline.request_rebuild(&key) {
                    log::debug!("rebuild of {} ignored; mesh not ready", key);
                }
            }
        }
        Ok(())
    }

    fn mark_load_dirty(&mut self) {
        if !self.load_dirty {
            self.load_dirty = true;
            self.queue.emit_now(Event::LoadSetChanged);
        }
    }

    fn refresh_load_set(&mut self) {
        let desired = self
            .load_rule
            .relevant_chunks(self.tracker.observers().map(|o| &o.position));
        let mut unload: Vec<ChunkKey> = self
            .chunk_entities
            .keys()
            .filter(|k| !desired.contains(*k))
            .cloned()
            .collect();
        let mut load: Vec<ChunkKey> = desired
            .into_iter()
            .filter(|k| !self.chunk_entities.contains_key(k))
            .collect();
        unload.sort();
        load.sort();
        for key in unload {
            self.queue.emit_now(Event::EnsureChunkUnloaded { key });
        }
        for key in load {
            self.queue.emit_now(Event::EnsureChunkLoaded { key });
        }
    }

    fn load_chunk(&mut self, key: ChunkKey) -> Result<(), Box<dyn Error>> {
        if self.chunk_entities.contains_key(&key) {
            return Ok(());
        }
        self.store.insert(self.terrain.chunk(&key));
        let entity = EntityId(self.next_entity);
        self.next_entity += 1;
        self.tracker
            .chunk_loaded(entity, key.clone(), self.store.as_ref(), &mut self.payload_tx)?;
        self.chunk_entities.insert(key.clone(), entity);
        self.pipeline.chunk_loaded(key);
        Ok(())
    }

    fn unload_chunk(&mut self, key: &ChunkKey) -> Result<(), Box<dyn Error>> {
        if self.chunk_entities.remove(key).is_none() {
            return Ok(());
        }
        self.tracker.chunk_unloaded(key, &mut self.payload_tx)?;
        self.pipeline.chunk_unloaded(key);
        self.store.remove(key);
        Ok(())
    }

    fn mesh_tick(&mut self) {
        let focus: Vec<BlockPos> = self.tracker.observers().map(|o| o.position.clone()).collect();
        self.pipeline.set_focus_points(focus);
        let integrated = self.pipeline.tick();
        if self.pipeline.worker_count() == 0 {
            let budget = 64;
            for _ in 0..budget {
                if !self.pipeline.run_worker_once() {
                    break;
                }
            }
        }
        for ev in self.pipeline.drain_events() {
            self.mesh_events += 1;
            match ev {
                MeshEvent::AfterChunkMeshCreated(k) => {
                    log::trace!(target: "events", "[tick {}] AfterChunkMeshCreated {}", self.queue.now, k);
                }
                MeshEvent::BeforeChunkMeshRemoved(k) => {
                    log::trace!(target: "events", "[tick {}] BeforeChunkMeshRemoved {}", self.queue.now, k);
                }
            }
        }
        if integrated > 0 {
            log::debug!("[tick {}] integrated {} mesh(es)", self.queue.now, integrated);
        }
    }

    fn drain_payloads(&mut self) {
        for (id, payload) in self.payload_rx.try_iter() {
            let Some(replica) = self.replicas.get_mut(&id) else {
                continue;
            };
            match payload {
                ChunkPayload::Store(s) => {
                    replica.stores += 1;
                    if !replica.chunks.insert(s.key.clone()) {
                        self.replica_anomalies += 1;
                        log::error!("{} received chunk {} twice", id, s.key);
                    }
                }
                ChunkPayload::Remove(r) => {
                    replica.removes += 1;
                    if !replica.chunks.remove(&r.key) {
                        self.replica_anomalies += 1;
                        log::error!("{} told to remove chunk {} it never had", id, r.key);
                    }
                }
            }
        }
    }

    /// Compares each replica with the tracker's transmitted set.
    fn verify_replicas(&mut self) {
        for obs in self.tracker.observers() {
            let Some(replica) = self.replicas.get(&obs.id) else {
                continue;
            };
            if replica.chunks != obs.transmitted {
                self.replica_anomalies += 1;
                log::error!(
                    "{} replica has {} chunks, tracker recorded {}",
                    obs.id,
                    replica.chunks.len(),
                    obs.transmitted.len()
                );
            } else {
                log::debug!(
                    "{} replica in sync: {} chunks ({} stores, {} removes)",
                    obs.id,
                    replica.chunks.len(),
                    replica.stores,
                    replica.removes
                );
            }
        }
    }

    pub fn summary(&self, ticks: u64) -> RunSummary {
        RunSummary {
            ticks,
            tracker: self.tracker.stats(),
            pipeline: self.pipeline.stats(),
            relevance_changes: self.relevance_changes.get(),
            mesh_events: self.mesh_events,
            replica_anomalies: self.replica_anomalies,
        }
    }

    fn log_stats(&self, tick: u64) {
        let t = self.tracker.stats();
        let p = self.pipeline.stats();
        log::info!(
            "[tick {}] observers={} loaded={} transmitted={} stores={} removes={} notifications={}",
            tick,
            t.observers,
            t.loaded_chunks,
            t.transmitted_chunks,
            t.stores_sent,
            t.removes_sent,
            t.notifications
        );
        log::info!(
            "[tick {}] meshes not_ready={} ready={} in_flight={} pending={} built={} failures={} discarded={}",
            tick,
            p.not_ready,
            p.ready,
            p.in_flight,
            p.pending,
            p.built,
            p.failures,
            p.discarded
        );
        let i = self.pipeline.integrator();
        log::info!(
            "[tick {}] integrated={} disposed={} live parts={} quads={}",
            tick,
            i.integrated,
            i.disposed,
            i.live_parts,
            i.live_quads
        );
    }

    fn log_event(tick: u64, ev: &Event) {
        match ev {
            Event::Tick => {
                log::trace!(target: "events", "[tick {}] Tick", tick);
            }
            Event::ObserverConnected { id, at } => {
                log::info!(target: "events", "[tick {}] ObserverConnected {} at ({}, {}, {}) in {}",
                    tick, id, at.x, at.y, at.z, at.world);
            }
            Event::ObserverMoved { id, to } => {
                log::trace!(target: "events", "[tick {}] ObserverMoved {} to ({}, {}, {})",
                    tick, id, to.x, to.y, to.z);
            }
            Event::ObserverDisconnected { id } => {
                log::info!(target: "events", "[tick {}] ObserverDisconnected {}", tick, id);
            }
            Event::LoadSetChanged => {
                log::debug!(target: "events", "[tick {}] LoadSetChanged", tick);
            }
            Event::EnsureChunkLoaded { key } => {
                log::debug!(target: "events", "[tick {}] EnsureChunkLoaded {}", tick, key);
            }
            Event::EnsureChunkUnloaded { key } => {
                log::debug!(target: "events", "[tick {}] EnsureChunkUnloaded {}", tick, key);
            }
            Event::ChunkRebuildRequested { key } => {
                log::debug!(target: "events", "[tick {}] ChunkRebuildRequested {}", tick, key);
            }
        }
    }

    /// Queues a rebuild of `key`'s mesh for the current tick.
    pub fn request_rebuild(&mut self, key: ChunkKey) {
        self.queue.emit_now(Event::ChunkRebuildRequested { key });
    }
}

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::{HashMap, HashSet};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use vantage_chunk::ChunkStore;
use vantage_geom::Frustum;
use vantage_mesh_cpu::can_prepare;
use vantage_world::{BlockPos, ChunkKey};

use crate::builder::{BuildError, GeometryBuilder};
use crate::integrate::{MeshEvent, MeshIntegrator};
use crate::order::MeshGenerationOrder;
use crate::registry::{Completion, MeshRegistry, MeshState};

#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Background builders. Zero means builds only run through [`MeshPipeline::run_worker_once`].
    pub worker_threads: usize,
    /// Sleep between polls when no mesh is ready to build.
    pub idle_poll: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 3,
            idle_poll: Duration::from_millis(20),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub loaded: usize,
    pub not_ready: usize,
    pub ready: usize,
    pub in_flight: usize,
    pub pending: usize,
    pub built: usize,
    pub live: usize,
    pub builds_completed: u64,
    pub failures: u64,
    pub discarded: u64,
    pub demoted: u64,
}

struct Shared {
    registry: Mutex<MeshRegistry>,
    stop: AtomicBool,
    builds_completed: AtomicU64,
    failures: AtomicU64,
    discarded: AtomicU64,
    demoted: AtomicU64,
}

impl Shared {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, MeshRegistry> {
        // Builds never run under the lock, so a poisoned guard still holds consistent data.
        self.registry.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Clone)]
struct WorkerCtx {
    shared: Arc<Shared>,
    store: Arc<dyn ChunkStore>,
    builder: Arc<dyn GeometryBuilder>,
    order: Arc<dyn MeshGenerationOrder>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

impl WorkerCtx {
    /// One scheduling round: claim a mesh under the lock, build outside it, store the result
    /// under the lock. Returns false when nothing was ready.
    fn work_once(&self) -> bool {
        let claimed = self.shared.lock().claim_next(self.order.as_ref());
        let Some((key, generation)) = claimed else {
            return false;
        };
        let outcome = match catch_unwind(AssertUnwindSafe(|| {
            self.builder.build(&key, self.store.as_ref())
        })) {
            Ok(r) => r,
            Err(payload) => Err(BuildError::Failed(panic_message(payload.as_ref()))),
        };
        let completion = self.shared.lock().complete(&key, generation, outcome);
        match completion {
            Completion::Stored => {
                self.shared.builds_completed.fetch_add(1, Ordering::Relaxed);
            }
            Completion::Removed | Completion::Stale => {
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                log::trace!("discarding build result for {} (mesh removed or re-armed)", key);
            }
            Completion::Demoted(missing) => {
                self.shared.demoted.fetch_add(1, Ordering::Relaxed);
                log::debug!("mesh {} back to not-ready: neighbor {} unloaded", key, missing);
            }
            Completion::Failed(err, failures) => {
                self.shared.failures.fetch_add(1, Ordering::Relaxed);
                log::error!("mesh build for {} failed ({} so far): {}", key, failures, err);
            }
        }
        true
    }
}

/// Background mesh generation with main-loop integration.
///
/// Loaded chunks start not-ready on the main thread. `tick` promotes those whose 27-chunk
/// neighborhood is loaded into the shared registry, where workers pick them up in the order the
/// configured [`MeshGenerationOrder`] chooses. Finished geometry waits in the registry until the
/// next `tick` hands it to the [`MeshIntegrator`] on the calling thread.
pub struct MeshPipeline<I: MeshIntegrator> {
    ctx: WorkerCtx,
    pool: Option<ThreadPool>,
    loaded: HashSet<ChunkKey>,
    not_ready: Vec<ChunkKey>,
    live: HashMap<ChunkKey, I::Resource>,
    integrator: I,
    events_tx: Sender<MeshEvent>,
    events_rx: Receiver<MeshEvent>,
}

impl<I: MeshIntegrator> MeshPipeline<I> {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ChunkStore>,
        builder: Arc<dyn GeometryBuilder>,
        order: Arc<dyn MeshGenerationOrder>,
        integrator: I,
    ) -> Result<Self, ThreadPoolBuildError> {
        let shared = Arc::new(Shared {
            registry: Mutex::new(MeshRegistry::default()),
            stop: AtomicBool::new(false),
            builds_completed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            demoted: AtomicU64::new(0),
        });
        let ctx = WorkerCtx {
            shared,
            store,
            builder,
            order,
        };
        let pool = if config.worker_threads > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .thread_name(|i| format!("vantage-mesh-{i}"))
                .build()?;
            for _ in 0..config.worker_threads {
                let ctx = ctx.clone();
                let idle = config.idle_poll;
                pool.spawn(move || {
                    log::debug!(
                        "mesh worker {} started",
                        thread::current().name().unwrap_or("?")
                    );
                    while !ctx.shared.stop.load(Ordering::Acquire) {
                        if !ctx.work_once() {
                            thread::sleep(idle);
                        }
                    }
                });
            }
            Some(pool)
        } else {
            None
        };
        let (events_tx, events_rx) = unbounded();
        Ok(Self {
            ctx,
            pool,
            loaded: HashSet::new(),
            not_ready: Vec::new(),
            live: HashMap::new(),
            integrator,
            events_tx,
            events_rx,
        })
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.pool.as_ref().map(|p| p.current_num_threads()).unwrap_or(0)
    }

    /// Runs one worker round on the calling thread.
    pub fn run_worker_once(&self) -> bool {
        self.ctx.work_once()
    }

    pub fn chunk_loaded(&mut self, key: ChunkKey) {
        if !self.loaded.insert(key.clone()) {
            log::warn!("mesh for {} already tracked", key);
            return;
        }
        self.not_ready.push(key);
    }

    /// Drops the mesh. Fires `BeforeChunkMeshRemoved` only if it had been integrated.
    pub fn chunk_unloaded(&mut self, key: &ChunkKey) -> bool {
        if !self.loaded.remove(key) {
            return false;
        }
        self.not_ready.retain(|k| k != key);
        self.ctx.shared.lock().slots.remove(key);
        if let Some(resource) = self.live.remove(key) {
            let _ = self
                .events_tx
                .send(MeshEvent::BeforeChunkMeshRemoved(key.clone()));
            self.integrator.dispose(key, resource);
        }
        true
    }

    /// Main-loop step: promote ready meshes, then integrate finished geometry.
    /// Returns how many meshes were integrated.
    pub fn tick(&mut self) -> usize {
        // Readiness reads the chunk store; keep it outside the registry lock.
        let store = self.ctx.store.clone();
        let mut ready = Vec::new();
        self.not_ready.retain(|k| {
            if can_prepare(store.as_ref(), k) {
                ready.push(k.clone());
                false
            } else {
                true
            }
        });

        let (pending, demoted) = {
            let mut reg = self.ctx.shared.lock();
            reg.round += 1;
            for key in ready {
                reg.register_ready(key);
            }
            (reg.take_pending(), reg.take_demoted())
        };
        for key in demoted {
            if self.loaded.contains(&key) {
                self.not_ready.push(key);
            }
        }

        let mut integrated = 0;
        for (key, geometry) in pending {
            if !self.loaded.contains(&key) {
                continue;
            }
            if let Some(old) = self.live.remove(&key) {
                self.integrator.dispose(&key, old);
            }
            let resource = self.integrator.integrate(geometry);
            self.live.insert(key.clone(), resource);
            let _ = self.events_tx.send(MeshEvent::AfterChunkMeshCreated(key));
            integrated += 1;
        }
        integrated
    }

    /// Queues another background build for an already registered mesh.
    pub fn request_rebuild(&mut self, key: &ChunkKey) -> bool {
        self.ctx.shared.lock().rearm(key)
    }

    /// Positions the nearest-first order measures distance from.
    pub fn set_focus_points(&self, points: Vec<BlockPos>) {
        self.ctx.shared.lock().focus = points;
    }

    pub fn state(&self, key: &ChunkKey) -> Option<MeshState> {
        if !self.loaded.contains(key) {
            return None;
        }
        Some(
            self.ctx
                .shared
                .lock()
                .slots
                .get(key)
                .map(|s| s.state)
                .unwrap_or(MeshState::NotReady),
        )
    }

    pub fn resource(&self, key: &ChunkKey) -> Option<&I::Resource> {
        self.live.get(key)
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    /// Visibility from the chunk's static bounds; independent of build state.
    #[inline]
    pub fn is_visible(&self, key: &ChunkKey, frustum: &Frustum) -> bool {
        frustum.intersects_aabb(&key.coord.bounds())
    }

    pub fn visible_chunks(&self, frustum: &Frustum) -> Vec<ChunkKey> {
        let mut out: Vec<ChunkKey> = self
            .loaded
            .iter()
            .filter(|k| self.is_visible(k, frustum))
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Receiver for lifecycle events; clones share one queue with [`Self::drain_events`].
    pub fn events(&self) -> Receiver<MeshEvent> {
        self.events_rx.clone()
    }

    pub fn drain_events(&self) -> Vec<MeshEvent> {
        self.events_rx.try_iter().collect()
    }

    pub fn stats(&self) -> PipelineStats {
        let counts = self.ctx.shared.lock().counts();
        let shared = &self.ctx.shared;
        PipelineStats {
            loaded: self.loaded.len(),
            not_ready: self.not_ready.len() + counts.demoted,
            ready: counts.ready,
            in_flight: counts.in_flight,
            pending: counts.pending,
            built: counts.built,
            live: self.live.len(),
            builds_completed: shared.builds_completed.load(Ordering::Relaxed),
            failures: shared.failures.load(Ordering::Relaxed),
            discarded: shared.discarded.load(Ordering::Relaxed),
            demoted: shared.demoted.load(Ordering::Relaxed),
        }
    }

    /// Signals workers to exit at their next poll. Also done on drop.
    pub fn shutdown(&self) {
        self.ctx.shared.stop.store(true, Ordering::Release);
    }
}

impl<I: MeshIntegrator> Drop for MeshPipeline<I> {
    fn drop(&mut self) {
        self.shutdown();
        for (key, resource) in std::mem::take(&mut self.live) {
            self.integrator.dispose(&key, resource);
        }
    }
}

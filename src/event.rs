use std::collections::{BTreeMap, VecDeque};

use vantage_relevance::ObserverId;
use vantage_world::{BlockPos, ChunkKey};

pub enum Event {
    // Time housekeeping
    Tick,

    // Observers
    ObserverConnected { id: ObserverId, at: BlockPos },
    ObserverMoved { id: ObserverId, to: BlockPos },
    ObserverDisconnected { id: ObserverId },
    LoadSetChanged,

    // Chunk streaming and meshing
    EnsureChunkLoaded { key: ChunkKey },
    EnsureChunkUnloaded { key: ChunkKey },
    ChunkRebuildRequested { key: ChunkKey },
}

pub struct EventEnvelope {
    pub id: u64,
    pub tick: u64,
    pub kind: Event,
}

pub struct EventQueue {
    // tick -> FIFO of events due that tick
    by_tick: BTreeMap<u64, VecDeque<EventEnvelope>>,
    pub now: u64,
    next_id: u64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self { by_tick: BTreeMap::new(), now: 0, next_id: 1 }
    }
}

impl EventQueue {
    pub fn new() -> Self { Self::default() }

    #[inline]
    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    pub fn emit_now(&mut self, kind: Event) -> u64 {
        self.emit_at(self.now, kind)
    }

    pub fn emit_at(&mut self, tick: u64, kind: Event) -> u64 {
        let id = self.alloc_id();
        // Past ticks are never drained again; clamp them to the current one.
        let tick = tick.max(self.now);
        let env = EventEnvelope { id, tick, kind };
        self.by_tick.entry(tick).or_default().push_back(env);
        id
    }

    pub fn emit_after(&mut self, delta: u64, kind: Event) -> u64 {
        self.emit_at(self.now + delta, kind)
    }

    pub fn pop_ready(&mut self) -> Option<EventEnvelope> {
        self.by_tick.get_mut(&self.now)?.pop_front()
    }

    /// Moves to the next tick. Events left over in the current tick (budget exhausted) run
    /// first in the next one.
    pub fn advance_tick(&mut self) {
        let leftover = self.by_tick.remove(&self.now).unwrap_or_default();
        self.now = self.now.wrapping_add(1);
        if !leftover.is_empty() {
            let next = self.by_tick.entry(self.now).or_default();
            for mut env in leftover.into_iter().rev() {
                env.tick = self.now;
                next.push_front(env);
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.by_tick.values().map(VecDeque::len).sum()
    }
}

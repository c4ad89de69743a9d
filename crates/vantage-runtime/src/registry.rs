use hashbrown::HashMap;
use vantage_mesh_cpu::ChunkGeometry;
use vantage_world::{BlockPos, ChunkKey};

use crate::builder::BuildError;
use crate::order::{Candidate, MeshGenerationOrder};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshState {
    NotReady,
    ReadyForBuild,
    Built,
}

#[derive(Debug)]
pub(crate) struct MeshSlot {
    pub state: MeshState,
    /// Generation a worker is currently building, if any.
    pub in_flight: Option<u64>,
    pub generation: u64,
    pub ready_seq: u64,
    /// Finished geometry waiting for the main loop.
    pub pending: Option<ChunkGeometry>,
    pub failures: u32,
    /// First round a failed mesh may be claimed again.
    pub retry_round: u64,
}

/// Upper bound, in rounds, on the wait before retrying a failed build.
const MAX_RETRY_BACKOFF: u64 = 32;

/// Rounds to wait after the `failures`-th consecutive failure: 1, 2, 4, ... capped.
fn retry_backoff(failures: u32) -> u64 {
    1u64.checked_shl(failures.saturating_sub(1))
        .unwrap_or(MAX_RETRY_BACKOFF)
        .min(MAX_RETRY_BACKOFF)
}

impl MeshSlot {
    #[inline]
    fn is_candidate(&self, round: u64) -> bool {
        self.state == MeshState::ReadyForBuild
            && self.in_flight.is_none()
            && self.pending.is_none()
            && self.retry_round <= round
    }
}

pub(crate) enum Completion {
    Stored,
    /// The mesh was unloaded while the build ran.
    Removed,
    /// The mesh was re-armed or recreated while the build ran.
    Stale,
    Demoted(ChunkKey),
    Failed(BuildError, u32),
}

/// Meshes promoted past not-ready. Shared by workers and the main loop behind one mutex.
#[derive(Default, Debug)]
pub(crate) struct MeshRegistry {
    pub slots: HashMap<ChunkKey, MeshSlot>,
    pub focus: Vec<BlockPos>,
    /// Advanced once per main-loop tick; failed builds back off in rounds.
    pub round: u64,
    next_seq: u64,
    next_generation: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RegistryCounts {
    pub ready: usize,
    pub in_flight: usize,
    pub pending: usize,
    pub built: usize,
    pub demoted: usize,
}

impl MeshRegistry {
    fn bump(&mut self) -> (u64, u64) {
        self.next_seq += 1;
        self.next_generation += 1;
        (self.next_seq, self.next_generation)
    }

    pub fn register_ready(&mut self, key: ChunkKey) -> bool {
        if self.slots.contains_key(&key) {
            return false;
        }
        let (seq, generation) = self.bump();
        self.slots.insert(
            key,
            MeshSlot {
                state: MeshState::ReadyForBuild,
                in_flight: None,
                generation,
                ready_seq: seq,
                pending: None,
                failures: 0,
                retry_round: 0,
            },
        );
        true
    }

    /// Queues another build for a registered mesh; any unintegrated or in-flight result is
    /// superseded.
    pub fn rearm(&mut self, key: &ChunkKey) -> bool {
        if !matches!(self.slots.get(key), Some(s) if s.state != MeshState::NotReady) {
            return false;
        }
        let (seq, generation) = self.bump();
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };
        slot.state = MeshState::ReadyForBuild;
        slot.generation = generation;
        slot.ready_seq = seq;
        slot.pending = None;
        slot.retry_round = 0;
        true
    }

    pub fn claim_next(&mut self, order: &dyn MeshGenerationOrder) -> Option<(ChunkKey, u64)> {
        let candidates: Vec<Candidate<'_>> = self
            .slots
            .iter()
            .filter(|(_, s)| s.is_candidate(self.round))
            .map(|(k, s)| Candidate {
                key: k,
                ready_seq: s.ready_seq,
            })
            .collect();
        let pick = order.select_next(&candidates, &self.focus)?;
        let key = candidates.get(pick)?.key.clone();
        let slot = self.slots.get_mut(&key)?;
        slot.in_flight = Some(slot.generation);
        Some((key, slot.generation))
    }

    pub fn complete(
        &mut self,
        key: &ChunkKey,
        generation: u64,
        outcome: Result<ChunkGeometry, BuildError>,
    ) -> Completion {
        let Some(slot) = self.slots.get_mut(key) else {
            return Completion::Removed;
        };
        if slot.in_flight == Some(generation) {
            slot.in_flight = None;
        }
        if slot.generation != generation {
            return Completion::Stale;
        }
        match outcome {
            Ok(geometry) => {
                slot.pending = Some(geometry);
                Completion::Stored
            }
            Err(BuildError::MissingNeighbor(missing)) => {
                slot.state = MeshState::NotReady;
                Completion::Demoted(missing)
            }
            Err(e) => {
                // Back of the queue, and out of it for a while.
                self.next_seq += 1;
                slot.ready_seq = self.next_seq;
                slot.failures += 1;
                slot.retry_round = self.round + retry_backoff(slot.failures);
                Completion::Failed(e, slot.failures)
            }
        }
    }

    /// Hands finished geometry to the main loop and marks those meshes built.
    pub fn take_pending(&mut self) -> Vec<(ChunkKey, ChunkGeometry)> {
        let mut out = Vec::new();
        for (key, slot) in self.slots.iter_mut() {
            if let Some(geometry) = slot.pending.take() {
                slot.state = MeshState::Built;
                slot.failures = 0;
                out.push((key.clone(), geometry));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Removes meshes a worker found unbuildable so the main loop can track them as not-ready.
    pub fn take_demoted(&mut self) -> Vec<ChunkKey> {
        let demoted: Vec<ChunkKey> = self
            .slots
            .iter()
            .filter(|(_, s)| s.state == MeshState::NotReady && s.in_flight.is_none())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &demoted {
            self.slots.remove(key);
        }
        demoted
    }

    pub fn counts(&self) -> RegistryCounts {
        let mut c = RegistryCounts::default();
        for slot in self.slots.values() {
            match slot.state {
                MeshState::ReadyForBuild => c.ready += 1,
                MeshState::Built => c.built += 1,
                MeshState::NotReady => c.demoted += 1,
            }
            if slot.in_flight.is_some() {
                c.in_flight += 1;
            }
            if slot.pending.is_some() {
                c.pending += 1;
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::FifoOrder;

    fn geom(key: &ChunkKey) -> ChunkGeometry {
        ChunkGeometry::empty(key.clone())
    }

    #[test]
    fn claimed_mesh_is_not_offered_again() {
        let mut reg = MeshRegistry::default();
        let a = ChunkKey::new("w", 0, 0, 0);
        assert!(reg.register_ready(a.clone()));
        assert!(!reg.register_ready(a.clone()));
        let (k, generation) = reg.claim_next(&FifoOrder).unwrap();
        assert_eq!(k, a);
        assert!(reg.claim_next(&FifoOrder).is_none());
        assert!(matches!(reg.complete(&a, generation, Ok(geom(&a))), Completion::Stored));
        // pending result blocks another claim until integrated
        assert!(reg.claim_next(&FifoOrder).is_none());
        let taken = reg.take_pending();
        assert_eq!(taken.len(), 1);
        assert_eq!(reg.slots[&a].state, MeshState::Built);
        assert!(reg.claim_next(&FifoOrder).is_none());
    }

    #[test]
    fn rearm_during_build_discards_old_result() {
        let mut reg = MeshRegistry::default();
        let a = ChunkKey::new("w", 0, 0, 0);
        reg.register_ready(a.clone());
        let (_, g1) = reg.claim_next(&FifoOrder).unwrap();
        assert!(reg.rearm(&a));
        // still in flight under the old generation
        assert!(reg.claim_next(&FifoOrder).is_none());
        assert!(matches!(reg.complete(&a, g1, Ok(geom(&a))), Completion::Stale));
        let (_, g2) = reg.claim_next(&FifoOrder).unwrap();
        assert_ne!(g1, g2);
        assert!(matches!(reg.complete(&a, g2, Ok(geom(&a))), Completion::Stored));
    }

    #[test]
    fn failure_keeps_mesh_ready_and_missing_neighbor_demotes() {
        let mut reg = MeshRegistry::default();
        let a = ChunkKey::new("w", 0, 0, 0);
        reg.register_ready(a.clone());
        let (_, g) = reg.claim_next(&FifoOrder).unwrap();
        assert!(matches!(
            reg.complete(&a, g, Err(BuildError::Failed("boom".into()))),
            Completion::Failed(_, 1)
        ));
        assert_eq!(reg.slots[&a].state, MeshState::ReadyForBuild);
        assert!(reg.claim_next(&FifoOrder).is_none());
        reg.round += 1;
        let (_, g) = reg.claim_next(&FifoOrder).unwrap();
        let n = a.offset(1, 0, 0);
        assert!(matches!(
            reg.complete(&a, g, Err(BuildError::MissingNeighbor(n))),
            Completion::Demoted(_)
        ));
        assert_eq!(reg.take_demoted(), vec![a.clone()]);
        assert!(reg.slots.is_empty());
        assert!(matches!(reg.complete(&a, g, Ok(geom(&a))), Completion::Removed));
    }

    #[test]
    fn failed_mesh_yields_to_other_ready_meshes_and_backs_off() {
        let mut reg = MeshRegistry::default();
        let bad = ChunkKey::new("w", 0, 0, 0);
        let good = ChunkKey::new("w", 5, 0, 0);
        reg.register_ready(bad.clone());
        reg.register_ready(good.clone());

        let (k, g) = reg.claim_next(&FifoOrder).unwrap();
        assert_eq!(k, bad);
        reg.complete(&bad, g, Err(BuildError::Failed("boom".into())));
        let (k, _) = reg.claim_next(&FifoOrder).unwrap();
        assert_eq!(k, good);

        // 1, 2, 4 rounds between consecutive failures
        let mut retries = Vec::new();
        for _ in 0..8 {
            reg.round += 1;
            if let Some((k, g)) = reg.claim_next(&FifoOrder) {
                assert_eq!(k, bad);
                retries.push(reg.round);
                reg.complete(&bad, g, Err(BuildError::Failed("boom".into())));
            }
        }
        assert_eq!(retries, vec![1, 3, 7]);
        assert_eq!(retry_backoff(40), MAX_RETRY_BACKOFF);
    }
}

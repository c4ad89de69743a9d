use std::sync::Arc;

use crossbeam_channel::Sender;
use vantage_blocks::BlockId;
use vantage_world::ChunkKey;

use crate::ids::ObserverId;

#[derive(Clone, Debug)]
pub struct StoreChunk {
    pub key: ChunkKey,
    pub blocks: Arc<[BlockId]>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveChunk {
    pub key: ChunkKey,
}

#[derive(Clone, Debug)]
pub enum ChunkPayload {
    Store(StoreChunk),
    Remove(RemoveChunk),
}

impl ChunkPayload {
    pub fn key(&self) -> &ChunkKey {
        match self {
            ChunkPayload::Store(s) => &s.key,
            ChunkPayload::Remove(r) => &r.key,
        }
    }

    #[inline]
    pub fn is_store(&self) -> bool {
        matches!(self, ChunkPayload::Store(_))
    }
}

/// Outbound side of the tracker: chunk payloads addressed to one observer.
pub trait ObserverSink {
    fn deliver(&mut self, observer: ObserverId, payload: ChunkPayload);
}

/// Collects payloads in send order until drained.
#[derive(Default, Debug)]
pub struct ChunkOutbox {
    sent: Vec<(ObserverId, ChunkPayload)>,
}

impl ChunkOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<(ObserverId, ChunkPayload)> {
        std::mem::take(&mut self.sent)
    }

    pub fn sent(&self) -> &[(ObserverId, ChunkPayload)] {
        &self.sent
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

impl ObserverSink for ChunkOutbox {
    fn deliver(&mut self, observer: ObserverId, payload: ChunkPayload) {
        self.sent.push((observer, payload));
    }
}

/// Hands payloads to another thread (e.g. a network writer).
impl ObserverSink for Sender<(ObserverId, ChunkPayload)> {
    fn deliver(&mut self, observer: ObserverId, payload: ChunkPayload) {
        if self.send((observer, payload)).is_err() {
            log::warn!("payload for {} dropped: receiver gone", observer);
        }
    }
}

//! Per-observer interest tracking: which chunks, blocks and marker entities each connected
//! observer needs, and the minimal store/remove traffic that keeps its replica in sync.
#![forbid(unsafe_code)]

mod ids;
mod listener;
mod load_rule;
mod observer;
mod payload;
mod spatial;
mod tracker;

pub use ids::{EntityId, ObserverId};
pub use listener::{ListenerHandle, ListenerRegistry, RelevanceListener};
pub use load_rule::ChunkLoadRule;
pub use observer::ObserverState;
pub use payload::{ChunkOutbox, ChunkPayload, ObserverSink, RemoveChunk, StoreChunk};
pub use spatial::{SpatialIndex, SpatialKind};
pub use tracker::{RelevanceTracker, TrackerError, TrackerStats};

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use vantage_chunk::{ChunkBlocks, MemoryChunkStore};
use vantage_relevance::{
    ChunkOutbox, ChunkPayload, EntityId, ObserverId, RelevanceTracker, SpatialKind, TrackerError,
};
use vantage_world::relevance::chunk_in_view;
use vantage_world::{BlockPos, ChunkKey, ViewDistance};

type Calls = Rc<RefCell<Vec<(ObserverId, Vec<EntityId>)>>>;

struct Fixture {
    tracker: RelevanceTracker,
    store: MemoryChunkStore,
    out: ChunkOutbox,
    calls: Calls,
    next_entity: u64,
}

impl Fixture {
    fn new() -> Self {
        let mut tracker = RelevanceTracker::new();
        let calls: Calls = Rc::new(RefCell::new(Vec::new()));
        let c = calls.clone();
        tracker.add_listener(
            0,
            Box::new(move |o: ObserverId, changed: &[EntityId]| {
                c.borrow_mut().push((o, changed.to_vec()))
            }),
        );
        Self {
            tracker,
            store: MemoryChunkStore::new(),
            out: ChunkOutbox::new(),
            calls,
            next_entity: 1000,
        }
    }

    fn entity(&mut self) -> EntityId {
        self.next_entity += 1;
        EntityId(self.next_entity)
    }

    fn load(&mut self, key: ChunkKey) -> EntityId {
        let e = self.entity();
        self.store.insert(ChunkBlocks::filled(key.clone(), 1));
        self.tracker
            .chunk_loaded(e, key, &self.store, &mut self.out)
            .unwrap();
        e
    }

    fn load_grid(&mut self, world: &str, r: i32, ry: i32) {
        for x in -r..=r {
            for y in -ry..=ry {
                for z in -r..=r {
                    self.load(ChunkKey::new(world, x, y, z));
                }
            }
        }
    }

    fn connect(&mut self, id: u64, pos: BlockPos, view: ViewDistance) {
        self.tracker
            .observer_connected(ObserverId(id), pos, view, &self.store, &mut self.out)
            .unwrap();
    }

    fn move_to(&mut self, id: u64, pos: BlockPos) {
        self.tracker
            .observer_moved(ObserverId(id), pos, &self.store, &mut self.out)
            .unwrap();
    }

    fn split_payloads(&mut self) -> (BTreeSet<ChunkKey>, BTreeSet<ChunkKey>) {
        let mut stores = BTreeSet::new();
        let mut removes = BTreeSet::new();
        for (_, p) in self.out.drain() {
            match p {
                ChunkPayload::Store(s) => assert!(stores.insert(s.key)),
                ChunkPayload::Remove(r) => assert!(removes.insert(r.key)),
            }
        }
        (stores, removes)
    }
}

fn in_view_set(world: &str, center: ChunkKey, view: ViewDistance, r: i32, ry: i32) -> BTreeSet<ChunkKey> {
    let mut out = BTreeSet::new();
    for x in -r..=r {
        for y in -ry..=ry {
            for z in -r..=r {
                let k = ChunkKey::new(world, x, y, z);
                if chunk_in_view(&k, &center, view) {
                    out.insert(k);
                }
            }
        }
    }
    out
}

#[test]
fn connect_stores_every_relevant_chunk_once_and_announces_markers() {
    let mut f = Fixture::new();
    f.load_grid("W", 4, 2);
    let global = f.entity();
    let world_w = f.entity();
    let world_v = f.entity();
    f.tracker
        .entity_added(global, SpatialKind::GlobalMarker, &f.store, &mut f.out)
        .unwrap();
    f.tracker
        .entity_added(world_w, SpatialKind::WorldMarker("W".into()), &f.store, &mut f.out)
        .unwrap();
    f.tracker
        .entity_added(world_v, SpatialKind::WorldMarker("V".into()), &f.store, &mut f.out)
        .unwrap();
    let v = ViewDistance::new(2, 1);
    f.connect(1, BlockPos::new("W", 0, 0, 0), v);

    let (stores, removes) = f.split_payloads();
    assert!(removes.is_empty());
    assert_eq!(stores, in_view_set("W", ChunkKey::new("W", 0, 0, 0), v, 4, 2));
    // diamond footprint: far along one axis is in, the (3,0,3) corner is out
    assert!(stores.contains(&ChunkKey::new("W", 3, 0, 0)));
    assert!(stores.contains(&ChunkKey::new("W", 2, 0, 2)));
    assert!(!stores.contains(&ChunkKey::new("W", 3, 0, 3)));
    assert!(!stores.contains(&ChunkKey::new("W", 0, 2, 0)));

    let calls = f.calls.borrow();
    assert_eq!(calls.len(), 1);
    let (who, changed) = &calls[0];
    assert_eq!(*who, ObserverId(1));
    assert!(changed.contains(&global));
    assert!(changed.contains(&world_w));
    assert!(!changed.contains(&world_v));
    assert_eq!(changed.len(), stores.len() + 2);
    let obs = f.tracker.observer(ObserverId(1)).unwrap();
    assert_eq!(obs.transmitted.len(), stores.len());
}

#[test]
fn in_world_move_sends_exactly_the_flipped_chunks() {
    let mut f = Fixture::new();
    f.load_grid("W", 5, 2);
    let v = ViewDistance::new(2, 1);
    f.connect(1, BlockPos::new("W", 0, 0, 0), v);
    f.out.drain();
    f.calls.borrow_mut().clear();

    f.move_to(1, BlockPos::new("W", 16, 0, 0));
    let (stores, removes) = f.split_payloads();
    let before = in_view_set("W", ChunkKey::new("W", 0, 0, 0), v, 5, 2);
    let after = in_view_set("W", ChunkKey::new("W", 1, 0, 0), v, 5, 2);
    let expect_stores: BTreeSet<_> = after.difference(&before).cloned().collect();
    let expect_removes: BTreeSet<_> = before.difference(&after).cloned().collect();
    assert!(!expect_stores.is_empty());
    assert!(!expect_removes.is_empty());
    assert_eq!(stores, expect_stores);
    assert_eq!(removes, expect_removes);
    assert_eq!(f.calls.borrow().len(), 1);
    assert_eq!(f.calls.borrow()[0].1.len(), stores.len() + removes.len());
}

#[test]
fn moving_inside_the_same_chunk_is_free() {
    let mut f = Fixture::new();
    f.load_grid("W", 3, 1);
    f.connect(1, BlockPos::new("W", 1, 1, 1), ViewDistance::new(2, 1));
    f.out.drain();
    f.calls.borrow_mut().clear();
    f.move_to(1, BlockPos::new("W", 15, 15, 15));
    f.move_to(1, BlockPos::new("W", 15, 15, 15));
    assert!(f.out.is_empty());
    assert!(f.calls.borrow().is_empty());
    assert_eq!(
        f.tracker.observer(ObserverId(1)).unwrap().position,
        BlockPos::new("W", 15, 15, 15)
    );
}

#[test]
fn relocation_tears_down_old_world_and_rebuilds_new_one() {
    let mut f = Fixture::new();
    f.load_grid("W", 2, 1);
    f.load_grid("V", 2, 1);
    let marker_w = f.entity();
    let marker_v = f.entity();
    f.tracker
        .entity_added(marker_w, SpatialKind::WorldMarker("W".into()), &f.store, &mut f.out)
        .unwrap();
    f.tracker
        .entity_added(marker_v, SpatialKind::WorldMarker("V".into()), &f.store, &mut f.out)
        .unwrap();
    let v = ViewDistance::new(1, 1);
    f.connect(1, BlockPos::new("W", 0, 0, 0), v);
    let (sent_w, _) = f.split_payloads();
    f.calls.borrow_mut().clear();

    f.move_to(1, BlockPos::new("V", 0, 0, 0));
    let (stores, removes) = f.split_payloads();
    assert_eq!(removes, sent_w);
    assert_eq!(stores, in_view_set("V", ChunkKey::new("V", 0, 0, 0), v, 2, 1));
    assert!(stores.iter().all(|k| k.world.as_str() == "V"));

    let calls = f.calls.borrow();
    assert_eq!(calls.len(), 1);
    let changed = &calls[0].1;
    assert!(changed.contains(&marker_w));
    assert!(changed.contains(&marker_v));
    assert_eq!(changed.len(), stores.len() + removes.len() + 2);
    assert_eq!(f.tracker.stats().relocations, 1);

    let obs = f.tracker.observer(ObserverId(1)).unwrap();
    assert!(obs.relevant.contains(&marker_v));
    assert!(!obs.relevant.contains(&marker_w));
}

#[test]
fn chunk_load_and_unload_reach_only_observers_in_view() {
    let mut f = Fixture::new();
    f.connect(1, BlockPos::new("W", 0, 0, 0), ViewDistance::new(1, 0));
    f.connect(2, BlockPos::new("W", 160, 0, 160), ViewDistance::new(1, 0));
    f.out.drain();
    f.calls.borrow_mut().clear();

    let near = ChunkKey::new("W", 1, 0, 1);
    let e = f.load(near.clone());
    let sent = f.out.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ObserverId(1));
    assert!(sent[0].1.is_store());
    assert_eq!(*f.calls.borrow(), vec![(ObserverId(1), vec![e])]);

    f.calls.borrow_mut().clear();
    assert_eq!(f.tracker.chunk_unloaded(&near, &mut f.out).unwrap(), e);
    let sent = f.out.drain();
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0].1, ChunkPayload::Remove(r) if r.key == near));
    assert_eq!(*f.calls.borrow(), vec![(ObserverId(1), vec![e])]);
    assert!(f.tracker.observer(ObserverId(1)).unwrap().transmitted.is_empty());

    // reloading after an unload is a fresh store, not a duplicate
    f.store.remove(&near);
    f.load(near.clone());
    assert_eq!(f.out.drain().len(), 1);
}

#[test]
fn blocks_follow_their_chunk_relevance() {
    let mut f = Fixture::new();
    f.load_grid("W", 3, 0);
    let v = ViewDistance::new(1, 0);
    let block = f.entity();
    f.tracker
        .entity_added(block, SpatialKind::Block(BlockPos::new("W", 40, 0, 40)), &f.store, &mut f.out)
        .unwrap();
    f.connect(1, BlockPos::new("W", 0, 0, 0), v);
    // block sits in chunk (2,0,2): 2*2 > 1
    assert!(!f.tracker.is_entity_relevant(ObserverId(1), block).unwrap());
    f.move_to(1, BlockPos::new("W", 32, 0, 32));
    assert!(f.tracker.is_entity_relevant(ObserverId(1), block).unwrap());
    assert!(f.tracker.observer(ObserverId(1)).unwrap().relevant.contains(&block));
    f.move_to(1, BlockPos::new("W", 0, 0, 0));
    assert!(!f.tracker.observer(ObserverId(1)).unwrap().relevant.contains(&block));
}

#[test]
fn broadcast_moves_notify_everyone_on_chunk_change_only() {
    let mut f = Fixture::new();
    f.connect(1, BlockPos::new("W", 0, 0, 0), ViewDistance::new(1, 0));
    f.connect(2, BlockPos::new("W", 1000, 0, 1000), ViewDistance::new(1, 0));
    f.connect(3, BlockPos::new("V", 0, 0, 0), ViewDistance::new(1, 0));
    let mob = f.entity();
    f.tracker
        .entity_added(mob, SpatialKind::Broadcast(BlockPos::new("W", 1, 0, 1)), &f.store, &mut f.out)
        .unwrap();
    f.calls.borrow_mut().clear();

    f.tracker.entity_moved(mob, BlockPos::new("W", 2, 0, 3)).unwrap();
    assert!(f.calls.borrow().is_empty());

    f.tracker.entity_moved(mob, BlockPos::new("W", 17, 0, 3)).unwrap();
    let who: Vec<ObserverId> = f.calls.borrow().iter().map(|(o, _)| *o).collect();
    assert_eq!(who, vec![ObserverId(1), ObserverId(2), ObserverId(3)]);
    assert!(f.tracker.observer(ObserverId(1)).unwrap().relevant.contains(&mob));
    assert!(!f.tracker.observer(ObserverId(2)).unwrap().relevant.contains(&mob));

    f.calls.borrow_mut().clear();
    f.tracker.entity_moved(mob, BlockPos::new("V", 0, 0, 0)).unwrap();
    assert_eq!(f.calls.borrow().len(), 3);
    assert!(!f.tracker.observer(ObserverId(1)).unwrap().relevant.contains(&mob));
    assert!(f.tracker.observer(ObserverId(3)).unwrap().relevant.contains(&mob));
    // moving payload-free entities never produces chunk traffic
    assert!(f.out.is_empty());
}

#[test]
fn disconnect_drops_state_silently() {
    let mut f = Fixture::new();
    f.load_grid("W", 1, 0);
    f.connect(1, BlockPos::new("W", 0, 0, 0), ViewDistance::new(1, 0));
    f.out.drain();
    f.calls.borrow_mut().clear();
    let state = f.tracker.observer_disconnected(ObserverId(1)).unwrap();
    assert!(!state.transmitted.is_empty());
    assert!(f.out.is_empty());
    assert!(f.calls.borrow().is_empty());
    // chunk traffic after disconnect does not reach the gone observer
    f.tracker
        .chunk_unloaded(&ChunkKey::new("W", 0, 0, 0), &mut f.out)
        .unwrap();
    assert!(f.out.is_empty());
}

#[test]
fn misuse_is_reported_as_errors() {
    let mut f = Fixture::new();
    let key = ChunkKey::new("W", 0, 0, 0);
    f.load(key.clone());
    f.connect(1, BlockPos::new("W", 0, 0, 0), ViewDistance::new(1, 0));
    assert_eq!(
        f.tracker.observer_connected(
            ObserverId(1),
            BlockPos::new("W", 0, 0, 0),
            ViewDistance::new(1, 0),
            &f.store,
            &mut f.out
        ),
        Err(TrackerError::ObserverAlreadyConnected(ObserverId(1)))
    );
    assert_eq!(
        f.tracker.chunk_loaded(EntityId(1), key.clone(), &f.store, &mut f.out),
        Err(TrackerError::ChunkAlreadyLoaded(key))
    );
    let missing = ChunkKey::new("W", 9, 9, 9);
    assert_eq!(
        f.tracker.chunk_loaded(EntityId(2), missing.clone(), &f.store, &mut f.out),
        Err(TrackerError::ChunkDataMissing(missing))
    );
    assert_eq!(
        f.tracker.observer_moved(ObserverId(9), BlockPos::new("W", 0, 0, 0), &f.store, &mut f.out),
        Err(TrackerError::UnknownObserver(ObserverId(9)))
    );
    let marker = f.entity();
    f.tracker
        .entity_added(marker, SpatialKind::GlobalMarker, &f.store, &mut f.out)
        .unwrap();
    assert_eq!(
        f.tracker.entity_moved(marker, BlockPos::new("W", 1, 1, 1)),
        Err(TrackerError::NotMovable(marker))
    );
}

#[test]
fn listener_removal_stops_notifications() {
    let mut f = Fixture::new();
    let hits = Rc::new(RefCell::new(0u32));
    let h = hits.clone();
    let handle = f.tracker.add_listener(
        5,
        Box::new(move |_: ObserverId, _: &[EntityId]| *h.borrow_mut() += 1),
    );
    f.load_grid("W", 1, 0);
    f.connect(1, BlockPos::new("W", 0, 0, 0), ViewDistance::new(1, 0));
    assert_eq!(*hits.borrow(), 1);
    assert!(f.tracker.remove_listener(handle));
    f.move_to(1, BlockPos::new("W", 64, 0, 0));
    assert_eq!(*hits.borrow(), 1);
    assert_eq!(f.calls.borrow().len(), 2);
}

#[test]
fn widening_and_narrowing_view_sends_only_the_difference() {
    let mut f = Fixture::new();
    f.load_grid("W", 3, 0);
    let origin = BlockPos::new("W", 0, 0, 0);
    let (narrow, wide) = (ViewDistance::new(1, 0), ViewDistance::new(2, 0));
    f.connect(1, origin.clone(), narrow);
    let near = in_view_set("W", origin.chunk(), narrow, 3, 0);
    let far = in_view_set("W", origin.chunk(), wide, 3, 0);
    assert_eq!(f.split_payloads().0, near);

    f.tracker
        .set_view_distance(ObserverId(1), wide, &f.store, &mut f.out)
        .unwrap();
    let (stores, removes) = f.split_payloads();
    assert_eq!(stores, far.difference(&near).cloned().collect());
    assert!(removes.is_empty());

    // unchanged view is a no-op
    f.tracker
        .set_view_distance(ObserverId(1), wide, &f.store, &mut f.out)
        .unwrap();
    assert!(f.out.is_empty());

    f.tracker
        .set_view_distance(ObserverId(1), narrow, &f.store, &mut f.out)
        .unwrap();
    let (stores, removes) = f.split_payloads();
    assert!(stores.is_empty());
    assert_eq!(removes, far.difference(&near).cloned().collect());
    let transmitted: BTreeSet<ChunkKey> = f
        .tracker
        .observer(ObserverId(1))
        .unwrap()
        .transmitted
        .iter()
        .cloned()
        .collect();
    assert_eq!(transmitted, near);
}

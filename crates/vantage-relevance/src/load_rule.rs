use hashbrown::HashSet;
use vantage_world::{BlockPos, ChunkKey};

/// Keeps a square box of chunks loaded around every observer:
/// `|dx| <= horizontal`, `|dy| <= vertical`, `|dz| <= horizontal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLoadRule {
    pub horizontal: i32,
    pub vertical: i32,
}

impl Default for ChunkLoadRule {
    fn default() -> Self {
        Self {
            horizontal: 7,
            vertical: 3,
        }
    }
}

impl ChunkLoadRule {
    pub fn new(horizontal: i32, vertical: i32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub fn covers(&self, chunk: &ChunkKey, observer: &BlockPos) -> bool {
        let o = observer.chunk_coord();
        let within = |a: i32, b: i32, limit: i32| i64::from(a.abs_diff(b)) <= i64::from(limit);
        chunk.world == observer.world
            && within(chunk.coord.cx, o.cx, self.horizontal)
            && within(chunk.coord.cy, o.cy, self.vertical)
            && within(chunk.coord.cz, o.cz, self.horizontal)
    }

    /// True if any of `observers` wants `chunk` loaded.
    pub fn is_chunk_relevant<'a>(
        &self,
        chunk: &ChunkKey,
        mut observers: impl Iterator<Item = &'a BlockPos>,
    ) -> bool {
        observers.any(|p| self.covers(chunk, p))
    }

    /// Union of the load boxes around `observers`.
    pub fn relevant_chunks<'a>(&self, observers: impl Iterator<Item = &'a BlockPos>) -> HashSet<ChunkKey> {
        let (h, v) = (self.horizontal, self.vertical);
        let mut out = HashSet::new();
        for p in observers {
            let center = p.chunk();
            for dx in -h..=h {
                for dy in -v..=v {
                    for dz in -h..=h {
                        out.insert(center.offset(dx, dy, dz));
                    }
                }
            }
        }
        out
    }
}

use vantage_blocks::{AIR, BlockId, BlockRegistry};
use vantage_chunk::ChunkBlocks;
use vantage_world::ChunkKey;

/// Deterministic flat ground: stone, two layers of dirt and a grass top at `ground_height - 1`.
#[derive(Clone, Debug)]
pub struct FlatTerrain {
    pub ground_height: i32,
    stone: BlockId,
    dirt: BlockId,
    grass: BlockId,
}

fn lookup(reg: &BlockRegistry, name: &str, fallback: BlockId) -> BlockId {
    reg.id_by_name(name).unwrap_or_else(|| {
        log::warn!("block '{}' not in registry; using id {}", name, fallback);
        fallback
    })
}

impl FlatTerrain {
    pub fn new(reg: &BlockRegistry, ground_height: i32) -> Self {
        let stone = lookup(reg, "stone", AIR);
        Self {
            ground_height,
            stone,
            dirt: lookup(reg, "dirt", stone),
            grass: lookup(reg, "grass", stone),
        }
    }

    #[inline]
    pub fn block_at(&self, y: i32) -> BlockId {
        let top = self.ground_height - 1;
        if y > top {
            AIR
        } else if y == top {
            self.grass
        } else if y >= top - 2 {
            self.dirt
        } else {
            self.stone
        }
    }

    pub fn chunk(&self, key: &ChunkKey) -> ChunkBlocks {
        let (_, y0, _) = key.coord.origin();
        ChunkBlocks::from_fn(key.clone(), |_, y, _| self.block_at(y0 + y as i32))
    }
}

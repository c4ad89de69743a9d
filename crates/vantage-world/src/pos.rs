use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunk_coord::ChunkCoord;
use crate::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z};

/// Identifier of one world in the multiverse. Cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(Arc<str>);

impl WorldId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorldId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WorldId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One block position inside a specific world.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(world: impl Into<WorldId>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    #[inline]
    pub fn chunk_coord(&self) -> ChunkCoord {
        ChunkCoord::containing(self.x, self.y, self.z)
    }

    #[inline]
    pub fn chunk(&self) -> ChunkKey {
        ChunkKey {
            world: self.world.clone(),
            coord: self.chunk_coord(),
        }
    }

    /// Position relative to the containing chunk's minimum corner.
    #[inline]
    pub fn local(&self) -> (usize, usize, usize) {
        (
            self.x.rem_euclid(CHUNK_SIZE_X as i32) as usize,
            self.y.rem_euclid(CHUNK_SIZE_Y as i32) as usize,
            self.z.rem_euclid(CHUNK_SIZE_Z as i32) as usize,
        )
    }

    /// True when both positions are in the same world and the same chunk.
    #[inline]
    pub fn same_chunk(&self, other: &BlockPos) -> bool {
        self.world == other.world && self.chunk_coord() == other.chunk_coord()
    }
}

/// A chunk coordinate qualified by its world.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub world: WorldId,
    pub coord: ChunkCoord,
}

impl ChunkKey {
    pub fn new(world: impl Into<WorldId>, cx: i32, cy: i32, cz: i32) -> Self {
        Self {
            world: world.into(),
            coord: ChunkCoord::new(cx, cy, cz),
        }
    }

    #[inline]
    pub fn from_coord(world: WorldId, coord: ChunkCoord) -> Self {
        Self { world, coord }
    }

    #[inline]
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            world: self.world.clone(),
            coord: self.coord.offset(dx, dy, dz),
        }
    }

    pub fn neighbors(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.coord
            .neighbors()
            .map(move |coord| ChunkKey::from_coord(self.world.clone(), coord))
    }

    /// True when `pos` lies inside this chunk.
    #[inline]
    pub fn contains(&self, pos: &BlockPos) -> bool {
        self.world == pos.world && self.coord == pos.chunk_coord()
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:({}, {}, {})",
            self.world, self.coord.cx, self.coord.cy, self.coord.cz
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_wraps_into_chunk_range() {
        let p = BlockPos::new("w", -1, 17, -16);
        assert_eq!(p.local(), (15, 1, 0));
        assert_eq!(p.chunk(), ChunkKey::new("w", -1, 1, -1));
    }

    #[test]
    fn chunk_keys_in_different_worlds_differ() {
        assert_ne!(ChunkKey::new("a", 0, 0, 0), ChunkKey::new("b", 0, 0, 0));
        assert_eq!(ChunkKey::new("a", 1, 2, 3), ChunkKey::new("a", 1, 2, 3));
    }
}

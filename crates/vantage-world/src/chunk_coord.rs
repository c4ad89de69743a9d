use serde::{Deserialize, Serialize};
use vantage_geom::{Aabb, Vec3};

use crate::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z};

/// The 3x3x3 block of chunk offsets around (and including) a chunk.
/// Ordered x-major, then y, then z, so `(dx+1)*9 + (dy+1)*3 + (dz+1)` indexes it.
pub const NEIGHBORHOOD: [(i32, i32, i32); 27] = {
    let mut out = [(0, 0, 0); 27];
    let mut i = 0;
    while i < 27 {
        out[i] = ((i / 9) as i32 - 1, ((i / 3) % 3) as i32 - 1, (i % 3) as i32 - 1);
        i += 1;
    }
    out
};

/// Index of `(0,0,0)` in [`NEIGHBORHOOD`].
pub const NEIGHBORHOOD_CENTER: usize = 13;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    /// Chunk containing the block at `(x, y, z)`; floors toward negative infinity.
    #[inline]
    pub fn containing(x: i32, y: i32, z: i32) -> Self {
        Self {
            cx: x.div_euclid(CHUNK_SIZE_X as i32),
            cy: y.div_euclid(CHUNK_SIZE_Y as i32),
            cz: z.div_euclid(CHUNK_SIZE_Z as i32),
        }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cy: self.cy + dy,
            cz: self.cz + dz,
        }
    }

    #[inline]
    /// Squared euclidean distance in chunks, saturating at `i64::MAX`.
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let sq = |a: i32, b: i32| {
            let d = u64::from(a.abs_diff(b));
            d * d
        };
        let sum = sq(self.cx, other.cx)
            .saturating_add(sq(self.cy, other.cy))
            .saturating_add(sq(self.cz, other.cz));
        i64::try_from(sum).unwrap_or(i64::MAX)
    }

    /// World-space block coordinate of the chunk's minimum corner.
    #[inline]
    pub fn origin(self) -> (i32, i32, i32) {
        (
            self.cx * CHUNK_SIZE_X as i32,
            self.cy * CHUNK_SIZE_Y as i32,
            self.cz * CHUNK_SIZE_Z as i32,
        )
    }

    /// Static bounding volume of the chunk in world units.
    pub fn bounds(self) -> Aabb {
        let (x0, y0, z0) = self.origin();
        Aabb::new(
            Vec3::new(x0 as f32, y0 as f32, z0 as f32),
            Vec3::new(
                (x0 + CHUNK_SIZE_X as i32) as f32,
                (y0 + CHUNK_SIZE_Y as i32) as f32,
                (z0 + CHUNK_SIZE_Z as i32) as f32,
            ),
        )
    }

    /// The 26 surrounding chunks (center excluded).
    pub fn neighbors(self) -> impl Iterator<Item = ChunkCoord> {
        NEIGHBORHOOD
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != NEIGHBORHOOD_CENTER)
            .map(move |(_, &(dx, dy, dz))| self.offset(dx, dy, dz))
    }
}

impl From<(i32, i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkCoord> for (i32, i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cy, value.cz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighborhood_center_is_origin() {
        assert_eq!(NEIGHBORHOOD[NEIGHBORHOOD_CENTER], (0, 0, 0));
        assert_eq!(NEIGHBORHOOD[0], (-1, -1, -1));
        assert_eq!(NEIGHBORHOOD[26], (1, 1, 1));
        // x-major: stepping +1 in x moves 9 slots
        assert_eq!(NEIGHBORHOOD[NEIGHBORHOOD_CENTER + 9], (1, 0, 0));
        assert_eq!(NEIGHBORHOOD[NEIGHBORHOOD_CENTER + 3], (0, 1, 0));
        assert_eq!(NEIGHBORHOOD[NEIGHBORHOOD_CENTER + 1], (0, 0, 1));
    }

    #[test]
    fn neighbors_skip_center_and_are_unique() {
        let c = ChunkCoord::new(4, -2, 7);
        let mut all: Vec<ChunkCoord> = c.neighbors().collect();
        assert_eq!(all.len(), 26);
        assert!(!all.contains(&c));
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 26);
    }

    #[test]
    fn containing_floors_negative_blocks() {
        assert_eq!(ChunkCoord::containing(0, 0, 0), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::containing(15, 15, 15), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::containing(16, -1, -16), ChunkCoord::new(1, -1, -1));
        assert_eq!(ChunkCoord::containing(-17, 0, 0), ChunkCoord::new(-2, 0, 0));
    }
}

use vantage_blocks::FaceRole;
use vantage_geom::Vec3;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Face {
    PosY = 0,
    NegY = 1,
    PosX = 2,
    NegX = 3,
    PosZ = 4,
    NegZ = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosY,
        Face::NegY,
        Face::PosX,
        Face::NegX,
        Face::PosZ,
        Face::NegZ,
    ];

    /// Returns the `[0..6)` index of this face.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Converts a face index `[0..6)` back into a `Face` value.
    /// Falls back to `PosY` for out-of-range indices.
    #[inline]
    pub fn from_index(i: usize) -> Face {
        Face::ALL.get(i).copied().unwrap_or(Face::PosY)
    }

    #[inline]
    pub fn normal(self) -> Vec3 {
        let (dx, dy, dz) = self.delta();
        Vec3::new(dx as f32, dy as f32, dz as f32)
    }

    /// Returns the integer grid delta `(dx,dy,dz)` when stepping out of this face.
    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::PosY => (0, 1, 0),
            Face::NegY => (0, -1, 0),
            Face::PosX => (1, 0, 0),
            Face::NegX => (-1, 0, 0),
            Face::PosZ => (0, 0, 1),
            Face::NegZ => (0, 0, -1),
        }
    }

    #[inline]
    pub fn opposite(self) -> Face {
        match self {
            Face::PosY => Face::NegY,
            Face::NegY => Face::PosY,
            Face::PosX => Face::NegX,
            Face::NegX => Face::PosX,
            Face::PosZ => Face::NegZ,
            Face::NegZ => Face::PosZ,
        }
    }

    /// Classifies the face into top/bottom/side role for texture lookup.
    #[inline]
    pub fn role(self) -> FaceRole {
        match self {
            Face::PosY => FaceRole::Top,
            Face::NegY => FaceRole::Bottom,
            _ => FaceRole::Side,
        }
    }

    /// Offset from a block's minimum corner to the minimum corner of this face.
    #[inline]
    pub fn corner_offset(self) -> Vec3 {
        match self {
            Face::PosY => Vec3::new(0.0, 1.0, 0.0),
            Face::PosX => Vec3::new(1.0, 0.0, 0.0),
            Face::PosZ => Vec3::new(0.0, 0.0, 1.0),
            Face::NegY | Face::NegX | Face::NegZ => Vec3::ZERO,
        }
    }
}

pub type BlockId = u16;

/// Empty space. Always registered, never opaque.
pub const AIR: BlockId = 0;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u16);

impl TextureId {
    /// Placeholder used for blocks that name no texture.
    pub const UNKNOWN: TextureId = TextureId(0);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FaceRole {
    Top,
    Bottom,
    Side,
}

//! Block types, texture catalog, and the registry the mesher consults for opacity and textures.
#![forbid(unsafe_code)]

pub mod config;
pub mod registry;
pub mod texture;
pub mod types;

pub use registry::{BlockRegistry, BlockType, RegistryError};
pub use texture::TextureCatalog;
pub use types::{AIR, BlockId, FaceRole, TextureId};

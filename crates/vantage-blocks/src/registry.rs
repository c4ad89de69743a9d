use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use super::config::{BlockDef, BlocksConfig, TextureSelector};
use super::texture::TextureCatalog;
use super::types::{AIR, BlockId, FaceRole, TextureId};

/// Definitions used when no blocks file is configured.
pub const DEFAULT_BLOCKS_TOML: &str = r#"
[[blocks]]
name = "air"
id = 0
opaque = false

[[blocks]]
name = "stone"
id = 1
textures = "stone"

[[blocks]]
name = "dirt"
id = 2
textures = "dirt"

[[blocks]]
name = "grass"
id = 3
textures = { top = "grass_top", bottom = "dirt", side = "grass_side" }

[[blocks]]
name = "glass"
id = 4
opaque = false
textures = "glass"
"#;

#[derive(Clone, Debug)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    pub opaque: bool,
    pub tex_top: TextureId,
    pub tex_bottom: TextureId,
    pub tex_side: TextureId,
}

impl BlockType {
    #[inline]
    pub fn texture_for(&self, role: FaceRole) -> TextureId {
        match role {
            FaceRole::Top => self.tex_top,
            FaceRole::Bottom => self.tex_bottom,
            FaceRole::Side => self.tex_side,
        }
    }
}

#[derive(Debug)]
pub enum RegistryError {
    DuplicateId(BlockId),
    DuplicateName(String),
    AirMissing,
    AirOpaque,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateId(id) => write!(f, "block id {} defined twice", id),
            RegistryError::DuplicateName(n) => write!(f, "block name '{}' defined twice", n),
            RegistryError::AirMissing => write!(f, "block id {} (air) is not defined", AIR),
            RegistryError::AirOpaque => write!(f, "block id {} (air) must not be opaque", AIR),
        }
    }
}

impl Error for RegistryError {}

/// Block types indexed by id. Ids may be sparse; unregistered ids behave like air.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    pub textures: TextureCatalog,
    pub blocks: Vec<Option<BlockType>>,
    pub by_name: HashMap<String, BlockId>,
    opaque: Vec<bool>,
}

impl BlockRegistry {
    /// The built-in air/stone/dirt/grass/glass set.
    pub fn builtin() -> Self {
        match Self::from_toml_str(DEFAULT_BLOCKS_TOML) {
            Ok(reg) => reg,
            Err(e) => panic!("built-in block table is invalid: {}", e),
        }
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize).and_then(|b| b.as_ref())
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    /// Hot path for face culling.
    #[inline]
    pub fn is_opaque(&self, id: BlockId) -> bool {
        self.opaque.get(id as usize).copied().unwrap_or(false)
    }

    #[inline]
    pub fn texture_for(&self, id: BlockId, role: FaceRole) -> TextureId {
        self.get(id)
            .map(|b| b.texture_for(role))
            .unwrap_or(TextureId::UNKNOWN)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: BlocksConfig = toml::from_str(toml_str)?;
        Ok(Self::from_configs(cfg)?)
    }

    pub fn from_configs(cfg: BlocksConfig) -> Result<Self, RegistryError> {
        let mut reg = BlockRegistry {
            textures: TextureCatalog::new(),
            blocks: Vec::new(),
            by_name: HashMap::new(),
            opaque: Vec::new(),
        };
        let mut next_id: BlockId = 0;
        for def in cfg.blocks.into_iter() {
            let id = def.id.unwrap_or(next_id);
            next_id = id.saturating_add(1);
            reg.insert(id, def)?;
        }
        match reg.get(AIR) {
            None => return Err(RegistryError::AirMissing),
            Some(b) if b.opaque => return Err(RegistryError::AirOpaque),
            Some(_) => {}
        }
        log::debug!(
            "block registry: {} blocks, {} textures",
            reg.len(),
            reg.textures.len()
        );
        Ok(reg)
    }

    fn insert(&mut self, id: BlockId, def: BlockDef) -> Result<(), RegistryError> {
        if self.get(id).is_some() {
            return Err(RegistryError::DuplicateId(id));
        }
        if self.by_name.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        let (top, bottom, side) = self.compile_textures(def.textures);
        let ty = BlockType {
            id,
            opaque: def.opaque.unwrap_or(true),
            name: def.name,
            tex_top: top,
            tex_bottom: bottom,
            tex_side: side,
        };
        let idx = id as usize;
        if self.blocks.len() <= idx {
            self.blocks.resize(idx + 1, None);
            self.opaque.resize(idx + 1, false);
        }
        self.opaque[idx] = ty.opaque;
        self.by_name.insert(ty.name.clone(), id);
        self.blocks[idx] = Some(ty);
        Ok(())
    }

    fn compile_textures(
        &mut self,
        sel: Option<TextureSelector>,
    ) -> (TextureId, TextureId, TextureId) {
        match sel {
            None => (TextureId::UNKNOWN, TextureId::UNKNOWN, TextureId::UNKNOWN),
            Some(TextureSelector::Single(key)) => {
                let t = self.textures.intern(&key);
                (t, t, t)
            }
            Some(TextureSelector::Faces {
                all,
                top,
                bottom,
                side,
            }) => {
                let mut pick = |role: Option<String>| match role.or_else(|| all.clone()) {
                    Some(key) => self.textures.intern(&key),
                    None => TextureId::UNKNOWN,
                };
                let t = pick(top);
                let b = pick(bottom);
                let s = pick(side);
                (t, b, s)
            }
        }
    }
}

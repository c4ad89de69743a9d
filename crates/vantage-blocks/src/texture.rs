use std::collections::HashMap;

use super::types::TextureId;

pub const UNKNOWN_TEXTURE_KEY: &str = "unknown";

#[derive(Clone, Debug)]
pub struct Texture {
    pub id: TextureId,
    pub key: String,
}

/// Interned texture keys. Ids are assigned in first-seen order; `unknown` is always id 0.
#[derive(Clone, Debug)]
pub struct TextureCatalog {
    pub textures: Vec<Texture>,
    pub by_key: HashMap<String, TextureId>,
}

impl Default for TextureCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureCatalog {
    pub fn new() -> Self {
        let mut catalog = Self {
            textures: Vec::new(),
            by_key: HashMap::new(),
        };
        catalog.intern(UNKNOWN_TEXTURE_KEY);
        catalog
    }

    pub fn intern(&mut self, key: &str) -> TextureId {
        if let Some(id) = self.by_key.get(key) {
            return *id;
        }
        let id = TextureId(self.textures.len() as u16);
        self.by_key.insert(key.to_string(), id);
        self.textures.push(Texture {
            id,
            key: key.to_string(),
        });
        id
    }

    pub fn get_id(&self, key: &str) -> Option<TextureId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0 as usize)
    }

    pub fn key_of(&self, id: TextureId) -> &str {
        self.get(id).map(|t| t.key.as_str()).unwrap_or(UNKNOWN_TEXTURE_KEY)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

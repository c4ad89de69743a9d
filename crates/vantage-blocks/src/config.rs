use serde::Deserialize;

#[derive(Deserialize, Clone, Debug, Default)]
pub struct BlocksConfig {
    #[serde(default)]
    pub blocks: Vec<BlockDef>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u16>,
    #[serde(default)]
    pub opaque: Option<bool>,
    #[serde(default)]
    pub textures: Option<TextureSelector>,
}

/// Either one texture for every face or a per-role table. Missing roles fall back to `all`.
#[derive(Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum TextureSelector {
    Single(String),
    Faces {
        #[serde(default)]
        all: Option<String>,
        #[serde(default)]
        top: Option<String>,
        #[serde(default)]
        bottom: Option<String>,
        #[serde(default)]
        side: Option<String>,
    },
}

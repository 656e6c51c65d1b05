use serde::Deserialize;
use std::collections::HashMap;

/// Contents of a `blocks.toml` file: one `[[blocks]]` entry per type.
#[derive(Deserialize, Debug)]
pub struct BlocksConfig {
    pub blocks: Vec<BlockDef>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u16>,
    // Opaque blocks stop light and hide the faces of their neighbors.
    // Everything else that is not air renders in the transparent pass.
    #[serde(default)]
    pub opaque: Option<bool>,
    #[serde(default)]
    pub liquid: Option<bool>,
    // Affected by gravity (sand, gravel)
    #[serde(default)]
    pub falls: Option<bool>,
    #[serde(default)]
    pub emission: Option<u8>,
    #[serde(default)]
    pub materials: Option<MaterialsDef>,
}

// Materials mapping: all/top/bottom/side, each a material key
#[derive(Deserialize, Debug, Clone, Default)]
pub struct MaterialsDef {
    #[serde(default)]
    pub all: Option<String>,
    #[serde(default)]
    pub top: Option<String>,
    #[serde(default)]
    pub bottom: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct MaterialsConfig {
    #[serde(default)]
    pub atlas: AtlasDef,
    pub materials: HashMap<String, u32>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct AtlasDef {
    #[serde(default = "default_tiles")]
    pub tiles_x: u32,
    #[serde(default = "default_tiles")]
    pub tiles_y: u32,
}

fn default_tiles() -> u32 {
    16
}

impl Default for AtlasDef {
    fn default() -> Self {
        Self {
            tiles_x: default_tiles(),
            tiles_y: default_tiles(),
        }
    }
}

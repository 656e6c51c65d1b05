use std::collections::HashMap;

use super::config::{AtlasDef, MaterialsConfig};
use super::registry::RegistryError;
use super::types::MaterialId;

/// Texture-coordinate rectangle inside the atlas, in `[0,1]` units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

/// Regular grid atlas; tile `i` sits at column `i % tiles_x`, row `i / tiles_x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureAtlas {
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl Default for TextureAtlas {
    fn default() -> Self {
        let def = AtlasDef::default();
        Self {
            tiles_x: def.tiles_x,
            tiles_y: def.tiles_y,
        }
    }
}

impl TextureAtlas {
    #[inline]
    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    pub fn uv_rect(&self, tile: u32) -> UvRect {
        let tile = tile.min(self.tile_count().saturating_sub(1));
        let col = tile % self.tiles_x;
        let row = tile / self.tiles_x;
        let du = 1.0 / self.tiles_x as f32;
        let dv = 1.0 / self.tiles_y as f32;
        UvRect {
            u0: col as f32 * du,
            v0: row as f32 * dv,
            u1: (col + 1) as f32 * du,
            v1: (row + 1) as f32 * dv,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Material {
    pub id: MaterialId,
    pub key: String,
    pub tile: u32,
}

#[derive(Default, Clone, Debug)]
pub struct MaterialCatalog {
    pub atlas: TextureAtlas,
    pub materials: Vec<Material>,
    pub by_key: HashMap<String, MaterialId>,
}

impl MaterialCatalog {
    pub fn new(atlas: TextureAtlas) -> Self {
        Self {
            atlas,
            materials: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn get_id(&self, key: &str) -> Option<MaterialId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    #[inline]
    pub fn uv_rect(&self, id: MaterialId) -> UvRect {
        let tile = self.get(id).map(|m| m.tile).unwrap_or(0);
        self.atlas.uv_rect(tile)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, RegistryError> {
        let cfg: MaterialsConfig = toml::from_str(toml_str)?;
        if cfg.atlas.tiles_x == 0 || cfg.atlas.tiles_y == 0 {
            return Err(RegistryError::EmptyAtlas);
        }
        let mut catalog = MaterialCatalog::new(TextureAtlas {
            tiles_x: cfg.atlas.tiles_x,
            tiles_y: cfg.atlas.tiles_y,
        });
        let mut entries: Vec<(String, u32)> = cfg.materials.into_iter().collect();
        // HashMap iteration order is nondeterministic; sort keys so MaterialId assignment is stable.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, tile) in entries {
            if tile >= catalog.atlas.tile_count() {
                return Err(RegistryError::TileOutOfRange { key, tile });
            }
            let id = MaterialId(catalog.materials.len() as u16);
            catalog.by_key.insert(key.clone(), id);
            catalog.materials.push(Material { id, key, tile });
        }
        Ok(catalog)
    }
}

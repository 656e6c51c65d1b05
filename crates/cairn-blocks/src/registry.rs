use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use super::config::{BlockDef, BlocksConfig};
use super::material::{MaterialCatalog, UvRect};
use super::types::{BlockId, FaceRole, MaterialId};

const BUILTIN_MATERIALS: &str = include_str!("../assets/materials.toml");
const BUILTIN_BLOCKS: &str = include_str!("../assets/blocks.toml");

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse registry toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("atlas must have at least one tile on each axis")]
    EmptyAtlas,
    #[error("material `{key}` points at tile {tile}, outside the atlas")]
    TileOutOfRange { key: String, tile: u32 },
    #[error("block `{block}` references unknown material `{key}`")]
    UnknownMaterial { block: String, key: String },
    #[error("block id {0} is defined twice")]
    DuplicateId(u16),
    #[error("block name `{0}` is defined twice")]
    DuplicateName(String),
    #[error("id 0 must be a non-opaque, non-emissive block named `air`")]
    MissingAir,
    #[error("no block named `{0}`")]
    UnknownBlock(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceMaterials {
    pub top: MaterialId,
    pub bottom: MaterialId,
    pub side: MaterialId,
}

#[derive(Clone, Debug)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    pub opaque: bool,
    pub liquid: bool,
    pub falls: bool,
    pub emission: u8,
    pub materials: FaceMaterials,
}

impl BlockType {
    fn placeholder(id: u16) -> Self {
        BlockType {
            id: BlockId(id),
            name: String::new(),
            opaque: false,
            liquid: false,
            falls: false,
            emission: 0,
            materials: FaceMaterials {
                top: MaterialId(0),
                bottom: MaterialId(0),
                side: MaterialId(0),
            },
        }
    }

    #[inline]
    pub fn is_air(&self) -> bool {
        self.id.is_air()
    }

    /// Rendered in the transparent pass: anything visible that is not opaque.
    #[inline]
    pub fn is_transparent(&self) -> bool {
        !self.opaque && !self.is_air() && !self.name.is_empty()
    }

    #[inline]
    pub fn material_for(&self, role: FaceRole) -> MaterialId {
        match role {
            FaceRole::Top => self.materials.top,
            FaceRole::Bottom => self.materials.bottom,
            FaceRole::Side => self.materials.side,
        }
    }
}

/// Read-only lookup table of block behavior and face textures.
#[derive(Default, Clone, Debug)]
pub struct BlockRegistry {
    pub materials: MaterialCatalog,
    pub blocks: Vec<BlockType>,
    pub by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Registry compiled from the block and material tables bundled with the crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_strs(BUILTIN_MATERIALS, BUILTIN_BLOCKS)
    }

    pub fn load_from_paths(
        materials_path: impl AsRef<Path>,
        blocks_path: impl AsRef<Path>,
    ) -> Result<Self, RegistryError> {
        let materials = fs::read_to_string(materials_path)?;
        let blocks = fs::read_to_string(blocks_path)?;
        Self::from_toml_strs(&materials, &blocks)
    }

    pub fn from_toml_strs(materials_toml: &str, blocks_toml: &str) -> Result<Self, RegistryError> {
        let materials = MaterialCatalog::from_toml_str(materials_toml)?;
        let cfg: BlocksConfig = toml::from_str(blocks_toml)?;
        Self::from_configs(materials, cfg)
    }

    pub fn from_configs(
        materials: MaterialCatalog,
        cfg: BlocksConfig,
    ) -> Result<Self, RegistryError> {
        let mut reg = BlockRegistry {
            materials,
            blocks: Vec::new(),
            by_name: HashMap::new(),
        };
        let mut next_id: u16 = 0;
        for def in cfg.blocks.into_iter() {
            let id = def.id.unwrap_or(next_id);
            next_id = id.saturating_add(1);
            if reg.by_name.contains_key(&def.name) {
                return Err(RegistryError::DuplicateName(def.name));
            }
            if reg
                .blocks
                .get(id as usize)
                .is_some_and(|ty| !ty.name.is_empty())
            {
                return Err(RegistryError::DuplicateId(id));
            }
            let materials = compile_materials(&reg.materials, &def)?;
            let ty = BlockType {
                id: BlockId(id),
                name: def.name.clone(),
                opaque: def.opaque.unwrap_or(true),
                liquid: def.liquid.unwrap_or(false),
                falls: def.falls.unwrap_or(false),
                emission: def.emission.unwrap_or(0).min(15),
                materials,
            };
            while reg.blocks.len() <= id as usize {
                let gap = reg.blocks.len() as u16;
                reg.blocks.push(BlockType::placeholder(gap));
            }
            reg.by_name.insert(def.name, BlockId(id));
            reg.blocks[id as usize] = ty;
        }

        match reg.blocks.first() {
            Some(air) if air.name == "air" && !air.opaque && air.emission == 0 => {}
            _ => return Err(RegistryError::MissingAir),
        }
        Ok(reg)
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id.0 as usize).filter(|ty| !ty.name.is_empty())
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<BlockId, RegistryError> {
        self.id_by_name(name)
            .ok_or_else(|| RegistryError::UnknownBlock(name.to_string()))
    }

    // Unknown ids fall through to air behavior in every predicate below.

    #[inline]
    pub fn is_opaque(&self, id: BlockId) -> bool {
        self.get(id).is_some_and(|ty| ty.opaque)
    }

    #[inline]
    pub fn is_transparent(&self, id: BlockId) -> bool {
        self.get(id).is_some_and(|ty| ty.is_transparent())
    }

    /// Light passes through anything that is not opaque.
    #[inline]
    pub fn is_transmissive(&self, id: BlockId) -> bool {
        !self.is_opaque(id)
    }

    #[inline]
    pub fn is_empty(&self, id: BlockId) -> bool {
        id.is_air() || self.get(id).is_none()
    }

    #[inline]
    pub fn is_liquid(&self, id: BlockId) -> bool {
        self.get(id).is_some_and(|ty| ty.liquid)
    }

    #[inline]
    pub fn falls(&self, id: BlockId) -> bool {
        self.get(id).is_some_and(|ty| ty.falls)
    }

    #[inline]
    pub fn emission(&self, id: BlockId) -> u8 {
        self.get(id).map(|ty| ty.emission).unwrap_or(0)
    }

    /// Atlas tile index for one face role of a block.
    #[inline]
    pub fn face_tile(&self, id: BlockId, role: FaceRole) -> u32 {
        self.get(id)
            .and_then(|ty| self.materials.get(ty.material_for(role)))
            .map(|m| m.tile)
            .unwrap_or(0)
    }

    #[inline]
    pub fn face_uv(&self, id: BlockId, role: FaceRole) -> UvRect {
        self.materials.atlas.uv_rect(self.face_tile(id, role))
    }
}

fn compile_materials(
    matcat: &MaterialCatalog,
    def: &BlockDef,
) -> Result<FaceMaterials, RegistryError> {
    let resolve = |key: &Option<String>| -> Result<Option<MaterialId>, RegistryError> {
        match key {
            None => Ok(None),
            Some(k) => matcat
                .get_id(k)
                .map(Some)
                .ok_or_else(|| RegistryError::UnknownMaterial {
                    block: def.name.clone(),
                    key: k.clone(),
                }),
        }
    };
    let mats = def.materials.clone().unwrap_or_default();
    let fallback = matcat.get_id("unknown").unwrap_or(MaterialId(0));
    let all = resolve(&mats.all)?.unwrap_or(fallback);
    Ok(FaceMaterials {
        top: resolve(&mats.top)?.unwrap_or(all),
        bottom: resolve(&mats.bottom)?.unwrap_or(all),
        side: resolve(&mats.side)?.unwrap_or(all),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATS: &str = r#"
        [atlas]
        tiles_x = 4
        tiles_y = 4
        [materials]
        stone = 1
        grass_top = 2
        grass_side = 3
        dirt = 4
    "#;

    #[test]
    fn builtin_registry_loads() {
        let reg = BlockRegistry::builtin().unwrap();
        assert_eq!(reg.id_by_name("air"), Some(BlockId::AIR));
        for name in [
            "stone", "dirt", "grass", "sand", "water", "glass", "torch", "farmland", "coal_ore",
            "diamond_ore", "bedrock",
        ] {
            assert!(reg.id_by_name(name).is_some(), "missing {name}");
        }
        let water = reg.require("water").unwrap();
        assert!(reg.is_liquid(water));
        assert!(reg.is_transparent(water));
        assert!(!reg.is_opaque(water));
        let sand = reg.require("sand").unwrap();
        assert!(reg.falls(sand));
        assert!(reg.emission(reg.require("torch").unwrap()) > 0);
    }

    #[test]
    fn face_roles_fall_back_to_all() {
        let blocks = r#"
            [[blocks]]
            name = "air"
            opaque = false
            [[blocks]]
            name = "grass"
            materials = { all = "dirt", top = "grass_top", side = "grass_side" }
        "#;
        let reg = BlockRegistry::from_toml_strs(MATS, blocks).unwrap();
        let grass = reg.require("grass").unwrap();
        let ty = reg.get(grass).unwrap();
        let mats = &reg.materials;
        assert_eq!(ty.material_for(FaceRole::Top), mats.get_id("grass_top").unwrap());
        assert_eq!(ty.material_for(FaceRole::Side), mats.get_id("grass_side").unwrap());
        assert_eq!(ty.material_for(FaceRole::Bottom), mats.get_id("dirt").unwrap());
    }

    #[test]
    fn unknown_material_is_rejected() {
        let blocks = r#"
            [[blocks]]
            name = "air"
            opaque = false
            [[blocks]]
            name = "marble"
            materials = { all = "marble" }
        "#;
        let err = BlockRegistry::from_toml_strs(MATS, blocks).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownMaterial { .. }));
    }

    #[test]
    fn air_must_be_id_zero() {
        let blocks = r#"
            [[blocks]]
            name = "stone"
            materials = { all = "stone" }
        "#;
        let err = BlockRegistry::from_toml_strs(MATS, blocks).unwrap_err();
        assert!(matches!(err, RegistryError::MissingAir));
    }

    #[test]
    fn unknown_ids_behave_like_air() {
        let reg = BlockRegistry::builtin().unwrap();
        let bogus = BlockId(u16::MAX);
        assert!(reg.is_empty(bogus));
        assert!(reg.is_transmissive(bogus));
        assert!(!reg.is_transparent(bogus));
        assert_eq!(reg.emission(bogus), 0);
    }
}

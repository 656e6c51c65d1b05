use cairn_blocks::{BlockId, BlockRegistry, RegistryError};
use cairn_chunk::{Biome, Chunk, ChunkCoord, ChunkError};
use fastnoise_lite::{FastNoiseLite, NoiseType};
use thiserror::Error;

use crate::worldgen::{OreRule, WorldGenParams};

#[derive(Debug, Error)]
pub enum WorldGenError {
    #[error("invalid worldgen parameter `{field}`: {reason}")]
    InvalidParams { field: &'static str, reason: String },
    #[error("failed to read worldgen file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse worldgen toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("asked to fill {requested:?} into chunk {actual:?}")]
    CoordMismatch {
        requested: ChunkCoord,
        actual: ChunkCoord,
    },
    #[error("chunk rejected a generated voxel: {0}")]
    Chunk(#[from] ChunkError),
}

/// Column-level terrain decision shared by every voxel in the column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnSample {
    pub height: i32,
    pub biome: Biome,
    /// Cold enough that standing water freezes at sea level.
    pub frozen: bool,
}

// Ore noise is sampled at a different offset per rule so veins don't overlap.
const ORE_RULE_OFFSET: f32 = 1013.0;

/// Read-only noise fields plus parameters. Shared across generation workers
/// behind an `Arc`; `generate` takes `&self`.
pub struct WorldGenerator {
    seed: i64,
    params: WorldGenParams,
    continent: FastNoiseLite,
    elevation: FastNoiseLite,
    temperature: FastNoiseLite,
    humidity: FastNoiseLite,
    ore: FastNoiseLite,
    cave: FastNoiseLite,
}

fn noise(seed: i32, freq: f32) -> FastNoiseLite {
    let mut n = FastNoiseLite::with_seed(seed);
    n.set_noise_type(Some(NoiseType::OpenSimplex2));
    n.set_frequency(Some(freq));
    n
}

#[inline]
fn unit(n: f32) -> f32 {
    ((n + 1.0) * 0.5).clamp(0.0, 1.0)
}

struct GenBlocks<'p> {
    bedrock: BlockId,
    stone: BlockId,
    dirt: BlockId,
    grass: BlockId,
    sand: BlockId,
    snow: BlockId,
    mud: BlockId,
    water: BlockId,
    ice: BlockId,
    ores: Vec<(BlockId, &'p OreRule)>,
}

impl<'p> GenBlocks<'p> {
    fn resolve(reg: &BlockRegistry, params: &'p WorldGenParams) -> Result<Self, RegistryError> {
        let ores = params
            .ores
            .rules
            .iter()
            .map(|r| reg.require(&r.block).map(|id| (id, r)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            bedrock: reg.require("bedrock")?,
            stone: reg.require("stone")?,
            dirt: reg.require("dirt")?,
            grass: reg.require("grass")?,
            sand: reg.require("sand")?,
            snow: reg.require("snow")?,
            mud: reg.require("mud")?,
            water: reg.require("water")?,
            ice: reg.require("ice")?,
            ores,
        })
    }

    fn subsoil(&self, biome: Biome) -> BlockId {
        match biome {
            Biome::Desert | Biome::Ocean => self.sand,
            Biome::Swamp => self.mud,
            _ => self.dirt,
        }
    }
}

impl WorldGenerator {
    pub fn new(seed: i64, params: WorldGenParams) -> Result<Self, WorldGenError> {
        params.validate()?;
        // fold the high half in so seeds differing only above bit 31 diverge
        let base = (seed ^ (seed >> 32)) as i32;
        Ok(Self {
            continent: noise(base, params.continent_frequency),
            elevation: noise(base.wrapping_add(1), params.elevation_frequency),
            temperature: noise(base.wrapping_add(2), params.climate.frequency),
            humidity: noise(base.wrapping_add(3), params.climate.frequency),
            ore: noise(base.wrapping_add(4), params.ores.frequency),
            cave: noise(base.wrapping_add(5), params.caves.frequency),
            seed,
            params,
        })
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn params(&self) -> &WorldGenParams {
        &self.params
    }

    fn climate_biome(&self, temp: f32, humid: f32) -> Biome {
        let c = &self.params.climate;
        if temp < c.cold_below {
            Biome::Tundra
        } else if temp > c.hot_above && humid < c.dry_below {
            Biome::Desert
        } else if temp > c.hot_above && humid > c.humid_above {
            Biome::Swamp
        } else if humid < c.dry_below {
            Biome::Mountains
        } else {
            Biome::Forest
        }
    }

    /// Height and biome of the column at world `(wx, wz)`.
    pub fn column(&self, wx: i32, wz: i32) -> ColumnSample {
        let (x, z) = (wx as f32, wz as f32);
        let p = &self.params;
        let cont = self.continent.get_noise_2d(x, z);
        let elev = self.elevation.get_noise_2d(x, z);
        let temp = unit(self.temperature.get_noise_2d(x, z));
        let humid = unit(self.humidity.get_noise_2d(x, z));

        let climate = self.climate_biome(temp, humid);
        let mut h = p.base_height + cont * p.continent_amplitude + elev * p.elevation_amplitude;
        if climate == Biome::Mountains {
            h += unit(elev) * p.mountain_amplitude;
        }
        let height = (h.round() as i32).clamp(1, p.world_height - 1);
        let biome = if height < p.sea_level {
            Biome::Ocean
        } else {
            climate
        };
        ColumnSample {
            height,
            biome,
            frozen: temp < p.climate.cold_below,
        }
    }

    fn chunk_seed(&self, coord: ChunkCoord) -> u64 {
        (self.seed as u64)
            ^ (coord.cx as i64 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (coord.cy as i64 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
            ^ (coord.cz as i64 as u64).wrapping_mul(0x1656_67B1_9E37_79F9)
    }

    /// Fill every voxel and biome column of `chunk`. The result depends only
    /// on `(coord, seed, params)`.
    pub fn generate(
        &self,
        chunk: &mut Chunk,
        coord: ChunkCoord,
        reg: &BlockRegistry,
    ) -> Result<(), WorldGenError> {
        if chunk.coord() != coord {
            return Err(WorldGenError::CoordMismatch {
                requested: coord,
                actual: chunk.coord(),
            });
        }
        let blocks = GenBlocks::resolve(reg, &self.params)?;
        let dims = chunk.dims();
        let origin = coord.origin(dims);
        let mut rng = fastrand::Rng::with_seed(self.chunk_seed(coord));
        let mut carved = 0usize;
        let mut ores = 0usize;

        for z in 0..dims.sz {
            for x in 0..dims.sx {
                let wx = origin.x + x as i32;
                let wz = origin.z + z as i32;
                let col = self.column(wx, wz);
                chunk.set_biome(x, z, col.biome);
                for y in 0..dims.sy {
                    let wy = origin.y + y as i32;
                    let mut id = self.base_block(&col, wy, &blocks);
                    if self.carves(&col, wx, wy, wz, id, &blocks) {
                        id = BlockId::AIR;
                        carved += 1;
                    } else if id == blocks.stone {
                        if let Some(ore) = self.ore_at(wx, wy, wz, &blocks, &mut rng) {
                            id = ore;
                            ores += 1;
                        }
                    }
                    chunk.try_set_block(x as i32, y as i32, z as i32, id)?;
                }
            }
        }
        log::trace!(
            target: "worldgen",
            "generated {:?}: {} solid, {} ore, {} carved",
            coord,
            chunk.non_air_count(),
            ores,
            carved
        );
        Ok(())
    }

    fn base_block(&self, col: &ColumnSample, wy: i32, b: &GenBlocks<'_>) -> BlockId {
        let p = &self.params;
        let h = col.height;
        if wy < 0 || wy >= p.world_height {
            return BlockId::AIR;
        }
        if wy == 0 {
            return b.bedrock;
        }
        if wy < h - p.subsoil_depth {
            b.stone
        } else if wy < h {
            b.subsoil(col.biome)
        } else if wy == h {
            if h > p.sea_level {
                self.surface_block(col, b)
            } else {
                b.subsoil(col.biome)
            }
        } else if wy <= p.sea_level {
            if wy == p.sea_level && col.frozen {
                b.ice
            } else {
                b.water
            }
        } else {
            BlockId::AIR
        }
    }

    fn surface_block(&self, col: &ColumnSample, b: &GenBlocks<'_>) -> BlockId {
        match col.biome {
            Biome::Forest => b.grass,
            Biome::Desert | Biome::Ocean => b.sand,
            Biome::Tundra => b.snow,
            Biome::Swamp => b.mud,
            Biome::Mountains if col.height >= self.params.rock_line => b.stone,
            Biome::Mountains => b.grass,
        }
    }

    fn carves(&self, col: &ColumnSample, wx: i32, wy: i32, wz: i32, id: BlockId, b: &GenBlocks<'_>) -> bool {
        let cv = &self.params.caves;
        if !cv.enable || id.is_air() || id == b.bedrock || id == b.water || id == b.ice {
            return false;
        }
        if wy < cv.min_y || wy > cv.max_y || wy >= col.height - cv.surface_guard {
            return false;
        }
        let n = self
            .cave
            .get_noise_3d(wx as f32, wy as f32 * cv.y_squash, wz as f32);
        n.abs() < cv.threshold
    }

    fn ore_at(
        &self,
        wx: i32,
        wy: i32,
        wz: i32,
        b: &GenBlocks<'_>,
        rng: &mut fastrand::Rng,
    ) -> Option<BlockId> {
        for (k, (id, rule)) in b.ores.iter().enumerate() {
            if rule.below_y.is_some_and(|limit| wy >= limit) {
                continue;
            }
            let off = k as f32 * ORE_RULE_OFFSET;
            let n = self
                .ore
                .get_noise_3d(wx as f32 + off, wy as f32, wz as f32 - off);
            if n > rule.threshold && rng.f32() < rule.chance {
                return Some(*id);
            }
        }
        None
    }
}

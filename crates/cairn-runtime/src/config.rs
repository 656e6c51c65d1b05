use std::fs;
use std::path::Path;
use std::thread;

use cairn_chunk::ChunkDims;
use cairn_lighting::{LightingConfig, MAX_LIGHT};
use cairn_sim::SimConfig;
use cairn_world::WorldGenParams;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub dims: ChunkDims,
    /// Vertical chunk layers; valid world y is `[0, dims.sy * chunks_y)`.
    #[serde(default = "default_chunks_y")]
    pub chunks_y: i32,
    #[serde(default = "default_seed")]
    pub seed: i64,
}

fn default_chunks_y() -> i32 {
    2
}
fn default_seed() -> i64 {
    1337
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            dims: ChunkDims::default(),
            chunks_y: default_chunks_y(),
            seed: default_seed(),
        }
    }
}

impl WorldConfig {
    #[inline]
    pub fn world_height(&self) -> i32 {
        self.dims.sy as i32 * self.chunks_y
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Load radius in chunks, measured on the XZ plane.
    #[serde(default = "default_render_distance")]
    pub render_distance: i32,
    /// Extra chunks kept beyond the load radius before eviction.
    #[serde(default = "default_hysteresis")]
    pub hysteresis: i32,
    /// Generation workers; 0 picks a count from the available cores.
    #[serde(default)]
    pub gen_threads: usize,
    /// Meshing workers; 0 picks a count from the available cores.
    #[serde(default)]
    pub mesh_threads: usize,
}

fn default_render_distance() -> i32 {
    6
}
fn default_hysteresis() -> i32 {
    2
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            render_distance: default_render_distance(),
            hysteresis: default_hysteresis(),
            gen_threads: 0,
            mesh_threads: 0,
        }
    }
}

impl StreamingConfig {
    /// `(generation, meshing)` worker counts after resolving automatic sizing.
    pub fn worker_counts(&self) -> (usize, usize) {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        let mesh = if self.mesh_threads > 0 {
            self.mesh_threads
        } else {
            (cores / 4).max(1)
        };
        let gen_workers = if self.gen_threads > 0 {
            self.gen_threads
        } else {
            cores.saturating_sub(mesh).max(1)
        };
        (gen_workers, mesh)
    }

    /// Chunks strictly farther than this (horizontally) are evicted.
    #[inline]
    pub fn evict_distance(&self) -> i32 {
        self.render_distance + self.hysteresis
    }
}

/// Everything the engine reads at startup. Each table may be omitted from
/// the TOML file and falls back to its defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub lighting: LightingConfig,
    #[serde(default)]
    pub updates: SimConfig,
    #[serde(default)]
    pub worldgen: WorldGenParams,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&s)?;
        log::info!(target: "config", "loaded engine config from {}", path.display());
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn bad(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }
        let w = &self.world;
        if w.dims.sx == 0 || w.dims.sy == 0 || w.dims.sz == 0 {
            return Err(bad("world.dims", "every axis must be non-zero"));
        }
        if w.dims.sx != w.dims.sz {
            return Err(bad("world.dims", "sx and sz must match"));
        }
        if w.dims.sy > i16::MAX as usize {
            return Err(bad("world.dims.sy", format!("must not exceed {}", i16::MAX)));
        }
        if w.chunks_y < 1 {
            return Err(bad("world.chunks_y", "must be at least 1"));
        }
        let s = &self.streaming;
        if s.render_distance < 0 {
            return Err(bad("streaming.render_distance", "must not be negative"));
        }
        if s.hysteresis < 1 {
            return Err(bad(
                "streaming.hysteresis",
                "must be at least 1 so chunks at the load edge do not thrash",
            ));
        }
        if self.lighting.budget_per_tick == 0 {
            return Err(bad("lighting.budget_per_tick", "must be at least 1"));
        }
        if !(0..=i32::from(MAX_LIGHT)).contains(&self.lighting.emitter_radius) {
            return Err(bad(
                "lighting.emitter_radius",
                format!("must lie in [0, {MAX_LIGHT}]"),
            ));
        }
        if self.updates.max_updates_per_tick == 0 {
            return Err(bad("updates.max_updates_per_tick", "must be at least 1"));
        }
        if self.updates.farmland_water_radius < 0 {
            return Err(bad("updates.farmland_water_radius", "must not be negative"));
        }
        self.worldgen.validate()?;
        if self.worldgen.world_height > w.world_height() {
            return Err(bad(
                "worldgen.world_height",
                format!(
                    "{} exceeds the {} voxels spanned by the chunk layers",
                    self.worldgen.world_height,
                    w.world_height()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.world.dims, ChunkDims::new(16, 64));
        assert_eq!(cfg.world.chunks_y, 2);
        assert_eq!(cfg.streaming.hysteresis, 2);
        assert_eq!(cfg.lighting.budget_per_tick, 100);
        assert_eq!(cfg.updates.max_updates_per_tick, 1024);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [world]
            seed = 99

            [streaming]
            render_distance = 3
            gen_threads = 2

            [worldgen]
            sea_level = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.world.seed, 99);
        assert_eq!(cfg.world.chunks_y, 2);
        assert_eq!(cfg.streaming.render_distance, 3);
        assert_eq!(cfg.streaming.worker_counts().0, 2);
        assert_eq!(cfg.worldgen.sea_level, 30);
        assert_eq!(cfg.worldgen.world_height, 128);
    }

    #[test]
    fn zero_hysteresis_is_rejected() {
        let err = EngineConfig::from_toml_str("[streaming]\nhysteresis = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "streaming.hysteresis",
                ..
            }
        ));
    }

    #[test]
    fn terrain_taller_than_layers_is_rejected() {
        let err = EngineConfig::from_toml_str("[world]\nchunks_y = 1\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "worldgen.world_height",
                ..
            }
        ));
    }

    #[test]
    fn worldgen_errors_surface() {
        let err = EngineConfig::from_toml_str("[worldgen]\ncontinent_frequency = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::WorldGen(_)));
    }

    #[test]
    fn sample_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets/cairn.toml");
        let cfg = EngineConfig::load_from_path(path).unwrap();
        assert_eq!(cfg.world.seed, 1337);
        assert_eq!(cfg.worldgen.ores.rules.len(), 4);
        assert!(cfg.worldgen.caves.enable);
    }

    #[test]
    fn automatic_worker_counts_are_positive() {
        let (g, m) = StreamingConfig::default().worker_counts();
        assert!(g >= 1 && m >= 1);
    }
}

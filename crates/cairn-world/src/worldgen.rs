use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::generator::WorldGenError;

/// Terrain parameters, loadable as a `[worldgen]` TOML table.
///
/// Every field has a default so a partial table only overrides what it names.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WorldGenParams {
    /// Total world height in voxels. Config validation rejects a value above
    /// the layout's `H * chunks_y`.
    #[serde(default = "default_world_height")]
    pub world_height: i32,
    #[serde(default = "default_sea_level")]
    pub sea_level: i32,
    #[serde(default = "default_base_height")]
    pub base_height: f32,
    #[serde(default = "default_continent_freq")]
    pub continent_frequency: f32,
    #[serde(default = "default_continent_amp")]
    pub continent_amplitude: f32,
    #[serde(default = "default_elevation_freq")]
    pub elevation_frequency: f32,
    #[serde(default = "default_elevation_amp")]
    pub elevation_amplitude: f32,
    #[serde(default = "default_mountain_amp")]
    pub mountain_amplitude: f32,
    /// Five layers of biome subsoil sit between stone and the surface block.
    #[serde(default = "default_subsoil_depth")]
    pub subsoil_depth: i32,
    /// Mountain columns at or above this height show bare stone.
    #[serde(default = "default_rock_line")]
    pub rock_line: i32,
    #[serde(default)]
    pub climate: ClimateParams,
    #[serde(default)]
    pub ores: OreParams,
    #[serde(default)]
    pub caves: CaveParams,
}

fn default_world_height() -> i32 {
    128
}
fn default_sea_level() -> i32 {
    40
}
fn default_base_height() -> f32 {
    46.0
}
fn default_continent_freq() -> f32 {
    0.0035
}
fn default_continent_amp() -> f32 {
    22.0
}
fn default_elevation_freq() -> f32 {
    0.02
}
fn default_elevation_amp() -> f32 {
    8.0
}
fn default_mountain_amp() -> f32 {
    30.0
}
fn default_subsoil_depth() -> i32 {
    5
}
fn default_rock_line() -> i32 {
    84
}

impl Default for WorldGenParams {
    fn default() -> Self {
        Self {
            world_height: default_world_height(),
            sea_level: default_sea_level(),
            base_height: default_base_height(),
            continent_frequency: default_continent_freq(),
            continent_amplitude: default_continent_amp(),
            elevation_frequency: default_elevation_freq(),
            elevation_amplitude: default_elevation_amp(),
            mountain_amplitude: default_mountain_amp(),
            subsoil_depth: default_subsoil_depth(),
            rock_line: default_rock_line(),
            climate: ClimateParams::default(),
            ores: OreParams::default(),
            caves: CaveParams::default(),
        }
    }
}

/// Temperature and humidity are sampled in `[0,1]`; biome choice compares
/// them against these thresholds.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClimateParams {
    #[serde(default = "default_climate_freq")]
    pub frequency: f32,
    #[serde(default = "default_cold")]
    pub cold_below: f32,
    #[serde(default = "default_hot")]
    pub hot_above: f32,
    #[serde(default = "default_dry")]
    pub dry_below: f32,
    #[serde(default = "default_humid")]
    pub humid_above: f32,
}
fn default_climate_freq() -> f32 {
    0.004
}
fn default_cold() -> f32 {
    0.3
}
fn default_hot() -> f32 {
    0.6
}
fn default_dry() -> f32 {
    0.4
}
fn default_humid() -> f32 {
    0.62
}
impl Default for ClimateParams {
    fn default() -> Self {
        Self {
            frequency: default_climate_freq(),
            cold_below: default_cold(),
            hot_above: default_hot(),
            dry_below: default_dry(),
            humid_above: default_humid(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OreParams {
    #[serde(default = "default_ore_freq")]
    pub frequency: f32,
    /// Checked in order; the first rule that fires wins the voxel.
    #[serde(default = "default_ore_rules")]
    pub rules: Vec<OreRule>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OreRule {
    pub block: String,
    /// Only placed strictly below this world y.
    #[serde(default)]
    pub below_y: Option<i32>,
    pub threshold: f32,
    pub chance: f32,
}

fn default_ore_freq() -> f32 {
    0.11
}
fn default_ore_rules() -> Vec<OreRule> {
    let rule = |block: &str, below_y: Option<i32>, threshold: f32, chance: f32| OreRule {
        block: block.into(),
        below_y,
        threshold,
        chance,
    };
    vec![
        rule("diamond_ore", Some(16), 0.72, 0.35),
        rule("gold_ore", Some(32), 0.68, 0.4),
        rule("iron_ore", Some(64), 0.6, 0.5),
        rule("coal_ore", None, 0.55, 0.6),
    ]
}
impl Default for OreParams {
    fn default() -> Self {
        Self {
            frequency: default_ore_freq(),
            rules: default_ore_rules(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CaveParams {
    #[serde(default = "default_caves_enable")]
    pub enable: bool,
    #[serde(default = "default_cave_freq")]
    pub frequency: f32,
    /// Vertical coordinates are stretched by this factor before sampling,
    /// which flattens tunnels into wide horizontal passages.
    #[serde(default = "default_y_squash")]
    pub y_squash: f32,
    #[serde(default = "default_cave_threshold")]
    pub threshold: f32,
    #[serde(default = "default_cave_min_y")]
    pub min_y: i32,
    #[serde(default = "default_cave_max_y")]
    pub max_y: i32,
    /// Voxels this close below the column surface are never carved.
    #[serde(default = "default_surface_guard")]
    pub surface_guard: i32,
}
fn default_caves_enable() -> bool {
    true
}
fn default_cave_freq() -> f32 {
    0.045
}
fn default_y_squash() -> f32 {
    2.0
}
fn default_cave_threshold() -> f32 {
    0.085
}
fn default_cave_min_y() -> i32 {
    2
}
fn default_cave_max_y() -> i32 {
    100
}
fn default_surface_guard() -> i32 {
    4
}
impl Default for CaveParams {
    fn default() -> Self {
        Self {
            enable: default_caves_enable(),
            frequency: default_cave_freq(),
            y_squash: default_y_squash(),
            threshold: default_cave_threshold(),
            min_y: default_cave_min_y(),
            max_y: default_cave_max_y(),
            surface_guard: default_surface_guard(),
        }
    }
}

impl WorldGenParams {
    pub fn from_toml_str(s: &str) -> Result<Self, WorldGenError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, WorldGenError> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Reject parameter sets the generator cannot honor.
    pub fn validate(&self) -> Result<(), WorldGenError> {
        fn bad(field: &'static str, reason: impl Into<String>) -> WorldGenError {
            WorldGenError::InvalidParams {
                field,
                reason: reason.into(),
            }
        }
        let freqs = [
            ("continent_frequency", self.continent_frequency),
            ("elevation_frequency", self.elevation_frequency),
            ("climate.frequency", self.climate.frequency),
            ("ores.frequency", self.ores.frequency),
            ("caves.frequency", self.caves.frequency),
        ];
        for (field, f) in freqs {
            if !f.is_finite() || f <= 0.0 {
                return Err(bad(field, format!("must be finite and > 0, got {f}")));
            }
        }
        if self.world_height < 2 {
            return Err(bad("world_height", "must be at least 2"));
        }
        if self.sea_level < 1 || self.sea_level >= self.world_height {
            return Err(bad(
                "sea_level",
                format!("must lie in [1, {}), got {}", self.world_height, self.sea_level),
            ));
        }
        if self.subsoil_depth < 0 {
            return Err(bad("subsoil_depth", "must not be negative"));
        }
        let c = &self.climate;
        if !(0.0..=1.0).contains(&c.cold_below) || !(0.0..=1.0).contains(&c.hot_above) || c.cold_below >= c.hot_above {
            return Err(bad("climate", "need 0 <= cold_below < hot_above <= 1"));
        }
        if !(0.0..=1.0).contains(&c.dry_below) || !(0.0..=1.0).contains(&c.humid_above) || c.dry_below >= c.humid_above {
            return Err(bad("climate", "need 0 <= dry_below < humid_above <= 1"));
        }
        for rule in &self.ores.rules {
            if !(0.0..=1.0).contains(&rule.chance) {
                return Err(bad("ores.rules.chance", format!("{}: must lie in [0, 1]", rule.block)));
            }
        }
        let cv = &self.caves;
        if cv.min_y > cv.max_y {
            return Err(bad("caves", "min_y must not exceed max_y"));
        }
        if cv.surface_guard < 1 {
            return Err(bad("caves.surface_guard", "must be at least 1"));
        }
        if !cv.y_squash.is_finite() || cv.y_squash <= 0.0 {
            return Err(bad("caves.y_squash", "must be finite and > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_table_keeps_defaults() {
        let p = WorldGenParams::from_toml_str(
            r#"
            sea_level = 30
            [caves]
            enable = false
            "#,
        )
        .unwrap();
        assert_eq!(p.sea_level, 30);
        assert!(!p.caves.enable);
        assert_eq!(p.caves.surface_guard, default_surface_guard());
        assert_eq!(p.ores.rules.len(), 4);
        p.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut p = WorldGenParams::default();
        p.elevation_frequency = 0.0;
        assert!(p.validate().is_err());

        let mut p = WorldGenParams::default();
        p.sea_level = p.world_height;
        assert!(p.validate().is_err());

        let mut p = WorldGenParams::default();
        p.climate.cold_below = 0.9;
        assert!(p.validate().is_err());

        let mut p = WorldGenParams::default();
        p.caves.surface_guard = 0;
        assert!(p.validate().is_err());
    }
}

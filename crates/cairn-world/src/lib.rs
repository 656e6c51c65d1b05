//! Deterministic terrain generation: noise fields, biomes, ores, and caves.
#![forbid(unsafe_code)]

mod generator;
pub mod worldgen;

pub use generator::{ColumnSample, WorldGenError, WorldGenerator};
pub use worldgen::{CaveParams, ClimateParams, OreParams, OreRule, WorldGenParams};

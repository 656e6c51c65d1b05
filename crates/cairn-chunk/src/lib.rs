//! Chunk coordinates and palette-compressed voxel storage.
#![forbid(unsafe_code)]

mod biome;
mod chunk;
mod coord;
mod palette;

pub use biome::Biome;
pub use chunk::{Chunk, ChunkError};
pub use coord::{BlockPos, ChunkCoord, ChunkDims, LocalPos};
pub use palette::{BlockPalette, MAX_PALETTE_ENTRIES};

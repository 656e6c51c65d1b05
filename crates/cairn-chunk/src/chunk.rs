use std::fmt;

use cairn_blocks::{BlockId, BlockRegistry};
use thiserror::Error;

use crate::biome::Biome;
use crate::coord::{BlockPos, ChunkCoord, ChunkDims, LocalPos};
use crate::palette::{BlockPalette, MAX_PALETTE_ENTRIES};

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("local position ({x}, {y}, {z}) is outside the chunk")]
    OutOfBounds { x: i32, y: i32, z: i32 },
    #[error("palette already holds {MAX_PALETTE_ENTRIES} block types")]
    PaletteFull,
    #[error("palette entry 0 must be air")]
    PaletteMissingAir,
    #[error("block {0:?} appears twice in the palette")]
    PaletteDuplicate(BlockId),
    #[error("expected {expected} {what}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("voxel {index} references palette slot {slot}, palette has {len} entries")]
    BadPaletteIndex { index: usize, slot: u8, len: usize },
}

/// Fixed-size voxel volume: one palette index per voxel plus per-column data.
///
/// Cloning is a full copy; mesh workers build from such snapshots so they
/// never hold a chunk lock.
#[derive(Clone)]
pub struct Chunk {
    coord: ChunkCoord,
    dims: ChunkDims,
    voxels: Vec<u8>,
    palette: BlockPalette,
    biomes: Vec<Biome>,
    // highest non-air local y per column, -1 for an empty column
    surface: Vec<i16>,
    dirty: bool,
    revision: u64,
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("dims", &self.dims)
            .field("palette_len", &self.palette.len())
            .field("dirty", &self.dirty)
            .field("revision", &self.revision)
            .finish()
    }
}

impl Chunk {
    /// All-air chunk.
    pub fn new(coord: ChunkCoord, dims: ChunkDims) -> Self {
        Self {
            coord,
            dims,
            voxels: vec![0; dims.volume()],
            palette: BlockPalette::new(),
            biomes: vec![Biome::default(); dims.columns()],
            surface: vec![-1; dims.columns()],
            dirty: false,
            revision: 0,
        }
    }

    /// Rebuild a chunk from the pieces exposed by [`Chunk::palette`],
    /// [`Chunk::indices`] and [`Chunk::biomes`].
    pub fn from_parts(
        coord: ChunkCoord,
        dims: ChunkDims,
        palette: Vec<BlockId>,
        indices: Vec<u8>,
        biomes: Vec<Biome>,
    ) -> Result<Self, ChunkError> {
        if indices.len() != dims.volume() {
            return Err(ChunkError::LengthMismatch {
                what: "voxel indices",
                expected: dims.volume(),
                got: indices.len(),
            });
        }
        if biomes.len() != dims.columns() {
            return Err(ChunkError::LengthMismatch {
                what: "biome columns",
                expected: dims.columns(),
                got: biomes.len(),
            });
        }
        let palette = BlockPalette::from_entries(palette)?;
        if let Some((index, &slot)) = indices
            .iter()
            .enumerate()
            .find(|(_, s)| **s as usize >= palette.len())
        {
            return Err(ChunkError::BadPaletteIndex {
                index,
                slot,
                len: palette.len(),
            });
        }
        let mut chunk = Self {
            coord,
            dims,
            voxels: indices,
            palette,
            biomes,
            surface: vec![-1; dims.columns()],
            dirty: true,
            revision: 1,
        };
        for z in 0..dims.sz {
            for x in 0..dims.sx {
                let col = dims.column_index(x, z);
                chunk.surface[col] = chunk.scan_surface(x, dims.sy, z);
            }
        }
        Ok(chunk)
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn dims(&self) -> ChunkDims {
        self.dims
    }

    #[inline]
    pub fn origin(&self) -> BlockPos {
        self.coord.origin(self.dims)
    }

    /// Block at a local position; anything outside the chunk reads as air.
    #[inline]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        if !self.dims.contains_local(x, y, z) {
            return BlockId::AIR;
        }
        let i = self.dims.index(x as usize, y as usize, z as usize);
        self.palette.block_at(self.voxels[i])
    }

    #[inline]
    pub fn get_local(&self, p: LocalPos) -> BlockId {
        self.get_block(p.x as i32, p.y as i32, p.z as i32)
    }

    #[inline]
    pub fn contains_world(&self, pos: BlockPos) -> bool {
        self.dims.chunk_of(pos) == self.coord
    }

    #[inline]
    pub fn get_world(&self, pos: BlockPos) -> Option<BlockId> {
        if !self.contains_world(pos) {
            return None;
        }
        Some(self.get_local(self.dims.local_of(pos)))
    }

    /// Write a block, returning the previous type.
    pub fn try_set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> Result<BlockId, ChunkError> {
        if !self.dims.contains_local(x, y, z) {
            return Err(ChunkError::OutOfBounds { x, y, z });
        }
        let (ux, uy, uz) = (x as usize, y as usize, z as usize);
        let i = self.dims.index(ux, uy, uz);
        let prev = self.palette.block_at(self.voxels[i]);
        if prev == id {
            return Ok(prev);
        }
        let slot = self.palette.get_or_add(id)?;
        self.voxels[i] = slot;
        self.dirty = true;
        self.revision += 1;

        let col = self.dims.column_index(ux, uz);
        let top = self.surface[col];
        if !id.is_air() {
            if y > i32::from(top) {
                self.surface[col] = y as i16;
            }
        } else if y == i32::from(top) {
            self.surface[col] = self.scan_surface(ux, uy, uz);
        }
        Ok(prev)
    }

    /// Like [`Chunk::try_set_block`] but swallows refusals: out-of-range
    /// writes are ignored and a full palette is logged. `None` means nothing
    /// was written.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> Option<BlockId> {
        match self.try_set_block(x, y, z, id) {
            Ok(prev) => Some(prev),
            Err(ChunkError::PaletteFull) => {
                log::warn!(
                    target: "chunk",
                    "palette full in {:?}; refused write of {:?} at ({}, {}, {})",
                    self.coord,
                    id,
                    x,
                    y,
                    z
                );
                None
            }
            Err(_) => None,
        }
    }

    pub fn set_world(&mut self, pos: BlockPos, id: BlockId) -> Option<BlockId> {
        if !self.contains_world(pos) {
            return None;
        }
        let l = self.dims.local_of(pos);
        self.set_block(l.x as i32, l.y as i32, l.z as i32, id)
    }

    // First non-air local y strictly below `below`, or -1.
    fn scan_surface(&self, x: usize, below: usize, z: usize) -> i16 {
        (0..below)
            .rev()
            .find(|&y| self.voxels[self.dims.index(x, y, z)] != 0)
            .map(|y| y as i16)
            .unwrap_or(-1)
    }

    /// Highest non-air local y in a column, or -1.
    #[inline]
    pub fn surface_height(&self, x: usize, z: usize) -> i32 {
        if x >= self.dims.sx || z >= self.dims.sz {
            return -1;
        }
        i32::from(self.surface[self.dims.column_index(x, z)])
    }

    /// Highest local y in a column that blocks light, or -1.
    pub fn column_top(&self, x: usize, z: usize, reg: &BlockRegistry) -> i32 {
        let top = self.surface_height(x, z);
        (0..=top)
            .rev()
            .find(|&y| !reg.is_transmissive(self.get_block(x as i32, y, z as i32)))
            .unwrap_or(-1)
    }

    #[inline]
    pub fn biome(&self, x: usize, z: usize) -> Biome {
        if x >= self.dims.sx || z >= self.dims.sz {
            return Biome::default();
        }
        self.biomes[self.dims.column_index(x, z)]
    }

    pub fn set_biome(&mut self, x: usize, z: usize, biome: Biome) {
        if x < self.dims.sx && z < self.dims.sz {
            let col = self.dims.column_index(x, z);
            self.biomes[col] = biome;
        }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag, reporting whether it was set.
    #[inline]
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Bumped on every write that changed a voxel.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn palette(&self) -> &BlockPalette {
        &self.palette
    }

    pub fn indices(&self) -> &[u8] {
        &self.voxels
    }

    pub fn biomes(&self) -> &[Biome] {
        &self.biomes
    }

    #[inline]
    pub fn non_air_count(&self) -> usize {
        self.voxels.iter().filter(|&&s| s != 0).count()
    }

    #[inline]
    pub fn is_all_air(&self) -> bool {
        self.surface.iter().all(|&h| h < 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> Chunk {
        Chunk::new(ChunkCoord::new(0, 0, 0), ChunkDims::new(4, 8))
    }

    #[test]
    fn out_of_range_reads_air_and_writes_are_ignored() {
        let mut c = chunk();
        assert_eq!(c.get_block(-1, 0, 0), BlockId::AIR);
        assert_eq!(c.get_block(0, 8, 0), BlockId::AIR);
        assert_eq!(c.set_block(4, 0, 0, BlockId(3)), None);
        assert!(!c.is_dirty());
        assert_eq!(c.revision(), 0);
    }

    #[test]
    fn unchanged_write_does_not_dirty() {
        let mut c = chunk();
        assert_eq!(c.set_block(1, 1, 1, BlockId::AIR), Some(BlockId::AIR));
        assert!(!c.is_dirty());
        assert_eq!(c.set_block(1, 1, 1, BlockId(2)), Some(BlockId::AIR));
        assert!(c.take_dirty());
        assert!(!c.take_dirty());
        assert_eq!(c.revision(), 1);
    }

    #[test]
    fn surface_tracks_column_edits() {
        let mut c = chunk();
        assert_eq!(c.surface_height(2, 3), -1);
        c.set_block(2, 1, 3, BlockId(1));
        c.set_block(2, 5, 3, BlockId(1));
        assert_eq!(c.surface_height(2, 3), 5);
        c.set_block(2, 5, 3, BlockId::AIR);
        assert_eq!(c.surface_height(2, 3), 1);
        c.set_block(2, 1, 3, BlockId::AIR);
        assert_eq!(c.surface_height(2, 3), -1);
        assert!(c.is_all_air());
    }

    #[test]
    fn column_top_skips_transmissive_blocks() {
        let reg = BlockRegistry::builtin().unwrap();
        let stone = reg.require("stone").unwrap();
        let glass = reg.require("glass").unwrap();
        let mut c = chunk();
        c.set_block(0, 2, 0, stone);
        c.set_block(0, 6, 0, glass);
        assert_eq!(c.surface_height(0, 0), 6);
        assert_eq!(c.column_top(0, 0, &reg), 2);
    }

    #[test]
    fn clone_is_an_independent_snapshot() {
        let mut c = chunk();
        c.set_block(1, 1, 1, BlockId(4));
        let snap = c.clone();
        c.set_block(1, 1, 1, BlockId(5));
        assert_eq!(snap.get_block(1, 1, 1), BlockId(4));
        assert_eq!(snap.revision() + 1, c.revision());
    }

    #[test]
    fn from_parts_validates_indices() {
        let dims = ChunkDims::new(2, 2);
        let coord = ChunkCoord::new(1, 0, -1);
        let err = Chunk::from_parts(
            coord,
            dims,
            vec![BlockId::AIR, BlockId(4)],
            vec![0, 1, 2, 0, 0, 0, 0, 0],
            vec![Biome::Forest; 4],
        )
        .unwrap_err();
        assert!(matches!(err, ChunkError::BadPaletteIndex { index: 2, slot: 2, .. }));

        let err = Chunk::from_parts(coord, dims, vec![BlockId::AIR], vec![0; 3], vec![Biome::Forest; 4])
            .unwrap_err();
        assert!(matches!(err, ChunkError::LengthMismatch { .. }));
    }
}

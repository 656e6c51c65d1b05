use std::collections::HashMap;

use cairn_blocks::BlockId;

use crate::chunk::ChunkError;

/// One byte of storage per voxel caps a chunk at this many distinct types.
pub const MAX_PALETTE_ENTRIES: usize = 256;

/// Insert-only `BlockId <-> u8` dictionary owned by a single chunk.
///
/// Index 0 is always air. An index, once handed out, keeps naming the same
/// block type for as long as the palette lives.
#[derive(Clone, Debug)]
pub struct BlockPalette {
    entries: Vec<BlockId>,
    lookup: HashMap<BlockId, u8>,
}

impl Default for BlockPalette {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockPalette {
    pub fn new() -> Self {
        let mut lookup = HashMap::new();
        lookup.insert(BlockId::AIR, 0);
        Self {
            entries: vec![BlockId::AIR],
            lookup,
        }
    }

    /// Rebuild a palette from persisted entries. Entry 0 must be air and no
    /// block type may appear twice.
    pub fn from_entries(entries: Vec<BlockId>) -> Result<Self, ChunkError> {
        if entries.len() > MAX_PALETTE_ENTRIES {
            return Err(ChunkError::PaletteFull);
        }
        if entries.first() != Some(&BlockId::AIR) {
            return Err(ChunkError::PaletteMissingAir);
        }
        let mut lookup = HashMap::with_capacity(entries.len());
        for (i, id) in entries.iter().enumerate() {
            if lookup.insert(*id, i as u8).is_some() {
                return Err(ChunkError::PaletteDuplicate(*id));
            }
        }
        Ok(Self { entries, lookup })
    }

    /// Index for `id`, allocating the next free slot on first use.
    pub fn get_or_add(&mut self, id: BlockId) -> Result<u8, ChunkError> {
        if let Some(&ix) = self.lookup.get(&id) {
            return Ok(ix);
        }
        if self.entries.len() >= MAX_PALETTE_ENTRIES {
            return Err(ChunkError::PaletteFull);
        }
        let ix = self.entries.len() as u8;
        self.entries.push(id);
        self.lookup.insert(id, ix);
        Ok(ix)
    }

    #[inline]
    pub fn index_of(&self, id: BlockId) -> Option<u8> {
        self.lookup.get(&id).copied()
    }

    /// Block type for a stored index; indices never handed out read as air.
    #[inline]
    pub fn block_at(&self, index: u8) -> BlockId {
        self.entries
            .get(index as usize)
            .copied()
            .unwrap_or(BlockId::AIR)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BlockId] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_is_preassigned_index_zero() {
        let mut p = BlockPalette::new();
        assert_eq!(p.index_of(BlockId::AIR), Some(0));
        assert_eq!(p.get_or_add(BlockId::AIR).unwrap(), 0);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let mut p = BlockPalette::new();
        for i in 1..MAX_PALETTE_ENTRIES as u16 {
            p.get_or_add(BlockId(i)).unwrap();
        }
        assert_eq!(p.len(), MAX_PALETTE_ENTRIES);
        assert!(matches!(
            p.get_or_add(BlockId(9999)),
            Err(ChunkError::PaletteFull)
        ));
        // existing entries still resolve after the refusal
        assert_eq!(p.get_or_add(BlockId(255)).unwrap(), 255);
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let res = BlockPalette::from_entries(vec![BlockId::AIR, BlockId(3), BlockId(3)]);
        assert!(matches!(res, Err(ChunkError::PaletteDuplicate(BlockId(3)))));
        let res = BlockPalette::from_entries(vec![BlockId(1)]);
        assert!(matches!(res, Err(ChunkError::PaletteMissingAir)));
    }
}

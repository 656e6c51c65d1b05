use std::collections::{BTreeMap, VecDeque};

use cairn_blocks::{BlockId, BlockRegistry};
use cairn_chunk::{BlockPos, ChunkCoord, ChunkDims};
use hashbrown::HashSet;

use crate::config::SimConfig;
use crate::rules::BlockWorld;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledUpdate {
    pub pos: BlockPos,
    pub due_ms: u64,
    /// Block to place when due; `None` re-runs the rules for whatever is there.
    pub forced: Option<BlockId>,
}

/// Deduplicated, time-ordered queue of pending block updates.
///
/// At most one entry per position is outstanding. Entries with equal due
/// times run in scheduling order.
pub struct BlockUpdateManager {
    pub(crate) cfg: SimConfig,
    // due time -> FIFO of entries
    by_time: BTreeMap<u64, VecDeque<ScheduledUpdate>>,
    scheduled: HashSet<BlockPos>,
    now_ms: u64,
    executed: u64,
}

impl Default for BlockUpdateManager {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl BlockUpdateManager {
    pub fn new(cfg: SimConfig) -> Self {
        Self {
            cfg,
            by_time: BTreeMap::new(),
            scheduled: HashSet::new(),
            now_ms: 0,
            executed: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    #[inline]
    pub fn is_scheduled(&self, pos: BlockPos) -> bool {
        self.scheduled.contains(&pos)
    }

    /// Total entries executed since creation.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Schedule an update `delay_ms` from now. Returns `false` when `pos`
    /// already has an outstanding entry; the existing entry is kept.
    pub fn schedule_block_update(&mut self, pos: BlockPos, delay_ms: u64, forced: Option<BlockId>) -> bool {
        if !self.scheduled.insert(pos) {
            return false;
        }
        let due_ms = self.now_ms.saturating_add(delay_ms);
        self.by_time
            .entry(due_ms)
            .or_default()
            .push_back(ScheduledUpdate { pos, due_ms, forced });
        true
    }

    /// Advance the clock to `now_ms` and run every due entry, oldest first.
    /// Returns the number executed.
    pub fn process_updates(&mut self, now_ms: u64, world: &mut dyn BlockWorld, reg: &BlockRegistry) -> usize {
        self.now_ms = self.now_ms.max(now_ms);
        let mut executed = 0;
        while executed < self.cfg.max_updates_per_tick {
            let next = {
                let Some(mut bucket) = self.by_time.first_entry() else {
                    break;
                };
                if *bucket.key() > self.now_ms {
                    break;
                }
                let next = bucket.get_mut().pop_front();
                if bucket.get().is_empty() {
                    bucket.remove();
                }
                next
            };
            let Some(update) = next else {
                continue;
            };
            self.scheduled.remove(&update.pos);
            self.execute(update, world, reg);
            executed += 1;
        }
        if executed == self.cfg.max_updates_per_tick && self.has_due() {
            log::debug!(target: "sim", "update cap of {} reached, {} entries carried over", executed, self.len());
        }
        self.executed += executed as u64;
        executed
    }

    fn has_due(&self) -> bool {
        self.by_time
            .first_key_value()
            .is_some_and(|(due, _)| *due <= self.now_ms)
    }

    /// Drop every entry inside an unloaded chunk.
    pub fn cancel_chunk(&mut self, coord: ChunkCoord, dims: ChunkDims) {
        let before = self.scheduled.len();
        for bucket in self.by_time.values_mut() {
            bucket.retain(|u| dims.chunk_of(u.pos) != coord);
        }
        self.by_time.retain(|_, bucket| !bucket.is_empty());
        self.scheduled.retain(|p| dims.chunk_of(*p) != coord);
        let dropped = before - self.scheduled.len();
        if dropped > 0 {
            log::debug!(target: "sim", "cancelled {} updates in {:?}", dropped, coord);
        }
    }

    /// Place `id` at `pos` through the world and feed the change back into the rules.
    pub(crate) fn place(&mut self, pos: BlockPos, id: BlockId, world: &mut dyn BlockWorld, reg: &BlockRegistry) {
        if let Some(old) = world.set_block(pos, id) {
            if old != id {
                self.on_block_changed(pos, old, id, world, reg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_positions_are_ignored() {
        let mut m = BlockUpdateManager::default();
        let p = BlockPos::new(1, 2, 3);
        assert!(m.schedule_block_update(p, 100, None));
        assert!(!m.schedule_block_update(p, 5, Some(BlockId(4))));
        assert_eq!(m.len(), 1);
        assert!(m.is_scheduled(p));
    }

    #[test]
    fn cancel_chunk_only_touches_that_chunk() {
        let dims = ChunkDims::new(16, 64);
        let mut m = BlockUpdateManager::default();
        m.schedule_block_update(BlockPos::new(1, 1, 1), 10, None);
        m.schedule_block_update(BlockPos::new(-1, 1, 1), 10, None);
        m.schedule_block_update(BlockPos::new(2, 5, 3), 20, None);
        m.cancel_chunk(ChunkCoord::new(0, 0, 0), dims);
        assert_eq!(m.len(), 1);
        assert!(m.is_scheduled(BlockPos::new(-1, 1, 1)));
        // position is free again after cancellation
        assert!(m.schedule_block_update(BlockPos::new(1, 1, 1), 10, None));
    }
}

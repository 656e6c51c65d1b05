//! Incremental block lighting: budgeted update queue, point-light floods, and
//! column skylight.
#![forbid(unsafe_code)]

use std::collections::VecDeque;

use cairn_blocks::{BlockId, BlockRegistry};
use cairn_chunk::{BlockPos, Chunk, ChunkCoord, ChunkDims};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

pub const MAX_LIGHT: u8 = 15;

/// Read access to world voxels for the lighting pass.
pub trait VoxelView {
    fn dims(&self) -> ChunkDims;
    /// Number of vertical chunk layers; valid world y is `[0, sy * layers)`.
    fn chunk_layers(&self) -> i32;
    /// `None` when the containing chunk is not loaded.
    fn block(&self, pos: BlockPos) -> Option<BlockId>;
    /// Highest light-blocking local y of a column in one chunk (-1 for an
    /// open column), `None` when that chunk is not loaded.
    fn column_top(&self, coord: ChunkCoord, x: usize, z: usize, reg: &BlockRegistry) -> Option<i32>;
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LightingConfig {
    /// Queue entries processed per `process_light_updates` call.
    #[serde(default = "default_budget")]
    pub budget_per_tick: usize,
    /// Positions within this distance of a placed or removed emitter are
    /// re-evaluated.
    #[serde(default = "default_emitter_radius")]
    pub emitter_radius: i32,
}
fn default_budget() -> usize {
    100
}
fn default_emitter_radius() -> i32 {
    5
}
impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            budget_per_tick: default_budget(),
            emitter_radius: default_emitter_radius(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LightStats {
    pub pending: usize,
    pub floods: u64,
    pub voxels_touched: u64,
}

pub struct LightingEngine {
    dims: ChunkDims,
    cfg: LightingConfig,
    volumes: HashMap<ChunkCoord, Box<[u8]>>,
    queue: VecDeque<BlockPos>,
    queued: HashSet<BlockPos>,
    floods: u64,
    voxels_touched: u64,
}

impl LightingEngine {
    pub fn new(dims: ChunkDims, cfg: LightingConfig) -> Self {
        Self {
            dims,
            cfg,
            volumes: HashMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            floods: 0,
            voxels_touched: 0,
        }
    }

    pub fn config(&self) -> &LightingConfig {
        &self.cfg
    }

    /// Allocate a dark light volume for `coord` if none exists. Light already
    /// resting on the seams of loaded neighbours is queued to spread inward.
    pub fn ensure_chunk(&mut self, coord: ChunkCoord) {
        if self.volumes.contains_key(&coord) {
            return;
        }
        self.volumes
            .insert(coord, vec![0u8; self.dims.volume()].into_boxed_slice());
        let mut seeded = 0;
        for (inside, outside) in seam_pairs(self.dims, coord) {
            if self.block_light(outside) > 1 {
                self.enqueue(inside);
                seeded += 1;
            }
        }
        if seeded > 0 {
            log::debug!(target: "light", "{:?} loaded next to lit seams, {} cells queued", coord, seeded);
        }
    }

    /// Drop the light volume of an unloaded chunk and any queued work inside it.
    /// Light it passed into loaded neighbours is withdrawn and re-derived.
    pub fn forget_chunk(&mut self, coord: ChunkCoord) {
        if !self.volumes.contains_key(&coord) {
            return;
        }
        let seeds: Vec<(BlockPos, u8)> = seam_pairs(self.dims, coord)
            .into_iter()
            .filter(|(_, outside)| self.slot(*outside).is_some())
            .map(|(inside, _)| (inside, self.block_light(inside)))
            .filter(|&(_, level)| level > 0)
            .collect();
        self.volumes.remove(&coord);
        let dims = self.dims;
        let before = self.queue.len();
        self.queue.retain(|p| dims.chunk_of(*p) != coord);
        self.queued.retain(|p| dims.chunk_of(*p) != coord);
        let dropped = before - self.queue.len();
        if dropped > 0 {
            log::debug!(target: "light", "forgot {:?}, dropped {} queued updates", coord, dropped);
        }
        self.unlight(seeds);
    }

    #[inline]
    pub fn has_chunk(&self, coord: ChunkCoord) -> bool {
        self.volumes.contains_key(&coord)
    }

    /// Queue every emitter in a freshly loaded chunk.
    pub fn enqueue_chunk_emitters(&mut self, chunk: &Chunk, reg: &BlockRegistry) {
        let dims = chunk.dims();
        let origin = chunk.origin();
        // palette lookup first so emitter-free chunks skip the voxel scan
        if !chunk.palette().entries().iter().any(|id| reg.emission(*id) > 0) {
            return;
        }
        for y in 0..dims.sy as i32 {
            for z in 0..dims.sz as i32 {
                for x in 0..dims.sx as i32 {
                    if reg.emission(chunk.get_block(x, y, z)) > 0 {
                        self.enqueue(origin.offset(x, y, z));
                    }
                }
            }
        }
    }

    #[inline]
    fn slot(&self, pos: BlockPos) -> Option<(ChunkCoord, usize)> {
        let (coord, l) = self.dims.split(pos);
        if !self.volumes.contains_key(&coord) {
            return None;
        }
        Some((coord, self.dims.index(l.x, l.y, l.z)))
    }

    /// Point-light level at `pos`; 0 where no volume is loaded.
    #[inline]
    pub fn block_light(&self, pos: BlockPos) -> u8 {
        let (coord, l) = self.dims.split(pos);
        self.volumes
            .get(&coord)
            .map(|v| v[self.dims.index(l.x, l.y, l.z)])
            .unwrap_or(0)
    }

    // Returns true when the stored value changed.
    fn set_block_light(&mut self, pos: BlockPos, level: u8) -> bool {
        let Some((coord, i)) = self.slot(pos) else {
            return false;
        };
        match self.volumes.get_mut(&coord) {
            Some(v) if v[i] != level => {
                v[i] = level;
                self.voxels_touched += 1;
                true
            }
            _ => false,
        }
    }

    /// 15 above the highest light-blocking voxel of the column across the
    /// loaded vertical layers, else 0. Unloaded layers count as open sky.
    pub fn sky_light(&self, pos: BlockPos, world: &dyn VoxelView, reg: &BlockRegistry) -> u8 {
        let dims = world.dims();
        let layers = world.chunk_layers();
        if pos.y >= dims.sy as i32 * layers {
            return MAX_LIGHT;
        }
        if pos.y < 0 {
            return 0;
        }
        let (coord, l) = dims.split(pos);
        for cy in (coord.cy..layers).rev() {
            let Some(top) = world.column_top(coord.with_y(cy), l.x, l.z, reg) else {
                continue;
            };
            if top >= 0 {
                let top_world = cy * dims.sy as i32 + top;
                return if pos.y > top_world { MAX_LIGHT } else { 0 };
            }
        }
        MAX_LIGHT
    }

    #[inline]
    pub fn light_at(&self, pos: BlockPos, world: &dyn VoxelView, reg: &BlockRegistry) -> u8 {
        self.block_light(pos).max(self.sky_light(pos, world, reg))
    }

    pub fn enqueue(&mut self, pos: BlockPos) {
        if self.queued.insert(pos) {
            self.queue.push_back(pos);
        }
    }

    fn enqueue_radius(&mut self, center: BlockPos) {
        let r = self.cfg.emitter_radius.max(0);
        let r2 = r * r;
        for dy in -r..=r {
            for dz in -r..=r {
                for dx in -r..=r {
                    if dx * dx + dy * dy + dz * dz <= r2 {
                        self.enqueue(center.offset(dx, dy, dz));
                    }
                }
            }
        }
    }

    // Withdraw light that may have flowed out of each seed at its level.
    // Neighbours dimmer than the seed could have been lit through it, so they
    // go dark and are queued; brighter or equal ones have another supply and
    // are queued to spread back into the cleared cells.
    fn unlight(&mut self, seeds: Vec<(BlockPos, u8)>) {
        let mut q: VecDeque<(BlockPos, u8)> = seeds.into();
        let mut cleared = 0usize;
        while let Some((p, level)) = q.pop_front() {
            for n in p.neighbors() {
                let l = self.block_light(n);
                if l == 0 {
                    continue;
                }
                if l < level {
                    self.set_block_light(n, 0);
                    cleared += 1;
                    q.push_back((n, l));
                }
                self.enqueue(n);
            }
        }
        if cleared > 0 {
            log::trace!(target: "light", "withdrew light from {} voxels", cleared);
        }
    }

    /// Record that the voxel at `pos` changed from `old` to `new`.
    pub fn on_block_changed(&mut self, pos: BlockPos, old: BlockId, new: BlockId, reg: &BlockRegistry) {
        let old_e = reg.emission(old);
        let new_e = reg.emission(new);
        // light that started at or passed through `pos` may now be stale
        if (old_e > 0 && old != new) || reg.is_opaque(new) {
            let level = self.block_light(pos);
            if level > 0 {
                self.set_block_light(pos, 0);
                self.unlight(vec![(pos, level)]);
            }
        }
        self.enqueue(pos);
        for n in pos.neighbors() {
            self.enqueue(n);
        }
        if old_e > 0 || new_e > 0 {
            self.enqueue_radius(pos);
        }
    }

    /// Drain up to the configured budget of queued positions. Returns how many
    /// were processed.
    pub fn process_light_updates(&mut self, world: &dyn VoxelView, reg: &BlockRegistry) -> usize {
        let mut processed = 0;
        while processed < self.cfg.budget_per_tick {
            let Some(pos) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&pos);
            processed += 1;
            if self.slot(pos).is_none() {
                continue;
            }
            let Some(id) = world.block(pos) else {
                continue;
            };
            let emission = reg.emission(id);
            if emission > 0 {
                self.flood(pos, emission, world, reg);
                continue;
            }
            let target = if reg.is_transmissive(id) {
                pos.neighbors()
                    .iter()
                    .map(|n| self.block_light(*n))
                    .max()
                    .unwrap_or(0)
                    .saturating_sub(1)
            } else {
                0
            };
            if self.set_block_light(pos, target) {
                for n in pos.neighbors() {
                    self.enqueue(n);
                }
            }
        }
        if processed > 0 {
            log::trace!(target: "light", "processed {} light updates, {} pending", processed, self.queue.len());
        }
        processed
    }

    // Breadth-first spread from one emitter, never dimming a brighter voxel.
    fn flood(&mut self, source: BlockPos, level: u8, world: &dyn VoxelView, reg: &BlockRegistry) {
        self.floods += 1;
        let mut q = VecDeque::new();
        let mut visited = HashSet::new();
        q.push_back((source, level));
        visited.insert(source);
        while let Some((p, lvl)) = q.pop_front() {
            if lvl > self.block_light(p) {
                self.set_block_light(p, lvl);
            }
            if lvl <= 1 {
                continue;
            }
            for n in p.neighbors() {
                if self.slot(n).is_none() || !visited.insert(n) {
                    continue;
                }
                let passes = world.block(n).is_some_and(|id| reg.is_transmissive(id));
                if passes {
                    q.push_back((n, lvl - 1));
                }
            }
        }
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> LightStats {
        LightStats {
            pending: self.queue.len(),
            floods: self.floods,
            voxels_touched: self.voxels_touched,
        }
    }
}

// Every cell on the six faces of `coord`, paired with the cell just outside.
fn seam_pairs(dims: ChunkDims, coord: ChunkCoord) -> Vec<(BlockPos, BlockPos)> {
    let o = coord.origin(dims);
    let (sx, sy, sz) = (dims.sx as i32, dims.sy as i32, dims.sz as i32);
    let mut out = Vec::with_capacity(2 * (sx * sy + sy * sz + sx * sz) as usize);
    for y in 0..sy {
        for z in 0..sz {
            out.push((o.offset(0, y, z), o.offset(-1, y, z)));
            out.push((o.offset(sx - 1, y, z), o.offset(sx, y, z)));
        }
        for x in 0..sx {
            out.push((o.offset(x, y, 0), o.offset(x, y, -1)));
            out.push((o.offset(x, y, sz - 1), o.offset(x, y, sz)));
        }
    }
    for z in 0..sz {
        for x in 0..sx {
            out.push((o.offset(x, 0, z), o.offset(x, -1, z)));
            out.push((o.offset(x, sy - 1, z), o.offset(x, sy, z)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_deduplicates_positions() {
        let mut eng = LightingEngine::new(ChunkDims::new(8, 8), LightingConfig::default());
        let p = BlockPos::new(1, 2, 3);
        eng.enqueue(p);
        eng.enqueue(p);
        assert_eq!(eng.pending(), 1);
    }

    #[test]
    fn forget_chunk_drops_its_queue_entries() {
        let dims = ChunkDims::new(8, 8);
        let mut eng = LightingEngine::new(dims, LightingConfig::default());
        eng.ensure_chunk(ChunkCoord::new(0, 0, 0));
        eng.ensure_chunk(ChunkCoord::new(1, 0, 0));
        eng.enqueue(BlockPos::new(1, 1, 1));
        eng.enqueue(BlockPos::new(9, 1, 1));
        eng.forget_chunk(ChunkCoord::new(0, 0, 0));
        assert_eq!(eng.pending(), 1);
        assert!(!eng.has_chunk(ChunkCoord::new(0, 0, 0)));
        assert_eq!(eng.block_light(BlockPos::new(1, 1, 1)), 0);
    }

    #[test]
    fn emitter_change_enqueues_sphere() {
        let reg = BlockRegistry::builtin().unwrap();
        let torch = reg.require("torch").unwrap();
        let mut eng = LightingEngine::new(ChunkDims::new(16, 16), LightingConfig::default());
        eng.on_block_changed(BlockPos::new(8, 8, 8), BlockId::AIR, torch, &reg);
        // radius 5 ball: 515 lattice points, the center and its neighbors included
        assert_eq!(eng.pending(), 515);
    }
}

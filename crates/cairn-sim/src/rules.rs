use cairn_blocks::{BlockId, BlockRegistry};
use cairn_chunk::BlockPos;

use crate::queue::{BlockUpdateManager, ScheduledUpdate};

/// World access needed by the simulation rules.
pub trait BlockWorld {
    /// `None` when the position is not loaded.
    fn get_block(&self, pos: BlockPos) -> Option<BlockId>;
    /// Write a block, returning the previous type; `None` when nothing was written.
    fn set_block(&mut self, pos: BlockPos, id: BlockId) -> Option<BlockId>;
    /// Forward a light-affecting change to the lighting collaborator.
    fn request_relight(&mut self, pos: BlockPos, old: BlockId, new: BlockId);
}

// Horizontal neighbors, the directions a resting liquid spreads in.
const SIDEWAYS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

impl BlockUpdateManager {
    /// React to the voxel at `pos` changing from `old` to `new`.
    pub fn on_block_changed(
        &mut self,
        pos: BlockPos,
        old: BlockId,
        new: BlockId,
        world: &mut dyn BlockWorld,
        reg: &BlockRegistry,
    ) {
        if reg.is_transmissive(old) != reg.is_transmissive(new) || reg.emission(old) != reg.emission(new) {
            world.request_relight(pos, old, new);
        }

        if reg.is_empty(new) {
            // neighbors that may now move into the vacated cell
            let above = pos.up();
            for n in pos.neighbors() {
                let Some(nid) = world.get_block(n) else {
                    continue;
                };
                if reg.is_liquid(nid) {
                    let downward = n == above;
                    let sideways = n.y == pos.y && self.liquid_rests(n, &*world, reg);
                    if downward || sideways {
                        self.schedule_block_update(pos, self.cfg.flow_delay_ms, Some(nid));
                    }
                }
                if n == above && reg.falls(nid) {
                    self.schedule_block_update(n, self.cfg.fall_delay_ms, None);
                }
            }
        }

        for n in pos.neighbors() {
            if let Some(nid) = world.get_block(n) {
                self.check_farmland(n, nid, &*world, reg);
            }
        }
        self.placement_rules(pos, new, world, reg);
    }

    // Rules a block applies to itself once it sits at `pos`.
    fn placement_rules(&mut self, pos: BlockPos, id: BlockId, world: &mut dyn BlockWorld, reg: &BlockRegistry) {
        if reg.is_liquid(id) {
            self.spread_liquid(pos, id, &*world, reg);
        }
        if reg.falls(id) && world.get_block(pos.down()).is_some_and(|b| reg.is_empty(b)) {
            self.schedule_block_update(pos, self.cfg.fall_delay_ms, None);
        }
        self.check_farmland(pos, id, &*world, reg);
    }

    fn liquid_rests(&self, pos: BlockPos, world: &dyn BlockWorld, reg: &BlockRegistry) -> bool {
        world.get_block(pos.down()).is_some_and(|b| !reg.is_empty(b))
    }

    fn spread_liquid(&mut self, pos: BlockPos, id: BlockId, world: &dyn BlockWorld, reg: &BlockRegistry) {
        let is_open = |p: BlockPos| world.get_block(p).is_some_and(|b| reg.is_empty(b));
        let below = pos.down();
        if is_open(below) {
            self.schedule_block_update(below, self.cfg.flow_delay_ms, Some(id));
        }
        if !self.liquid_rests(pos, world, reg) {
            return;
        }
        for (dx, dz) in SIDEWAYS {
            let n = pos.offset(dx, 0, dz);
            if is_open(n) {
                self.schedule_block_update(n, self.cfg.flow_delay_ms, Some(id));
            }
        }
    }

    fn check_farmland(&mut self, pos: BlockPos, id: BlockId, world: &dyn BlockWorld, reg: &BlockRegistry) {
        let (Some(farmland), Some(dirt)) = (reg.id_by_name("farmland"), reg.id_by_name("dirt")) else {
            return;
        };
        if id == farmland && !self.water_near(pos, world, reg) {
            self.schedule_block_update(pos, self.cfg.farmland_decay_ms, Some(dirt));
        }
    }

    fn water_near(&self, pos: BlockPos, world: &dyn BlockWorld, reg: &BlockRegistry) -> bool {
        let water = reg.id_by_name("water");
        let is_water = |id: BlockId| match water {
            Some(w) => id == w,
            None => reg.is_liquid(id),
        };
        let r = self.cfg.farmland_water_radius.max(0);
        for dy in -1..=1 {
            for dz in -r..=r {
                for dx in -r..=r {
                    if world.get_block(pos.offset(dx, dy, dz)).is_some_and(is_water) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub(crate) fn execute(&mut self, update: ScheduledUpdate, world: &mut dyn BlockWorld, reg: &BlockRegistry) {
        let pos = update.pos;
        let Some(current) = world.get_block(pos) else {
            return;
        };
        log::trace!(target: "sim", "update at {:?}: {:?} forced={:?}", pos, current, update.forced);
        let dirt = reg.id_by_name("dirt");
        let farmland = reg.id_by_name("farmland");
        match update.forced {
            Some(id) if reg.is_liquid(id) => {
                if reg.is_empty(current) {
                    self.place(pos, id, world, reg);
                }
            }
            // farmland reversion: only if the cell is still dry farmland
            Some(id) if Some(id) == dirt && farmland.is_some() => {
                if Some(current) == farmland && !self.water_near(pos, &*world, reg) {
                    self.place(pos, id, world, reg);
                }
            }
            Some(id) => self.place(pos, id, world, reg),
            None => {
                let below = pos.down();
                let falls_into = world.get_block(below).is_some_and(|b| reg.is_empty(b));
                if reg.falls(current) && falls_into {
                    // the landing placement schedules the next step if there is room
                    self.place(pos, BlockId::AIR, world, reg);
                    self.place(below, current, world, reg);
                } else {
                    self.placement_rules(pos, current, world, reg);
                }
            }
        }
    }
}

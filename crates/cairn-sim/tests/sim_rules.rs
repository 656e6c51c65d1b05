use std::collections::HashMap;

use cairn_blocks::{BlockId, BlockRegistry};
use cairn_chunk::BlockPos;
use cairn_sim::{BlockUpdateManager, BlockWorld, SimConfig};
use proptest::prelude::*;

/// Unbounded map world: everything inside `[-64, 64)` on each axis is loaded.
#[derive(Default)]
struct MapWorld {
    blocks: HashMap<BlockPos, BlockId>,
    writes: Vec<(BlockPos, BlockId)>,
    relights: Vec<BlockPos>,
}

impl MapWorld {
    fn loaded(pos: BlockPos) -> bool {
        [pos.x, pos.y, pos.z].iter().all(|c| (-64..64).contains(c))
    }

    fn fill(&mut self, pos: BlockPos, id: BlockId) {
        self.blocks.insert(pos, id);
    }

    fn at(&self, pos: BlockPos) -> BlockId {
        self.blocks.get(&pos).copied().unwrap_or(BlockId::AIR)
    }
}

impl BlockWorld for MapWorld {
    fn get_block(&self, pos: BlockPos) -> Option<BlockId> {
        Self::loaded(pos).then(|| self.at(pos))
    }

    fn set_block(&mut self, pos: BlockPos, id: BlockId) -> Option<BlockId> {
        if !Self::loaded(pos) {
            return None;
        }
        self.writes.push((pos, id));
        Some(self.blocks.insert(pos, id).unwrap_or(BlockId::AIR))
    }

    fn request_relight(&mut self, pos: BlockPos, _old: BlockId, _new: BlockId) {
        self.relights.push(pos);
    }
}

fn edit(
    m: &mut BlockUpdateManager,
    world: &mut MapWorld,
    reg: &BlockRegistry,
    pos: BlockPos,
    id: BlockId,
) {
    let old = world.set_block(pos, id).unwrap();
    m.on_block_changed(pos, old, id, world, reg);
}

fn run_until(m: &mut BlockUpdateManager, world: &mut MapWorld, reg: &BlockRegistry, end_ms: u64, step_ms: u64) {
    let mut t = m.now_ms();
    while t < end_ms {
        t += step_ms;
        m.process_updates(t, world, reg);
    }
}

fn floor(world: &mut MapWorld, id: BlockId, y: i32, r: i32) {
    for x in -r..=r {
        for z in -r..=r {
            world.fill(BlockPos::new(x, y, z), id);
        }
    }
}

#[test]
fn due_entries_run_in_timestamp_order() {
    let reg = BlockRegistry::builtin().unwrap();
    let stone = reg.require("stone").unwrap();
    let glass = reg.require("glass").unwrap();
    let clay = reg.require("clay").unwrap();
    let mut world = MapWorld::default();
    let mut m = BlockUpdateManager::default();
    let (a, b, c) = (BlockPos::new(0, 0, 0), BlockPos::new(5, 0, 0), BlockPos::new(9, 0, 0));
    m.schedule_block_update(a, 30, Some(stone));
    m.schedule_block_update(b, 10, Some(glass));
    m.schedule_block_update(c, 10, Some(clay));

    assert_eq!(m.process_updates(5, &mut world, &reg), 0);
    assert_eq!(m.process_updates(10, &mut world, &reg), 2);
    assert_eq!(m.process_updates(40, &mut world, &reg), 1);
    let order: Vec<_> = world.writes.iter().map(|(p, _)| *p).collect();
    assert_eq!(order, vec![b, c, a]);
    assert!(m.is_empty());
}

#[test]
fn per_tick_cap_carries_work_over() {
    let reg = BlockRegistry::builtin().unwrap();
    let stone = reg.require("stone").unwrap();
    let mut world = MapWorld::default();
    let mut m = BlockUpdateManager::new(SimConfig {
        max_updates_per_tick: 3,
        ..SimConfig::default()
    });
    for x in 0..5 {
        m.schedule_block_update(BlockPos::new(x, 0, 0), 0, Some(stone));
    }
    assert_eq!(m.process_updates(1, &mut world, &reg), 3);
    assert_eq!(m.process_updates(1, &mut world, &reg), 2);
    assert_eq!(m.executed(), 5);
}

#[test]
fn falling_sand_settles_on_ground() {
    let reg = BlockRegistry::builtin().unwrap();
    let sand = reg.require("sand").unwrap();
    let stone = reg.require("stone").unwrap();
    let mut world = MapWorld::default();
    floor(&mut world, stone, 0, 2);
    let mut m = BlockUpdateManager::default();

    let top = BlockPos::new(0, 10, 0);
    edit(&mut m, &mut world, &reg, top, sand);
    assert!(m.is_scheduled(top));
    run_until(&mut m, &mut world, &reg, 2_000, 50);

    assert_eq!(world.at(BlockPos::new(0, 1, 0)), sand);
    for y in 2..=10 {
        assert_eq!(world.at(BlockPos::new(0, y, 0)), BlockId::AIR, "y={y}");
    }
    assert!(m.is_empty());
    assert!(!world.relights.is_empty());
}

#[test]
fn removing_support_drops_a_sand_column() {
    let reg = BlockRegistry::builtin().unwrap();
    let sand = reg.require("sand").unwrap();
    let stone = reg.require("stone").unwrap();
    let mut world = MapWorld::default();
    floor(&mut world, stone, 0, 1);
    world.fill(BlockPos::new(0, 1, 0), stone);
    for y in 2..5 {
        world.fill(BlockPos::new(0, y, 0), sand);
    }
    let mut m = BlockUpdateManager::default();
    edit(&mut m, &mut world, &reg, BlockPos::new(0, 1, 0), BlockId::AIR);
    run_until(&mut m, &mut world, &reg, 3_000, 50);
    for y in 1..4 {
        assert_eq!(world.at(BlockPos::new(0, y, 0)), sand, "y={y}");
    }
    assert_eq!(world.at(BlockPos::new(0, 4, 0)), BlockId::AIR);
}

#[test]
fn water_flows_down_then_spreads_on_ground() {
    let reg = BlockRegistry::builtin().unwrap();
    let water = reg.require("water").unwrap();
    let stone = reg.require("stone").unwrap();
    let mut world = MapWorld::default();
    floor(&mut world, stone, 0, 3);
    let mut m = BlockUpdateManager::default();
    edit(&mut m, &mut world, &reg, BlockPos::new(0, 3, 0), water);
    // not resting: only the cell below is scheduled
    assert!(m.is_scheduled(BlockPos::new(0, 2, 0)));
    assert!(!m.is_scheduled(BlockPos::new(1, 3, 0)));

    let cfg = SimConfig::default();
    run_until(&mut m, &mut world, &reg, 3 * cfg.flow_delay_ms, 10);
    assert_eq!(world.at(BlockPos::new(0, 1, 0)), water);
    assert_eq!(world.at(BlockPos::new(1, 1, 0)), water);
    assert_eq!(world.at(BlockPos::new(0, 1, -1)), water);
    // nothing spreads sideways in mid-air
    assert_eq!(world.at(BlockPos::new(1, 2, 0)), BlockId::AIR);
}

#[test]
fn dry_farmland_reverts_and_wet_farmland_stays() {
    let reg = BlockRegistry::builtin().unwrap();
    let farmland = reg.require("farmland").unwrap();
    let dirt = reg.require("dirt").unwrap();
    let water = reg.require("water").unwrap();
    let stone = reg.require("stone").unwrap();
    let cfg = SimConfig::default();

    let mut world = MapWorld::default();
    floor(&mut world, stone, -1, 12);
    let mut m = BlockUpdateManager::default();
    let dry = BlockPos::new(-8, 0, 0);
    edit(&mut m, &mut world, &reg, dry, farmland);
    assert!(m.is_scheduled(dry));

    let wet = BlockPos::new(8, 0, 0);
    world.fill(BlockPos::new(10, 0, 0), water);
    edit(&mut m, &mut world, &reg, wet, farmland);
    assert!(!m.is_scheduled(wet));

    run_until(&mut m, &mut world, &reg, cfg.farmland_decay_ms + 1_000, 500);
    assert_eq!(world.at(dry), dirt);
    assert_eq!(world.at(wet), farmland);
}

#[test]
fn reversion_is_skipped_when_water_arrives() {
    let reg = BlockRegistry::builtin().unwrap();
    let farmland = reg.require("farmland").unwrap();
    let water = reg.require("water").unwrap();
    let stone = reg.require("stone").unwrap();
    let mut world = MapWorld::default();
    floor(&mut world, stone, -1, 6);
    let mut m = BlockUpdateManager::default();
    let p = BlockPos::new(0, 0, 0);
    edit(&mut m, &mut world, &reg, p, farmland);
    world.fill(BlockPos::new(2, 0, 0), water);
    run_until(&mut m, &mut world, &reg, SimConfig::default().farmland_decay_ms + 500, 500);
    assert_eq!(world.at(p), farmland);
}

#[test]
fn updates_outside_loaded_area_are_dropped() {
    let reg = BlockRegistry::builtin().unwrap();
    let stone = reg.require("stone").unwrap();
    let mut world = MapWorld::default();
    let mut m = BlockUpdateManager::default();
    m.schedule_block_update(BlockPos::new(500, 0, 0), 0, Some(stone));
    assert_eq!(m.process_updates(1, &mut world, &reg), 1);
    assert!(world.writes.is_empty());
}

proptest! {
    // scheduling any sequence of positions keeps one entry per position
    #[test]
    fn schedule_deduplicates(ops in proptest::collection::vec((-4i32..4, -4i32..4, 0u64..100), 0..200)) {
        let mut m = BlockUpdateManager::default();
        let mut distinct = std::collections::HashSet::new();
        for (x, z, delay) in ops {
            let p = BlockPos::new(x, 0, z);
            let fresh = distinct.insert(p);
            prop_assert_eq!(m.schedule_block_update(p, delay, None), fresh);
        }
        prop_assert_eq!(m.len(), distinct.len());
    }
}

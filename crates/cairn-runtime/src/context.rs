use std::sync::Arc;

use cairn_blocks::{BlockId, BlockRegistry};
use cairn_chunk::{BlockPos, ChunkCoord};
use cairn_geom::Vec3;
use cairn_lighting::LightingEngine;
use cairn_sim::{BlockUpdateManager, BlockWorld};
use cairn_world::WorldGenerator;
use crossbeam_channel::{Receiver, unbounded};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::manager::{ChunkManager, StreamReport, read_chunk};
use crate::mesher::{MeshScheduler, RenderSink};

/// Simulation view over loaded chunks: writes go to chunk storage, relight
/// requests go to the lighting queue.
struct SimWorld<'a> {
    chunks: &'a ChunkManager,
    lighting: &'a mut LightingEngine,
    reg: &'a BlockRegistry,
}

impl BlockWorld for SimWorld<'_> {
    fn get_block(&self, pos: BlockPos) -> Option<BlockId> {
        self.chunks.block_at(pos)
    }

    fn set_block(&mut self, pos: BlockPos, id: BlockId) -> Option<BlockId> {
        self.chunks.set_block_raw(pos, id)
    }

    fn request_relight(&mut self, pos: BlockPos, old: BlockId, new: BlockId) {
        self.lighting.on_block_changed(pos, old, new, self.reg);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub stream: StreamReport,
    pub released: usize,
    pub updates_executed: usize,
    pub updates_pending: usize,
    pub light_processed: usize,
    pub light_pending: usize,
    pub meshes_submitted: usize,
    pub meshes_uploaded: usize,
}

/// Owns one of every manager plus the shared registry. Everything that
/// would otherwise be process-wide state hangs off this value.
pub struct WorldContext {
    cfg: EngineConfig,
    reg: Arc<BlockRegistry>,
    chunks: ChunkManager,
    mesher: MeshScheduler,
    lighting: LightingEngine,
    updates: BlockUpdateManager,
    // coordinates reported by the manager's evict hook
    released_rx: Receiver<ChunkCoord>,
    ticks: u64,
}

impl WorldContext {
    pub fn new(cfg: EngineConfig, reg: BlockRegistry) -> Result<Self, EngineError> {
        cfg.validate()?;
        let reg = Arc::new(reg);
        let generator = Arc::new(WorldGenerator::new(cfg.world.seed, cfg.worldgen.clone())?);
        let mut chunks = ChunkManager::new(&cfg.world, &cfg.streaming, generator, Arc::clone(&reg))?;
        let (released_tx, released_rx) = unbounded();
        chunks.set_evict_hook(Arc::new(move |coord| {
            let _ = released_tx.send(coord);
        }));
        let (_, mesh_workers) = cfg.streaming.worker_counts();
        let mesher = MeshScheduler::new(mesh_workers, Arc::clone(&reg))?;
        let lighting = LightingEngine::new(cfg.world.dims, cfg.lighting.clone());
        let updates = BlockUpdateManager::new(cfg.updates.clone());
        log::info!(
            target: "world",
            "world context ready: seed {}, chunk {}x{}x{}, {} layers, {} block types",
            cfg.world.seed,
            cfg.world.dims.sx,
            cfg.world.dims.sy,
            cfg.world.dims.sz,
            cfg.world.chunks_y,
            reg.blocks.len()
        );
        Ok(Self {
            cfg,
            reg,
            chunks,
            mesher,
            lighting,
            updates,
            released_rx,
            ticks: 0,
        })
    }

    /// One simulation step around `viewer`, with `now_ms` as the update clock.
    pub fn tick(&mut self, viewer: Vec3, now_ms: u64, sink: &mut dyn RenderSink) -> TickReport {
        let stream = self.chunks.update(viewer);

        for &coord in &stream.published {
            self.lighting.ensure_chunk(coord);
            if let Some(shared) = self.chunks.get_chunk(coord) {
                self.lighting.enqueue_chunk_emitters(&read_chunk(&shared), &self.reg);
            }
        }
        let dims = self.chunks.dims();
        for &coord in &stream.evicted {
            self.lighting.forget_chunk(coord);
            self.updates.cancel_chunk(coord, dims);
        }
        let mut released = 0;
        for coord in self.released_rx.try_iter() {
            self.mesher.forget(coord);
            sink.release(coord);
            released += 1;
        }

        let updates_executed = {
            let mut world = SimWorld {
                chunks: &self.chunks,
                lighting: &mut self.lighting,
                reg: &self.reg,
            };
            self.updates.process_updates(now_ms, &mut world, &self.reg)
        };
        let light_processed = self.lighting.process_light_updates(&self.chunks, &self.reg);

        let meshes_submitted = self.mesher.submit_dirty(&self.chunks);
        let meshes_uploaded = self.mesher.drain(&self.chunks, sink);

        self.ticks += 1;
        let report = TickReport {
            tick: self.ticks,
            stream,
            released,
            updates_executed,
            updates_pending: self.updates.len(),
            light_processed,
            light_pending: self.lighting.pending(),
            meshes_submitted,
            meshes_uploaded,
        };
        log::trace!(target: "world", "{:?}", report);
        report
    }

    /// Block at a world position; air when unloaded.
    #[inline]
    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        self.chunks.get_block(pos)
    }

    /// Edit a block and let the simulation and lighting react. Returns the
    /// previous block, `None` when the chunk is not loaded or the write was
    /// refused.
    pub fn set_block(&mut self, pos: BlockPos, id: BlockId) -> Option<BlockId> {
        let old = self.chunks.set_block_raw(pos, id)?;
        if old != id {
            let mut world = SimWorld {
                chunks: &self.chunks,
                lighting: &mut self.lighting,
                reg: &self.reg,
            };
            self.updates.on_block_changed(pos, old, id, &mut world, &self.reg);
        }
        Some(old)
    }

    /// Combined block and sky light at a world position.
    pub fn light_at(&self, pos: BlockPos) -> u8 {
        self.lighting.light_at(pos, &self.chunks, &self.reg)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.reg
    }

    pub fn chunks(&self) -> &ChunkManager {
        &self.chunks
    }

    pub fn mesher(&self) -> &MeshScheduler {
        &self.mesher
    }

    pub fn lighting(&self) -> &LightingEngine {
        &self.lighting
    }

    pub fn updates(&self) -> &BlockUpdateManager {
        &self.updates
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

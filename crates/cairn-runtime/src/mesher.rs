use std::sync::{Arc, TryLockError};

use cairn_blocks::BlockRegistry;
use cairn_chunk::ChunkCoord;
use cairn_mesh_cpu::{ChunkMesh, try_generate_mesh};
use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::EngineError;
use crate::manager::{ChunkManager, SharedChunk, read_chunk};

/// Receives finished chunk geometry. Implemented by the renderer.
pub trait RenderSink {
    fn upload(&mut self, coord: ChunkCoord, mesh: &ChunkMesh);
    fn release(&mut self, coord: ChunkCoord);
}

/// Sink that drops everything; used by headless runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn upload(&mut self, _coord: ChunkCoord, _mesh: &ChunkMesh) {}
    fn release(&mut self, _coord: ChunkCoord) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub built: u64,
    pub stale: u64,
    pub orphaned: u64,
}

/// Meshes dirty chunks on its own worker pool and keeps the newest mesh per
/// chunk. At most one job per chunk is in flight.
pub struct MeshScheduler {
    pool: ThreadPool,
    reg: Arc<BlockRegistry>,
    tx: Sender<ChunkMesh>,
    rx: Receiver<ChunkMesh>,
    // chunk instance each job was built from; a reloaded chunk is a new instance
    in_flight: HashMap<ChunkCoord, SharedChunk>,
    meshes: HashMap<ChunkCoord, Arc<ChunkMesh>>,
    stats: MeshStats,
}

impl MeshScheduler {
    pub fn new(workers: usize, reg: Arc<BlockRegistry>) -> Result<Self, EngineError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("cairn-mesh-{i}"))
            .build()
            .map_err(|source| EngineError::Pool {
                pool: "meshing",
                source,
            })?;
        let (tx, rx) = unbounded();
        Ok(Self {
            pool,
            reg,
            tx,
            rx,
            in_flight: HashMap::new(),
            meshes: HashMap::new(),
            stats: MeshStats::default(),
        })
    }

    /// Queue a mesh job for every dirty loaded chunk that is not already
    /// being meshed. Returns the number submitted.
    ///
    /// Workers mesh a copy taken here, so they hold no chunk lock. A chunk
    /// whose lock is busy is skipped and stays dirty for the next call.
    pub fn submit_dirty(&mut self, chunks: &ChunkManager) -> usize {
        let mut submitted = 0;
        let mut busy = 0;
        for (coord, shared) in chunks.loaded_chunks() {
            if self.in_flight.contains_key(&coord) {
                continue;
            }
            let snapshot = {
                let mut chunk = match shared.try_write() {
                    Ok(guard) => guard,
                    Err(TryLockError::Poisoned(e)) => e.into_inner(),
                    Err(TryLockError::WouldBlock) => {
                        busy += 1;
                        continue;
                    }
                };
                if !chunk.take_dirty() {
                    continue;
                }
                chunk.clone()
            };
            self.in_flight.insert(coord, shared);
            let reg = Arc::clone(&self.reg);
            let tx = self.tx.clone();
            self.pool.spawn(move || {
                let mesh = try_generate_mesh(&snapshot, &reg, &reg.materials.atlas);
                let _ = tx.send(mesh);
            });
            submitted += 1;
        }
        if busy > 0 {
            log::trace!(target: "mesh", "{} chunks locked elsewhere, checked again next tick", busy);
        }
        submitted
    }

    /// Collect finished meshes without blocking. Meshes of evicted chunks or
    /// of outdated revisions are dropped; the rest are stored and uploaded.
    pub fn drain(&mut self, chunks: &ChunkManager, sink: &mut dyn RenderSink) -> usize {
        let mut uploaded = 0;
        while let Ok(mesh) = self.rx.try_recv() {
            let coord = mesh.coord;
            let source = self.in_flight.remove(&coord);
            let Some(shared) = chunks.get_chunk(coord) else {
                self.stats.orphaned += 1;
                continue;
            };
            if !source.is_some_and(|s| Arc::ptr_eq(&s, &shared)) {
                self.stats.orphaned += 1;
                continue;
            }
            let current = read_chunk(&shared).revision();
            if mesh.revision < current {
                // the chunk is still dirty and gets a fresh job next submit
                self.stats.stale += 1;
                continue;
            }
            self.stats.built += 1;
            sink.upload(coord, &mesh);
            self.meshes.insert(coord, Arc::new(mesh));
            uploaded += 1;
        }
        if uploaded > 0 {
            log::trace!(target: "mesh", "uploaded {} meshes, {} in flight", uploaded, self.in_flight.len());
        }
        uploaded
    }

    /// Latest accepted mesh of a chunk.
    pub fn mesh_of(&self, coord: ChunkCoord) -> Option<Arc<ChunkMesh>> {
        self.meshes.get(&coord).cloned()
    }

    /// Drop the stored mesh of an evicted chunk.
    pub fn forget(&mut self, coord: ChunkCoord) -> bool {
        self.meshes.remove(&coord).is_some()
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn stats(&self) -> MeshStats {
        self.stats
    }
}

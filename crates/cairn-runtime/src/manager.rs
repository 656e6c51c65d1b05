use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use cairn_blocks::{BlockId, BlockRegistry};
use cairn_chunk::{BlockPos, Chunk, ChunkCoord, ChunkDims};
use cairn_geom::Vec3;
use cairn_lighting::VoxelView;
use cairn_world::{WorldGenError, WorldGenerator};
use crossbeam_channel::{Receiver, TryRecvError, bounded};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::{StreamingConfig, WorldConfig};
use crate::error::EngineError;

/// A loaded chunk: one writer (the tick thread), many readers.
pub type SharedChunk = Arc<RwLock<Chunk>>;

/// Called with the coordinate of every chunk leaving the loaded set. The
/// manager holds it, so firing it never touches a chunk lock.
pub type EvictHook = Arc<dyn Fn(ChunkCoord) + Send + Sync>;

// A poisoned lock only means a reader panicked; the voxel data is still whole.
pub(crate) fn read_chunk(chunk: &RwLock<Chunk>) -> RwLockReadGuard<'_, Chunk> {
    chunk.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_chunk(chunk: &RwLock<Chunk>) -> RwLockWriteGuard<'_, Chunk> {
    chunk.write().unwrap_or_else(PoisonError::into_inner)
}

type GenResult = Result<Chunk, WorldGenError>;

/// In-flight generation job. The worker sends exactly one result, or drops
/// the sender if it panicked.
pub struct GenHandle {
    rx: Receiver<GenResult>,
    submitted: Instant,
}

enum GenPoll {
    Done(GenResult),
    Lost,
}

impl GenHandle {
    fn poll(&self) -> Option<GenPoll> {
        match self.rx.try_recv() {
            Ok(res) => Some(GenPoll::Done(res)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(GenPoll::Lost),
        }
    }
}

/// What one [`ChunkManager::update`] call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub center: ChunkCoord,
    pub submitted: usize,
    pub published: Vec<ChunkCoord>,
    /// Finished jobs thrown away because the viewer had moved out of range.
    pub discarded: usize,
    pub failed: usize,
    pub evicted: Vec<ChunkCoord>,
}

/// Streams chunks in and out around a moving reference point.
///
/// `loaded` and `pending` are sharded concurrent maps so queries from other
/// threads stay cheap while `update` runs. A coordinate is never in both.
pub struct ChunkManager {
    dims: ChunkDims,
    chunks_y: i32,
    render_distance: i32,
    evict_distance: i32,
    // (dx, dz) inside the load disc, nearest first
    disc: Vec<(i32, i32)>,
    reg: Arc<BlockRegistry>,
    generator: Arc<WorldGenerator>,
    pool: ThreadPool,
    loaded: DashMap<ChunkCoord, SharedChunk>,
    pending: DashMap<ChunkCoord, GenHandle>,
    evict_hook: Option<EvictHook>,
    generated: AtomicU64,
    failures: AtomicU64,
}

impl ChunkManager {
    pub fn new(
        world: &WorldConfig,
        streaming: &StreamingConfig,
        generator: Arc<WorldGenerator>,
        reg: Arc<BlockRegistry>,
    ) -> Result<Self, EngineError> {
        let (workers, _) = streaming.worker_counts();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("cairn-gen-{i}"))
            .build()
            .map_err(|source| EngineError::Pool {
                pool: "generation",
                source,
            })?;
        let r = streaming.render_distance.max(0);
        let mut disc = Vec::new();
        for dz in -r..=r {
            for dx in -r..=r {
                if dx * dx + dz * dz <= r * r {
                    disc.push((dx, dz));
                }
            }
        }
        disc.sort_by_key(|&(dx, dz)| (dx * dx + dz * dz, dz, dx));
        log::info!(
            target: "stream",
            "chunk manager: {} generation workers, radius {} (+{} hysteresis), {} columns x {} layers",
            workers,
            r,
            streaming.hysteresis,
            disc.len(),
            world.chunks_y
        );
        Ok(Self {
            dims: world.dims,
            chunks_y: world.chunks_y,
            render_distance: r,
            evict_distance: streaming.evict_distance(),
            disc,
            reg,
            generator,
            pool,
            loaded: DashMap::new(),
            pending: DashMap::new(),
            evict_hook: None,
            generated: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Install the cleanup callback fired for every evicted chunk.
    pub fn set_evict_hook(&mut self, hook: EvictHook) {
        self.evict_hook = Some(hook);
    }

    #[inline]
    pub fn dims(&self) -> ChunkDims {
        self.dims
    }

    #[inline]
    pub fn chunks_y(&self) -> i32 {
        self.chunks_y
    }

    #[inline]
    pub fn render_distance(&self) -> i32 {
        self.render_distance
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.reg
    }

    pub fn generator(&self) -> &Arc<WorldGenerator> {
        &self.generator
    }

    /// Chunk containing a world-space point.
    pub fn chunk_at(&self, p: Vec3) -> ChunkCoord {
        let (x, y, z) = p.floor_i32();
        self.dims.chunk_of(BlockPos::new(x, y, z))
    }

    /// One streaming step: submit missing chunks in the load disc, collect
    /// finished jobs without blocking, evict chunks past the hysteresis ring.
    pub fn update(&self, reference: Vec3) -> StreamReport {
        let center = self.chunk_at(reference);
        let mut report = StreamReport {
            center,
            ..StreamReport::default()
        };
        self.submit_missing(center, &mut report);
        self.poll_pending(center, &mut report);
        self.evict_far(center, &mut report);
        self.assert_invariants();
        if report.submitted > 0 || !report.published.is_empty() || !report.evicted.is_empty() {
            log::debug!(
                target: "stream",
                "center {:?}: +{} submitted, {} published, {} evicted, {} discarded, {} failed, {} pending",
                center,
                report.submitted,
                report.published.len(),
                report.evicted.len(),
                report.discarded,
                report.failed,
                self.pending.len()
            );
        }
        report
    }

    fn submit_missing(&self, center: ChunkCoord, report: &mut StreamReport) {
        for &(dx, dz) in &self.disc {
            for cy in 0..self.chunks_y {
                let coord = ChunkCoord::new(center.cx + dx, cy, center.cz + dz);
                if self.loaded.contains_key(&coord) {
                    continue;
                }
                if let Entry::Vacant(slot) = self.pending.entry(coord) {
                    slot.insert(self.spawn_generation(coord));
                    report.submitted += 1;
                }
            }
        }
    }

    fn spawn_generation(&self, coord: ChunkCoord) -> GenHandle {
        let (tx, rx) = bounded::<GenResult>(1);
        let generator = Arc::clone(&self.generator);
        let reg = Arc::clone(&self.reg);
        let dims = self.dims;
        self.pool.spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut chunk = Chunk::new(coord, dims);
                generator.generate(&mut chunk, coord, &reg).map(|()| chunk)
            }));
            match outcome {
                Ok(res) => {
                    let _ = tx.send(res);
                }
                // dropping tx reports the loss to the poller
                Err(_) => log::error!(target: "stream", "generation worker panicked on {:?}", coord),
            }
        });
        GenHandle {
            rx,
            submitted: Instant::now(),
        }
    }

    fn poll_pending(&self, center: ChunkCoord, report: &mut StreamReport) {
        let finished: Vec<(ChunkCoord, GenPoll)> = self
            .pending
            .iter()
            .filter_map(|e| e.value().poll().map(|p| (*e.key(), p)))
            .collect();
        let evict_sq = i64::from(self.evict_distance).pow(2);
        for (coord, outcome) in finished {
            let Some((_, handle)) = self.pending.remove(&coord) else {
                continue;
            };
            match outcome {
                GenPoll::Done(Ok(mut chunk)) => {
                    if coord.horizontal_distance_sq(center) > evict_sq {
                        log::trace!(target: "stream", "discarding {:?}, viewer moved away", coord);
                        report.discarded += 1;
                        continue;
                    }
                    // new chunks always get a first mesh, even when all air
                    chunk.mark_dirty();
                    self.loaded.insert(coord, Arc::new(RwLock::new(chunk)));
                    self.generated.fetch_add(1, Ordering::Relaxed);
                    report.published.push(coord);
                    log::trace!(
                        target: "stream",
                        "published {:?} after {} ms",
                        coord,
                        handle.submitted.elapsed().as_millis()
                    );
                }
                GenPoll::Done(Err(e)) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    report.failed += 1;
                    log::warn!(target: "stream", "generation of {:?} failed: {}", coord, e);
                }
                GenPoll::Lost => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    report.failed += 1;
                    log::warn!(target: "stream", "generation of {:?} ended without a result", coord);
                }
            }
        }
    }

    fn evict_far(&self, center: ChunkCoord, report: &mut StreamReport) {
        let evict_sq = i64::from(self.evict_distance).pow(2);
        let far: Vec<ChunkCoord> = self
            .loaded
            .iter()
            .map(|e| *e.key())
            .filter(|c| c.horizontal_distance_sq(center) > evict_sq)
            .collect();
        for coord in far {
            // the removed chunk may still be read elsewhere; dropping our Arc
            // is all eviction needs
            if self.loaded.remove(&coord).is_some() {
                if let Some(hook) = &self.evict_hook {
                    hook(coord);
                }
                report.evicted.push(coord);
            }
        }
    }

    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<SharedChunk> {
        self.loaded.get(&coord).map(|e| Arc::clone(e.value()))
    }

    /// Block at a world position, `None` when its chunk is not loaded.
    pub fn block_at(&self, pos: BlockPos) -> Option<BlockId> {
        let chunk = self.get_chunk(self.dims.chunk_of(pos))?;
        read_chunk(&chunk).get_world(pos)
    }

    /// Block at a world position; air when unloaded.
    #[inline]
    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        self.block_at(pos).unwrap_or(BlockId::AIR)
    }

    /// Write straight into chunk storage without running any rules. Returns
    /// the previous block, `None` if nothing was written.
    ///
    /// Only the tick thread writes. Workers never hold chunk locks, so the
    /// write lock waits at most for a single-voxel query on another thread.
    pub fn set_block_raw(&self, pos: BlockPos, id: BlockId) -> Option<BlockId> {
        let chunk = self.get_chunk(self.dims.chunk_of(pos))?;
        write_chunk(&chunk).set_world(pos, id)
    }

    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        self.loaded.iter().map(|e| *e.key()).collect()
    }

    pub(crate) fn loaded_chunks(&self) -> Vec<(ChunkCoord, SharedChunk)> {
        self.loaded
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect()
    }

    #[inline]
    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.loaded.contains_key(&coord)
    }

    #[inline]
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.pending.contains_key(&coord)
    }

    #[inline]
    pub fn loaded_len(&self) -> usize {
        self.loaded.len()
    }

    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Chunks published since creation.
    pub fn generated_total(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    /// Failed or lost generation jobs since creation.
    pub fn failures_total(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Debug-build check that no coordinate is both loaded and pending.
    pub fn assert_invariants(&self) {
        if cfg!(debug_assertions) {
            for e in self.loaded.iter() {
                debug_assert!(
                    !self.pending.contains_key(e.key()),
                    "{:?} is both loaded and pending",
                    e.key()
                );
            }
        }
    }
}

impl VoxelView for ChunkManager {
    fn dims(&self) -> ChunkDims {
        self.dims
    }

    fn chunk_layers(&self) -> i32 {
        self.chunks_y
    }

    fn block(&self, pos: BlockPos) -> Option<BlockId> {
        self.block_at(pos)
    }

    fn column_top(&self, coord: ChunkCoord, x: usize, z: usize, reg: &BlockRegistry) -> Option<i32> {
        let chunk = self.get_chunk(coord)?;
        let top = read_chunk(&chunk).column_top(x, z, reg);
        Some(top)
    }
}

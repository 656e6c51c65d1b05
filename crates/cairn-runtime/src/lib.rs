//! Chunk streaming, worker pools, and the per-world context that ties
//! generation, lighting, simulation and meshing together.
#![forbid(unsafe_code)]

mod config;
mod context;
mod error;
mod manager;
mod mesher;

pub use config::{EngineConfig, StreamingConfig, WorldConfig};
pub use context::{TickReport, WorldContext};
pub use error::{ConfigError, EngineError};
pub use manager::{ChunkManager, EvictHook, GenHandle, SharedChunk, StreamReport};
pub use mesher::{MeshScheduler, MeshStats, NullSink, RenderSink};

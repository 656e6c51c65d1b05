//! Block types, texture materials, and the block registry.
#![forbid(unsafe_code)]

pub mod config;
pub mod material;
pub mod registry;
pub mod types;

pub use material::{MaterialCatalog, TextureAtlas, UvRect};
pub use registry::{BlockRegistry, BlockType, RegistryError};
pub use types::{BlockId, FaceRole, MaterialId};

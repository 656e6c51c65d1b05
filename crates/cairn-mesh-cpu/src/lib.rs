//! CPU meshing crate: face-culling chunk mesher producing plain vertex buffers.
#![forbid(unsafe_code)]

mod build;
mod face;
mod mesh_build;

pub use build::{ChunkMesh, generate_mesh, try_generate_mesh};
pub use face::Face;
pub use mesh_build::{FLOATS_PER_VERTEX, MeshBuild};

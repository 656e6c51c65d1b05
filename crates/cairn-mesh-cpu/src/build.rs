use std::panic::{AssertUnwindSafe, catch_unwind};

use cairn_blocks::{BlockRegistry, TextureAtlas};
use cairn_chunk::{Chunk, ChunkCoord};
use cairn_geom::{Aabb, Vec3};

use crate::face::Face;
use crate::mesh_build::MeshBuild;

/// CPU-side geometry for one chunk, split by render pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    pub coord: ChunkCoord,
    /// Chunk revision the mesh was built from.
    pub revision: u64,
    pub opaque: MeshBuild,
    pub transparent: MeshBuild,
    pub bbox: Aabb,
}

impl ChunkMesh {
    pub fn empty(coord: ChunkCoord, revision: u64) -> Self {
        Self {
            coord,
            revision,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.opaque.face_count() + self.transparent.face_count()
    }
}

/// Build the face-culled mesh of one chunk.
///
/// Opaque voxels show a face wherever the neighbor is empty or transparent;
/// transparent voxels only where the neighbor is strictly empty. Neighbors
/// outside the chunk read as air, so faces on chunk borders are always kept.
pub fn generate_mesh(chunk: &Chunk, reg: &BlockRegistry, atlas: &TextureAtlas) -> ChunkMesh {
    let mut mesh = ChunkMesh::empty(chunk.coord(), chunk.revision());
    if chunk.is_all_air() {
        return mesh;
    }
    let dims = chunk.dims();
    let origin = chunk.origin();
    let base = Vec3::new(origin.x as f32, origin.y as f32, origin.z as f32);

    for y in 0..dims.sy as i32 {
        for z in 0..dims.sz as i32 {
            for x in 0..dims.sx as i32 {
                let here = chunk.get_block(x, y, z);
                let opaque = reg.is_opaque(here);
                if !opaque && !reg.is_transparent(here) {
                    continue;
                }
                let p = base + Vec3::new(x as f32, y as f32, z as f32);
                let mut emitted = false;
                for face in Face::ALL {
                    let (dx, dy, dz) = face.delta();
                    let there = chunk.get_block(x + dx, y + dy, z + dz);
                    let exposed = if opaque {
                        !reg.is_opaque(there)
                    } else {
                        reg.is_empty(there)
                    };
                    if !exposed {
                        continue;
                    }
                    let uv = atlas.uv_rect(reg.face_tile(here, face.role()));
                    let target = if opaque {
                        &mut mesh.opaque
                    } else {
                        &mut mesh.transparent
                    };
                    target.add_face(face, p, uv);
                    emitted = true;
                }
                if emitted {
                    mesh.bbox.include(p);
                    mesh.bbox.include(p + Vec3::new(1.0, 1.0, 1.0));
                }
            }
        }
    }
    mesh
}

/// [`generate_mesh`] that never unwinds: a panic inside the mesher is logged
/// and turned into an empty mesh for the chunk.
pub fn try_generate_mesh(chunk: &Chunk, reg: &BlockRegistry, atlas: &TextureAtlas) -> ChunkMesh {
    match catch_unwind(AssertUnwindSafe(|| generate_mesh(chunk, reg, atlas))) {
        Ok(mesh) => mesh,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!(target: "mesh", "mesher panicked for {:?}: {}", chunk.coord(), msg);
            ChunkMesh::empty(chunk.coord(), chunk.revision())
        }
    }
}

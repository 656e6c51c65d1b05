use cairn_blocks::UvRect;
use cairn_geom::Vec3;

use crate::face::Face;

/// Interleaved layout: position xyz, normal xyz, uv.
pub const FLOATS_PER_VERTEX: usize = 8;

#[derive(Default, Clone, Debug, PartialEq)]
pub struct MeshBuild {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshBuild {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.indices.len() / 6
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn position(&self, vertex: usize) -> Vec3 {
        let o = vertex * FLOATS_PER_VERTEX;
        Vec3::new(self.vertices[o], self.vertices[o + 1], self.vertices[o + 2])
    }

    pub fn normal(&self, vertex: usize) -> Vec3 {
        let o = vertex * FLOATS_PER_VERTEX + 3;
        Vec3::new(self.vertices[o], self.vertices[o + 1], self.vertices[o + 2])
    }

    pub fn uv(&self, vertex: usize) -> (f32, f32) {
        let o = vertex * FLOATS_PER_VERTEX + 6;
        (self.vertices[o], self.vertices[o + 1])
    }

    /// Appends a quad as two triangles `(0,1,2)` and `(0,2,3)`. If the corners
    /// wind against `n`, they are reordered so the front face points along `n`.
    pub fn add_quad(&mut self, mut vs: [Vec3; 4], n: Vec3, mut uvs: [(f32, f32); 4]) {
        let base = self.vertex_count() as u32;
        let cross = (vs[1] - vs[0]).cross(vs[2] - vs[0]);
        if cross.dot(n) < 0.0 {
            vs.swap(1, 3);
            uvs.swap(1, 3);
        }
        for i in 0..4 {
            self.vertices.extend_from_slice(&[
                vs[i].x, vs[i].y, vs[i].z, n.x, n.y, n.z, uvs[i].0, uvs[i].1,
            ]);
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Emits the unit face `face` of the voxel whose minimum corner is `origin`.
    pub fn add_face(&mut self, face: Face, origin: Vec3, uv: UvRect) {
        let corners = face.corners();
        let vs = corners.map(|c| origin + c);
        let uvs = corners.map(|c| {
            let (u, v) = face.plane_uv(c);
            (uv.u0 + u * (uv.u1 - uv.u0), uv.v0 + v * (uv.v1 - uv.v0))
        });
        self.add_quad(vs, face.normal(), uvs);
    }
}

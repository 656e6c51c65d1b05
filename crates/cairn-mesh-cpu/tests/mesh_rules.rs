use cairn_blocks::{BlockId, BlockRegistry};
use cairn_chunk::{Chunk, ChunkCoord, ChunkDims};
use cairn_mesh_cpu::{FLOATS_PER_VERTEX, MeshBuild, generate_mesh, try_generate_mesh};
use cairn_world::{WorldGenParams, WorldGenerator};
use proptest::prelude::*;

fn reg() -> BlockRegistry {
    BlockRegistry::builtin().unwrap()
}

fn chunk() -> Chunk {
    Chunk::new(ChunkCoord::new(0, 0, 0), ChunkDims::new(8, 8))
}

fn assert_ccw(mb: &MeshBuild) {
    for tri in mb.indices.chunks(3) {
        let (a, b, c) = (
            mb.position(tri[0] as usize),
            mb.position(tri[1] as usize),
            mb.position(tri[2] as usize),
        );
        let n = mb.normal(tri[0] as usize);
        assert!((b - a).cross(c - a).dot(n) > 0.0, "triangle {tri:?} winds backwards");
    }
}

#[test]
fn empty_chunk_has_no_geometry() {
    let reg = reg();
    let mesh = generate_mesh(&chunk(), &reg, &reg.materials.atlas);
    assert!(mesh.is_empty());
    assert!(mesh.bbox.is_empty());
}

#[test]
fn isolated_block_emits_six_faces() {
    let reg = reg();
    let stone = reg.require("stone").unwrap();
    let mut c = chunk();
    c.set_block(3, 3, 3, stone);
    let mesh = generate_mesh(&c, &reg, &reg.materials.atlas);
    assert_eq!(mesh.opaque.face_count(), 6);
    assert_eq!(mesh.opaque.vertex_count(), 24);
    assert_eq!(mesh.opaque.indices.len(), 36);
    assert_eq!(mesh.opaque.vertices.len(), 24 * FLOATS_PER_VERTEX);
    assert!(mesh.transparent.is_empty());
    assert_ccw(&mesh.opaque);
}

#[test]
fn enclosed_block_is_culled() {
    let reg = reg();
    let stone = reg.require("stone").unwrap();
    let mut c = chunk();
    for y in 2..5 {
        for z in 2..5 {
            for x in 2..5 {
                c.set_block(x, y, z, stone);
            }
        }
    }
    let mesh = generate_mesh(&c, &reg, &reg.materials.atlas);
    // only the 3x3 outer surface of each side survives
    assert_eq!(mesh.opaque.face_count(), 6 * 9);
    for v in 0..mesh.opaque.vertex_count() {
        let p = mesh.opaque.position(v);
        let on_shell = [p.x, p.y, p.z].iter().any(|&c| c == 2.0 || c == 5.0);
        assert!(on_shell, "interior vertex {p:?}");
    }
}

#[test]
fn transparent_neighbors_hide_shared_faces() {
    let reg = reg();
    let glass = reg.require("glass").unwrap();
    let water = reg.require("water").unwrap();
    let stone = reg.require("stone").unwrap();

    let mut c = chunk();
    c.set_block(2, 2, 2, glass);
    c.set_block(3, 2, 2, glass);
    let mesh = generate_mesh(&c, &reg, &reg.materials.atlas);
    assert_eq!(mesh.transparent.face_count(), 10);

    let mut c = chunk();
    c.set_block(2, 2, 2, glass);
    c.set_block(3, 2, 2, water);
    let mesh = generate_mesh(&c, &reg, &reg.materials.atlas);
    assert_eq!(mesh.transparent.face_count(), 10);

    // opaque keeps the face toward glass, glass drops the face toward stone
    let mut c = chunk();
    c.set_block(2, 2, 2, glass);
    c.set_block(3, 2, 2, stone);
    let mesh = generate_mesh(&c, &reg, &reg.materials.atlas);
    assert_eq!(mesh.opaque.face_count(), 6);
    assert_eq!(mesh.transparent.face_count(), 5);
    assert_ccw(&mesh.transparent);
}

#[test]
fn chunk_border_faces_are_kept_and_world_space() {
    let reg = reg();
    let stone = reg.require("stone").unwrap();
    let mut c = Chunk::new(ChunkCoord::new(2, 1, -1), ChunkDims::new(8, 8));
    c.set_block(0, 0, 0, stone);
    let mesh = try_generate_mesh(&c, &reg, &reg.materials.atlas);
    assert_eq!(mesh.opaque.face_count(), 6);
    assert_eq!(mesh.bbox.min.x, 16.0);
    assert_eq!(mesh.bbox.min.y, 8.0);
    assert_eq!(mesh.bbox.min.z, -8.0);
    assert_eq!(mesh.bbox.max.x, 17.0);
    assert_eq!(mesh.revision, c.revision());
}

#[test]
fn uvs_stay_inside_the_face_tile() {
    let reg = reg();
    let grass = reg.require("grass").unwrap();
    let mut c = chunk();
    c.set_block(1, 1, 1, grass);
    let mesh = generate_mesh(&c, &reg, &reg.materials.atlas);
    for v in 0..mesh.opaque.vertex_count() {
        let n = mesh.opaque.normal(v);
        let role = match n.y {
            y if y > 0.5 => cairn_blocks::FaceRole::Top,
            y if y < -0.5 => cairn_blocks::FaceRole::Bottom,
            _ => cairn_blocks::FaceRole::Side,
        };
        let rect = reg.face_uv(grass, role);
        let (u, w) = mesh.opaque.uv(v);
        assert!(u >= rect.u0 - 1e-6 && u <= rect.u1 + 1e-6);
        assert!(w >= rect.v0 - 1e-6 && w <= rect.v1 + 1e-6);
    }
}

#[test]
fn generated_terrain_mesh_is_well_formed() {
    let reg = reg();
    let wg = WorldGenerator::new(42, WorldGenParams::default()).unwrap();
    let coord = ChunkCoord::new(0, 0, 0);
    let mut c = Chunk::new(coord, ChunkDims::default());
    wg.generate(&mut c, coord, &reg).unwrap();
    let mesh = generate_mesh(&c, &reg, &reg.materials.atlas);
    assert!(!mesh.opaque.is_empty());
    for mb in [&mesh.opaque, &mesh.transparent] {
        let n = mb.vertex_count() as u32;
        assert!(mb.indices.iter().all(|&i| i < n));
        assert_eq!(mb.indices.len() % 6, 0);
        assert_ccw(mb);
    }
}

fn brute_force_faces(c: &Chunk, reg: &BlockRegistry) -> usize {
    let d = c.dims();
    let mut n = 0;
    for y in 0..d.sy as i32 {
        for z in 0..d.sz as i32 {
            for x in 0..d.sx as i32 {
                if !reg.is_opaque(c.get_block(x, y, z)) {
                    continue;
                }
                for (dx, dy, dz) in [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0), (0, 0, 1), (0, 0, -1)] {
                    if !reg.is_opaque(c.get_block(x + dx, y + dy, z + dz)) {
                        n += 1;
                    }
                }
            }
        }
    }
    n
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // opaque face count matches an independent neighbor count
    #[test]
    fn opaque_face_count_matches_brute_force(cells in proptest::collection::vec((0i32..6, 0i32..6, 0i32..6, 0u16..3), 0..80)) {
        let reg = reg();
        let palette = [BlockId::AIR, reg.require("stone").unwrap(), reg.require("dirt").unwrap()];
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0), ChunkDims::new(6, 6));
        for (x, y, z, k) in cells {
            c.set_block(x, y, z, palette[k as usize]);
        }
        let mesh = generate_mesh(&c, &reg, &reg.materials.atlas);
        prop_assert_eq!(mesh.opaque.face_count(), brute_force_faces(&c, &reg));
        prop_assert_eq!(mesh.opaque.vertex_count(), mesh.opaque.face_count() * 4);
    }
}

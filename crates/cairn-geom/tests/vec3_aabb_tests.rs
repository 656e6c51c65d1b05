use cairn_geom::{Aabb, Vec3};
use proptest::prelude::*;

#[test]
fn cross_of_axes_follows_right_hand_rule() {
    let x = Vec3::new(1.0, 0.0, 0.0);
    let y = Vec3::new(0.0, 1.0, 0.0);
    assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(y.cross(x), Vec3::new(0.0, 0.0, -1.0));
}

#[test]
fn floor_i32_rounds_toward_negative_infinity() {
    assert_eq!(Vec3::new(-0.5, 1.9, -16.0).floor_i32(), (-1, 1, -16));
    assert_eq!(Vec3::new(15.99, -0.001, 0.0).floor_i32(), (15, -1, 0));
}

#[test]
fn empty_aabb_grows_from_first_point() {
    let mut bb = Aabb::EMPTY;
    assert!(bb.is_empty());
    bb.include(Vec3::new(1.0, 2.0, 3.0));
    assert!(!bb.is_empty());
    assert_eq!(bb.min, bb.max);
    bb.include(Vec3::new(-1.0, 5.0, 0.0));
    assert_eq!(bb.min, Vec3::new(-1.0, 2.0, 0.0));
    assert_eq!(bb.max, Vec3::new(1.0, 5.0, 3.0));
}

#[test]
fn union_ignores_empty_side() {
    let a = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0));
    assert_eq!(a.union(Aabb::EMPTY), a);
    assert_eq!(Aabb::EMPTY.union(a), a);
}

proptest! {
    #[test]
    fn included_points_are_contained(pts in prop::collection::vec((-1e4f32..1e4, -1e4f32..1e4, -1e4f32..1e4), 1..32)) {
        let mut bb = Aabb::EMPTY;
        for &(x, y, z) in &pts {
            bb.include(Vec3::new(x, y, z));
        }
        for &(x, y, z) in &pts {
            prop_assert!(bb.contains(Vec3::new(x, y, z)));
        }
    }

    #[test]
    fn dot_is_symmetric(a in (-1e3f32..1e3, -1e3f32..1e3, -1e3f32..1e3), b in (-1e3f32..1e3, -1e3f32..1e3, -1e3f32..1e3)) {
        let va = Vec3::new(a.0, a.1, a.2);
        let vb = Vec3::new(b.0, b.1, b.2);
        prop_assert_eq!(va.dot(vb), vb.dot(va));
    }
}

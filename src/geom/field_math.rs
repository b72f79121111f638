//! Compatibility math for 4-fold rotationally symmetric (4-RoSy) fields.
//!
//! An orientation `q` at a vertex with normal `n` stands for the whole class
//! `{q, n×q, -q, -n×q}`. The helpers here pick matching representatives
//! between two vertices and express position-field lattice points as integer
//! indices in each vertex's local frame.

use super::core::{GridOffset, Rot4, Tolerance, Vec3};

/// Rotates `q` about `n` by the given number of quarter turns.
#[must_use]
pub fn rotate90_by(q: Vec3, n: Vec3, rotation: Rot4) -> Vec3 {
    let turned = if rotation.is_odd() { n.cross(q) } else { q };
    if rotation.value() < 2 { turned } else { -turned }
}

/// Finds the representative pair `(a, b)` with
/// `rotate90_by(q0, n0, a) ≈ rotate90_by(q1, n1, b)`.
///
/// `a` is always 0 or 1; `b` absorbs the sign of the best match.
#[must_use]
pub fn orientation_index_pair(q0: Vec3, n0: Vec3, q1: Vec3, n1: Vec3) -> (Rot4, Rot4) {
    let (a, b, dp) = best_orientation_match(q0, n0, q1, n1);
    let b = if dp < 0.0 { b + 2 } else { b };
    (Rot4::new(a), Rot4::new(b))
}

/// Quarter turns that carry the frame at vertex 0 onto the frame at vertex 1.
#[must_use]
pub fn orientation_index_delta(q0: Vec3, n0: Vec3, q1: Vec3, n1: Vec3) -> Rot4 {
    let (a, b) = orientation_index_pair(q0, n0, q1, n1);
    b - a
}

/// The matching representatives themselves, sign-corrected so that their dot
/// product is non-negative.
#[must_use]
pub fn orientation_compat_pair(q0: Vec3, n0: Vec3, q1: Vec3, n1: Vec3) -> (Vec3, Vec3) {
    let (a, b, dp) = best_orientation_match(q0, n0, q1, n1);
    let first = if a == 0 { q0 } else { n0.cross(q0) };
    let second = if b == 0 { q1 } else { n1.cross(q1) };
    (first, if dp < 0.0 { -second } else { second })
}

fn best_orientation_match(q0: Vec3, n0: Vec3, q1: Vec3, n1: Vec3) -> (i32, i32, f64) {
    let lhs = [q0, n0.cross(q0)];
    let rhs = [q1, n1.cross(q1)];
    let mut best_score = f64::NEG_INFINITY;
    let mut best = (0, 0, 0.0);
    for (i, a) in lhs.iter().enumerate() {
        for (j, b) in rhs.iter().enumerate() {
            let dp = a.dot(*b);
            if dp.abs() > best_score {
                best_score = dp.abs();
                best = (i as i32, j as i32, dp);
            }
        }
    }
    best
}

/// Point halfway between `p0` and `p1`, pulled onto the intersection of the
/// two tangent planes.
#[must_use]
pub fn middle_point(p0: Vec3, n0: Vec3, p1: Vec3, n1: Vec3) -> Vec3 {
    let n0p0 = n0.dot(p0);
    let n0p1 = n0.dot(p1);
    let n1p0 = n1.dot(p0);
    let n1p1 = n1.dot(p1);
    let n0n1 = n0.dot(n1);
    let denom = 1.0 / (1.0 - n0n1 * n0n1 + Tolerance::PLANE_REGULARIZER.eps);
    let lambda_0 = 2.0 * (n0p1 - n0p0 - n0n1 * (n1p0 - n1p1)) * denom;
    let lambda_1 = 2.0 * (n1p0 - n1p1 - n0n1 * (n0p1 - n0p0)) * denom;
    (p0 + p1) * 0.5 - (n0 * lambda_0 + n1 * lambda_1) * 0.25
}

/// Lattice cell containing `p` in the frame `(q, n×q)` anchored at `origin`.
#[must_use]
pub fn position_floor_index(origin: Vec3, q: Vec3, n: Vec3, p: Vec3, scale: f64) -> GridOffset {
    let t = n.cross(q);
    let d = p - origin;
    GridOffset::new(
        (q.dot(d) / scale).floor() as i32,
        (t.dot(d) / scale).floor() as i32,
    )
}

/// One vertex sample of the position field: surface point, normal, aligned
/// orientation and lattice origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeFrame {
    pub point: Vec3,
    pub normal: Vec3,
    pub orientation: Vec3,
    pub origin: Vec3,
}

/// Integer coordinates of the lattice point shared by two neighbouring
/// vertices, expressed in each vertex's own frame.
///
/// The difference `first - second` is the lattice displacement from vertex 0
/// to vertex 1.
#[must_use]
pub fn position_index_pair(a: LatticeFrame, b: LatticeFrame, scale: f64) -> (GridOffset, GridOffset) {
    let ta = a.normal.cross(a.orientation);
    let tb = b.normal.cross(b.orientation);
    let middle = middle_point(a.point, a.normal, b.point, b.normal);
    let base_a = position_floor_index(a.origin, a.orientation, a.normal, middle, scale);
    let base_b = position_floor_index(b.origin, b.orientation, b.normal, middle, scale);

    let corner = |base: GridOffset, k: usize| GridOffset::new(base.x + (k & 1) as i32, base.y + ((k & 2) >> 1) as i32);
    let place = |origin: Vec3, q: Vec3, t: Vec3, idx: GridOffset| {
        origin + (q * f64::from(idx.x) + t * f64::from(idx.y)) * scale
    };

    let mut best_cost = f64::INFINITY;
    let mut best = (0, 0);
    for i in 0..4 {
        let pa = place(a.origin, a.orientation, ta, corner(base_a, i));
        for j in 0..4 {
            let pb = place(b.origin, b.orientation, tb, corner(base_b, j));
            let cost = (pa - pb).length_squared();
            if cost < best_cost {
                best_cost = cost;
                best = (i, j);
            }
        }
    }
    (corner(base_a, best.0), corner(base_b, best.1))
}

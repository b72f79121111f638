//! Collapse of zero-offset edges into output vertices.

use std::collections::{BTreeSet, VecDeque};

use super::Vec3;
use super::disjoint::VertexTree;
use super::field::FieldMesh;
use super::field_math::orientation_compat_pair;
use super::mesh::EdgeKey;
use super::GridOffset;

/// One output vertex per class of input vertices joined by zero edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactMesh {
    /// Input vertex -> compact vertex.
    pub index: Vec<usize>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub orientations: Vec<Vec3>,
    /// Whether any member lies on the input boundary.
    pub boundary: Vec<bool>,
    pub bad: Vec<bool>,
}

impl CompactMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn bad_count(&self) -> usize {
        self.bad.iter().filter(|&&b| b).count()
    }
}

/// Builds the compact vertices from the solved per-vertex `positions`.
///
/// Positions are averaged per class. Normals are a running mean
/// renormalized after every sample, and orientations are blended after
/// rotating each sample onto the accumulator's nearest symmetric
/// representative.
#[must_use]
pub fn compact_vertices(
    field: &FieldMesh,
    edges: &[EdgeKey],
    offsets: &[GridOffset],
    positions: &[Vec3],
) -> CompactMesh {
    let n = field.vertex_count();
    let mut tree = VertexTree::new(n);
    for (&EdgeKey(a, b), offset) in edges.iter().zip(offsets) {
        if offset.is_zero() {
            tree.merge(a, b);
        }
    }
    tree.build_compact();

    let count = tree.compact_count();
    let index: Vec<usize> = (0..n).map(|v| tree.index(v)).collect();
    let mut sums = vec![Vec3::ZERO; count];
    let mut normals = vec![Vec3::ZERO; count];
    let mut orientations = vec![Vec3::ZERO; count];
    let mut members = vec![0usize; count];
    let mut boundary = vec![false; count];

    for v in 0..n {
        let c = index[v];
        let weight = members[c] as f64;
        sums[c] += positions[v];
        normals[c] = (normals[c] * weight + field.normals[v]).normalized_or(field.normals[v]);
        orientations[c] = if members[c] == 0 {
            field.orientations[v]
        } else {
            let (acc, sample) =
                orientation_compat_pair(orientations[c], normals[c], field.orientations[v], field.normals[v]);
            (acc * weight + sample).normalized_or(acc)
        };
        boundary[c] |= field.adjacency.boundary[v];
        members[c] += 1;
    }

    let positions = sums
        .into_iter()
        .zip(&members)
        .map(|(sum, &m)| sum / m.max(1) as f64)
        .collect();

    let bad = mark_bad_vertices(count, &index, &boundary, edges, offsets);
    log::debug!(
        "compaction: {} input vertices -> {} compact vertices, {} bad",
        n,
        count,
        bad.iter().filter(|&&b| b).count()
    );

    CompactMesh { index, positions, normals, orientations, boundary, bad }
}

/// Flags compact vertices with fewer than 3 unit-step neighbours (2 on the
/// boundary), then keeps flagging neighbours whose count drops below their
/// threshold once flagged vertices are discounted.
#[must_use]
pub fn mark_bad_vertices(
    count: usize,
    index: &[usize],
    boundary: &[bool],
    edges: &[EdgeKey],
    offsets: &[GridOffset],
) -> Vec<bool> {
    let mut neighbors = vec![BTreeSet::new(); count];
    for (&EdgeKey(a, b), offset) in edges.iter().zip(offsets) {
        let (p, q) = (index[a], index[b]);
        if p != q && offset.is_unit_step() {
            neighbors[p].insert(q);
            neighbors[q].insert(p);
        }
    }

    let threshold = |v: usize| if boundary[v] { 2 } else { 3 };
    let mut bad = vec![false; count];
    let mut queue = VecDeque::new();
    for v in 0..count {
        if neighbors[v].len() < threshold(v) {
            bad[v] = true;
            queue.push_back(v);
        }
    }
    while let Some(v) = queue.pop_front() {
        let adjacent: Vec<usize> = neighbors[v].iter().copied().collect();
        for w in adjacent {
            neighbors[w].remove(&v);
            if !bad[w] && neighbors[w].len() < threshold(w) {
                bad[w] = true;
                queue.push_back(w);
            }
        }
    }
    bad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_marks_spread_through_weak_neighbours() {
        // Path 0 - 1 - 2 - 3: nobody reaches three neighbours.
        let edges = [EdgeKey(0, 1), EdgeKey(1, 2), EdgeKey(2, 3)];
        let offsets = [GridOffset::new(1, 0); 3];
        let bad = mark_bad_vertices(4, &[0, 1, 2, 3], &[false; 4], &edges, &offsets);
        assert_eq!(bad, vec![true; 4]);
    }

    #[test]
    fn boundary_corners_need_two_neighbours() {
        // Unit square loop 0-1-2-3, all on the boundary.
        let edges = [EdgeKey(0, 1), EdgeKey(1, 2), EdgeKey(2, 3), EdgeKey(0, 3), EdgeKey(0, 2)];
        let offsets = [
            GridOffset::new(1, 0),
            GridOffset::new(0, 1),
            GridOffset::new(-1, 0),
            GridOffset::new(0, 1),
            GridOffset::new(1, 1),
        ];
        let bad = mark_bad_vertices(4, &[0, 1, 2, 3], &[true; 4], &edges, &offsets);
        assert_eq!(bad, vec![false; 4]);
    }
}

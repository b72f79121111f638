//! Pairing of triangles across lattice diagonals into quads.

use std::collections::{BTreeMap, BTreeSet};

use super::compact::CompactMesh;
use super::mesh::EdgeKey;
use super::{GridOffset, Rot4};

/// Compact edges of faces whose lattice area is negative.
#[must_use]
pub fn find_bad_edges(
    faces: &[[usize; 3]],
    face_edge_ids: &[[usize; 3]],
    face_edge_orients: &[[Rot4; 3]],
    offsets: &[GridOffset],
    compact: &CompactMesh,
) -> BTreeSet<EdgeKey> {
    let mut bad = BTreeSet::new();
    for (f, face) in faces.iter().enumerate() {
        let p = face.map(|v| compact.index[v]);
        if p[0] == p[1] || p[1] == p[2] || p[2] == p[0] {
            continue;
        }
        let d0 = offsets[face_edge_ids[f][0]].rotate(face_edge_orients[f][0]);
        let d2 = offsets[face_edge_ids[f][2]].rotate(face_edge_orients[f][2]);
        if d2.cross(d0) < 0 {
            for j in 0..3 {
                bad.insert(EdgeKey::new(p[j], p[(j + 1) % 3]));
            }
        }
    }
    bad
}

/// Pairs the triangles that share a unit-diagonal edge into quads.
///
/// A triangle takes part only if its three compact vertices are distinct
/// and healthy, none of its compact edges is bad and its lattice area is
/// not negative. Each quad runs `first.0, second.2, first.1, first.2`
/// where `first` and `second` are the two triangles rotated so that the
/// diagonal is their leading edge.
#[must_use]
pub fn pair_quad_cells(
    faces: &[[usize; 3]],
    face_edge_ids: &[[usize; 3]],
    face_edge_orients: &[[Rot4; 3]],
    offsets: &[GridOffset],
    compact: &CompactMesh,
    bad_edges: &BTreeSet<EdgeKey>,
) -> Vec<[usize; 4]> {
    let mut cells: BTreeMap<EdgeKey, ([usize; 3], Option<[usize; 3]>)> = BTreeMap::new();

    for (f, face) in faces.iter().enumerate() {
        let p = face.map(|v| compact.index[v]);
        if p[0] == p[1] || p[1] == p[2] || p[2] == p[0] {
            continue;
        }
        if p.iter().any(|&c| compact.bad[c]) {
            continue;
        }
        if (0..3).any(|j| bad_edges.contains(&EdgeKey::new(p[j], p[(j + 1) % 3]))) {
            continue;
        }

        let ids = face_edge_ids[f];
        let d1 = offsets[ids[0]].rotate(face_edge_orients[f][0]);
        let d2 = (-offsets[ids[2]]).rotate(face_edge_orients[f][2]);
        if d1.cross(d2) < 0 {
            continue;
        }

        let Some(k) = (0..3).find(|&k| offsets[ids[k]].is_unit_diagonal()) else {
            continue;
        };
        let triangle = [p[k], p[(k + 1) % 3], p[(k + 2) % 3]];
        let key = EdgeKey::new(triangle[0], triangle[1]);
        cells
            .entry(key)
            .and_modify(|cell| cell.1 = Some(triangle))
            .or_insert((triangle, None));
    }

    cells
        .into_values()
        .filter_map(|(first, second)| second.map(|second| [first[0], second[2], first[1], first[2]]))
        .collect()
}

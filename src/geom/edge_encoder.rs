//! Integer edge encoding.
//!
//! Every undirected edge gets one id and one [`GridOffset`]: the lattice
//! displacement from its lower-indexed endpoint to the higher one, expressed
//! in the raw orientation frame of the lower endpoint.

use super::field::FieldMesh;
use super::mesh::EdgeKey;
use super::singularity::Singularities;
use super::GridOffset;

const UNSET: usize = usize::MAX;

/// Undirected edge table with per-edge lattice offsets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedEdges {
    pub edges: Vec<EdgeKey>,
    pub offsets: Vec<GridOffset>,
    /// Per face, the id of the edge `k -> k + 1`.
    pub face_edge_ids: Vec<[usize; 3]>,
    /// Offsets that had a component outside `-1..=1` before clamping.
    pub clamped: usize,
}

impl EncodedEdges {
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The (at most two) faces incident to each edge, in face order.
    #[must_use]
    pub fn edge_faces(&self) -> Vec<[Option<usize>; 2]> {
        let mut faces = vec![[None; 2]; self.edges.len()];
        for (f, ids) in self.face_edge_ids.iter().enumerate() {
            for &e in ids {
                if faces[e][0].is_none() {
                    faces[e][0] = Some(f);
                } else {
                    faces[e][1] = Some(f);
                }
            }
        }
        faces
    }
}

/// Builds the edge table and the offsets from the aligned per-face data.
///
/// An edge first seen from an orientation-singular face is overwritten by the
/// offset seen from its regular neighbour, if any.
#[must_use]
pub fn encode_edges(field: &FieldMesh, singularities: &Singularities) -> EncodedEdges {
    let face_count = field.face_count();
    let mut edges = Vec::with_capacity(face_count * 3 / 2 + 1);
    let mut offsets = Vec::with_capacity(face_count * 3 / 2 + 1);
    let mut face_edge_ids = vec![[UNSET; 3]; face_count];

    for (f, face) in field.mesh.faces.iter().enumerate() {
        let ranks = singularities.face_ranks[f];
        let aligned = singularities.face_offsets[f];
        for k in 0..3 {
            let (v1, v2) = (face[k], face[(k + 1) % 3]);
            let offset = if v1 > v2 {
                (-aligned[k]).rotate(ranks[(k + 1) % 3])
            } else {
                aligned[k].rotate(ranks[k])
            };

            let opposite = field.adjacency.opposite[3 * f + k];
            let existing = opposite
                .map(|o| face_edge_ids[o / 3][o % 3])
                .filter(|&id| id != UNSET);

            match existing {
                None => {
                    let id = edges.len();
                    edges.push(EdgeKey::new(v1, v2));
                    offsets.push(offset);
                    face_edge_ids[f][k] = id;
                    if let Some(o) = opposite {
                        face_edge_ids[o / 3][o % 3] = id;
                    }
                }
                Some(id) => {
                    if !singularities.is_orientation_singular(f) {
                        offsets[id] = offset;
                    }
                }
            }
        }
    }

    let clamped = clamp_unit_steps(&mut offsets);
    log::debug!("encoded {} edges, clamped {} long offsets", edges.len(), clamped);

    EncodedEdges { edges, offsets, face_edge_ids, clamped }
}

/// Clamps every component into `-1..=1`, returning how many offsets changed.
pub fn clamp_unit_steps(offsets: &mut [GridOffset]) -> usize {
    let mut changed = 0;
    for offset in offsets.iter_mut() {
        let clamped = offset.clamp_unit();
        if clamped != *offset {
            *offset = clamped;
            changed += 1;
        }
    }
    changed
}

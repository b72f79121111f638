//! Field singularity location.
//!
//! A face is an orientation singularity when the quarter turns accumulated
//! around its three edges are odd, and a position singularity when the
//! lattice displacements around it do not close up. For every regular face
//! this pass also fixes the per-corner rotation that aligns the three
//! orientation samples, and records the per-edge lattice displacement in that
//! aligned frame. The edge encoder builds on both.

use std::collections::BTreeMap;

use super::field::FieldMesh;
use super::field_math::{LatticeFrame, orientation_index_delta, position_index_pair, rotate90_by};
use super::{GridOffset, Rot4};

/// Singular faces plus the per-face alignment data of the regular ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Singularities {
    /// Face -> holonomy index modulo 4 (always 1 or 3).
    pub orientation: BTreeMap<usize, Rot4>,
    /// Face -> non-zero lattice holonomy, in the frame of the face's first corner.
    pub position: BTreeMap<usize, GridOffset>,
    /// Per face, the rotation applied to each corner's orientation sample.
    pub face_ranks: Vec<[Rot4; 3]>,
    /// Per face, the lattice displacement along each edge `k -> k + 1`.
    pub face_offsets: Vec<[GridOffset; 3]>,
}

impl Singularities {
    #[must_use]
    pub fn is_orientation_singular(&self, face: usize) -> bool {
        self.orientation.contains_key(&face)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FaceAlignment {
    ranks: [Rot4; 3],
    offsets: [GridOffset; 3],
    holonomy: Option<GridOffset>,
}

/// Runs both passes over `field`.
#[must_use]
pub fn locate_singularities(field: &FieldMesh) -> Singularities {
    let orientation = locate_orientation_singularities(field);
    let alignments = map_faces(field.face_count(), |f| {
        if orientation.contains_key(&f) {
            FaceAlignment::default()
        } else {
            align_face(field, f)
        }
    });

    let mut position = BTreeMap::new();
    let mut face_ranks = Vec::with_capacity(alignments.len());
    let mut face_offsets = Vec::with_capacity(alignments.len());
    for (f, alignment) in alignments.into_iter().enumerate() {
        if let Some(holonomy) = alignment.holonomy {
            position.insert(f, holonomy);
        }
        face_ranks.push(alignment.ranks);
        face_offsets.push(alignment.offsets);
    }

    log::debug!(
        "singularities: {} orientation, {} position over {} faces",
        orientation.len(),
        position.len(),
        field.face_count()
    );

    Singularities { orientation, position, face_ranks, face_offsets }
}

/// Faces whose orientation holonomy is an odd number of quarter turns.
#[must_use]
pub fn locate_orientation_singularities(field: &FieldMesh) -> BTreeMap<usize, Rot4> {
    map_faces(field.face_count(), |f| face_orientation_index(field, f))
        .into_iter()
        .enumerate()
        .filter(|(_, index)| index.is_odd())
        .collect()
}

fn face_orientation_index(field: &FieldMesh, f: usize) -> Rot4 {
    let face = field.mesh.faces[f];
    let (q, n) = (&field.orientations, &field.normals);
    (0..3).fold(Rot4::IDENTITY, |acc, k| {
        let (i, j) = (face[k], face[(k + 1) % 3]);
        acc + orientation_index_delta(q[i], n[i], q[j], n[j])
    })
}

fn align_face(field: &FieldMesh, f: usize) -> FaceAlignment {
    let face = field.mesh.faces[f];
    let q = face.map(|v| field.orientations[v]);
    let n = face.map(|v| field.normals[v]);

    let mut best_score = f64::NEG_INFINITY;
    let mut ranks = [Rot4::IDENTITY; 3];
    for i in Rot4::ALL {
        let q0 = rotate90_by(q[0], n[0], i);
        for j in Rot4::ALL {
            let q1 = rotate90_by(q[1], n[1], j);
            for k in Rot4::ALL {
                let q2 = rotate90_by(q[2], n[2], k);
                let score = q0.dot(q1).min(q1.dot(q2)).min(q2.dot(q0));
                if score > best_score {
                    best_score = score;
                    ranks = [i, j, k];
                }
            }
        }
    }

    let frame = |corner: usize| {
        let v = face[corner];
        LatticeFrame {
            point: field.mesh.positions[v],
            normal: n[corner],
            orientation: rotate90_by(q[corner], n[corner], ranks[corner]),
            origin: field.lattice_origins[v],
        }
    };

    let mut offsets = [GridOffset::ZERO; 3];
    let mut total = GridOffset::ZERO;
    for k in 0..3 {
        let (first, second) = position_index_pair(frame(k), frame((k + 1) % 3), field.scale);
        offsets[k] = first - second;
        total += offsets[k];
    }

    let holonomy = (!total.is_zero()).then(|| total.rotate(ranks[0]));
    FaceAlignment { ranks, offsets, holonomy }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn map_faces<T, F>(count: usize, per_face: F) -> Vec<T>
        where
            T: Send,
            F: Fn(usize) -> T + Sync + Send,
        {
            use rayon::prelude::*;
            (0..count).into_par_iter().map(per_face).collect()
        }
    } else {
        fn map_faces<T, F>(count: usize, per_face: F) -> Vec<T>
        where
            F: Fn(usize) -> T,
        {
            (0..count).map(per_face).collect()
        }
    }
}

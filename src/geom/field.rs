//! Validated input for quad extraction: a triangle mesh plus the smoothed
//! orientation, normal and position fields sampled at its vertices.

use super::mesh::{DirectedEdges, TriMesh};
use super::{Tolerance, Vec3};

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// The triangle mesh itself is unusable.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// A per-vertex field does not have one entry per vertex.
    #[error("{field} field has {found} entries, expected {expected}")]
    LengthMismatch { field: &'static str, expected: usize, found: usize },

    /// A field sample is NaN/Inf or has zero length where a direction is required.
    #[error("{field} field has an invalid sample at vertex {vertex}")]
    InvalidSample { field: &'static str, vertex: usize },

    /// The lattice scale must be a positive finite number.
    #[error("lattice scale must be positive and finite, got {0}")]
    InvalidScale(f64),
}

/// Triangle mesh with the per-vertex fields that drive the extraction.
///
/// Orientations are projected onto the tangent plane of their normal and
/// normalized on construction, so every downstream stage can assume unit,
/// tangent orientation vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMesh {
    pub mesh: TriMesh,
    pub adjacency: DirectedEdges,
    /// Unit surface normals (`N`).
    pub normals: Vec<Vec3>,
    /// Representative of the 4-RoSy orientation class (`Q`).
    pub orientations: Vec<Vec3>,
    /// Position field (`O`): nearest lattice point per vertex.
    pub lattice_origins: Vec<Vec3>,
    /// Lattice spacing, the target quad edge length.
    pub scale: f64,
}

impl FieldMesh {
    pub fn new(
        mesh: TriMesh,
        normals: Vec<Vec3>,
        orientations: Vec<Vec3>,
        lattice_origins: Vec<Vec3>,
        scale: f64,
    ) -> Result<Self, FieldError> {
        mesh.validate().map_err(FieldError::InvalidMesh)?;
        let n = mesh.vertex_count();
        check_len("normal", n, normals.len())?;
        check_len("orientation", n, orientations.len())?;
        check_len("position", n, lattice_origins.len())?;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(FieldError::InvalidScale(scale));
        }

        let normals = normals
            .into_iter()
            .enumerate()
            .map(|(vertex, v)| v.normalized().ok_or(FieldError::InvalidSample { field: "normal", vertex }))
            .collect::<Result<Vec<_>, _>>()?;

        let orientations = orientations
            .into_iter()
            .zip(&normals)
            .enumerate()
            .map(|(vertex, (q, &n))| {
                if !q.is_finite() {
                    return Err(FieldError::InvalidSample { field: "orientation", vertex });
                }
                let tangent = q - n * n.dot(q);
                Ok(tangent.normalized().unwrap_or_else(|| n.any_perpendicular()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(vertex) = lattice_origins.iter().position(|o| !o.is_finite()) {
            return Err(FieldError::InvalidSample { field: "position", vertex });
        }

        let adjacency = DirectedEdges::build(&mesh);
        log::debug!(
            "field mesh: {} vertices, {} faces, {} boundary vertices, {} non-manifold vertices",
            n,
            mesh.face_count(),
            adjacency.boundary_vertex_count(),
            adjacency.non_manifold_vertex_count()
        );

        Ok(Self { mesh, adjacency, normals, orientations, lattice_origins, scale })
    }

    /// Lattice spacing that yields roughly one output vertex per input vertex.
    #[must_use]
    pub fn default_scale(mesh: &TriMesh) -> f64 {
        let n = mesh.vertex_count().max(1) as f64;
        let scale = (mesh.surface_area() / n).sqrt();
        if scale > Tolerance::ZERO_LENGTH.eps { scale } else { 1.0 }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.mesh.face_count()
    }
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<(), FieldError> {
    if expected == found {
        Ok(())
    } else {
        Err(FieldError::LengthMismatch { field, expected, found })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> TriMesh {
        TriMesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn orientations_are_projected_to_tangent_plane() {
        let field = FieldMesh::new(
            triangle(),
            vec![Vec3::Z; 3],
            vec![Vec3::new(1.0, 0.0, 0.5); 3],
            vec![Vec3::ZERO; 3],
            1.0,
        )
        .unwrap();
        for q in &field.orientations {
            assert!(q.z.abs() < 1e-12);
            assert!((q.length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_length_mismatch_and_bad_scale() {
        let err = FieldMesh::new(triangle(), vec![Vec3::Z; 2], vec![Vec3::X; 3], vec![Vec3::ZERO; 3], 1.0);
        assert!(matches!(err, Err(FieldError::LengthMismatch { field: "normal", .. })));
        let err = FieldMesh::new(triangle(), vec![Vec3::Z; 3], vec![Vec3::X; 3], vec![Vec3::ZERO; 3], 0.0);
        assert!(matches!(err, Err(FieldError::InvalidScale(_))));
    }

    #[test]
    fn rejects_zero_normal() {
        let err = FieldMesh::new(
            triangle(),
            vec![Vec3::Z, Vec3::ZERO, Vec3::Z],
            vec![Vec3::X; 3],
            vec![Vec3::ZERO; 3],
            1.0,
        );
        assert!(matches!(err, Err(FieldError::InvalidSample { field: "normal", vertex: 1 })));
    }

    #[test]
    fn default_scale_matches_area_per_vertex() {
        let s = FieldMesh::default_scale(&triangle());
        assert!((s - (0.5_f64 / 3.0).sqrt()).abs() < 1e-12);
    }
}

use std::collections::HashMap;

use super::Vec3;

/// Triangle mesh with one position per vertex.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriMesh {
    pub positions: Vec<Vec3>,
    pub faces: Vec<[usize; 3]>,
}

impl TriMesh {
    #[must_use]
    pub fn new(positions: Vec<Vec3>, faces: Vec<[usize; 3]>) -> Self {
        Self { positions, faces }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions.iter().any(|p| !p.is_finite())
    }

    /// Returns true if all face corners reference an existing vertex.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len();
        self.faces.iter().all(|f| f.iter().all(|&v| v < n))
    }

    /// Returns true if some face repeats a vertex.
    #[must_use]
    pub fn has_repeated_corners(&self) -> bool {
        self.faces.iter().any(|f| f[0] == f[1] || f[1] == f[2] || f[2] == f[0])
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.faces.is_empty() {
            return Err("mesh has no faces".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if self.has_repeated_corners() {
            return Err("mesh has faces with repeated vertices".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn face_corners(&self, face: usize) -> [Vec3; 3] {
        let [a, b, c] = self.faces[face];
        [self.positions[a], self.positions[b], self.positions[c]]
    }

    #[must_use]
    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len())
            .map(|f| {
                let [a, b, c] = self.face_corners(f);
                0.5 * (b - a).cross(c - a).length()
            })
            .sum()
    }

    /// Angle-weighted vertex normals.
    ///
    /// Isolated vertices and vertices whose incident faces are all degenerate
    /// get `+Z`.
    #[must_use]
    pub fn vertex_normals(&self) -> Vec<Vec3> {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for (f, corners) in self.faces.iter().enumerate() {
            let p = self.face_corners(f);
            let Some(face_normal) = (p[1] - p[0]).cross(p[2] - p[0]).normalized() else {
                continue;
            };
            for k in 0..3 {
                let (Some(e0), Some(e1)) = (
                    (p[(k + 1) % 3] - p[k]).normalized(),
                    (p[(k + 2) % 3] - p[k]).normalized(),
                ) else {
                    continue;
                };
                let angle = e0.dot(e1).clamp(-1.0, 1.0).acos();
                accum[corners[k]] += face_normal * angle;
            }
        }
        accum.into_iter().map(|n| n.normalized_or(Vec3::Z)).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Edge keys and directed edges
// ─────────────────────────────────────────────────────────────────────────────

/// Undirected edge with canonical endpoint ordering (`0 <= 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey(pub usize, pub usize);

impl EdgeKey {
    #[inline]
    #[must_use]
    pub const fn new(v0: usize, v1: usize) -> Self {
        if v0 <= v1 { Self(v0, v1) } else { Self(v1, v0) }
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, v: usize) -> bool {
        self.0 == v || self.1 == v
    }
}

/// Directed edge `3f + k` runs from corner `k` to corner `k + 1` of face
/// `f`; this is the edge ending at corner `k`.
#[inline]
#[must_use]
pub const fn dedge_prev(e: usize) -> usize {
    if e % 3 == 0 { e + 2 } else { e - 1 }
}

/// Directed-edge adjacency of a triangle mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectedEdges {
    /// Opposite directed edge, `None` on boundary or non-manifold edges.
    pub opposite: Vec<Option<usize>>,
    /// One outgoing directed edge per vertex. On boundary vertices this is
    /// the edge that starts the one-ring walk.
    pub vertex_edge: Vec<Option<usize>>,
    pub boundary: Vec<bool>,
    pub non_manifold: Vec<bool>,
}

impl DirectedEdges {
    #[must_use]
    pub fn build(mesh: &TriMesh) -> Self {
        let vertex_count = mesh.vertex_count();
        let edge_count = mesh.face_count() * 3;

        let mut by_endpoints: HashMap<(usize, usize), Vec<usize>> = HashMap::with_capacity(edge_count);
        for (f, face) in mesh.faces.iter().enumerate() {
            for k in 0..3 {
                by_endpoints.entry((face[k], face[(k + 1) % 3])).or_default().push(3 * f + k);
            }
        }

        let mut opposite = vec![None; edge_count];
        let mut non_manifold = vec![false; vertex_count];
        for (&(a, b), edges) in &by_endpoints {
            if edges.len() > 1 {
                non_manifold[a] = true;
                non_manifold[b] = true;
                continue;
            }
            match by_endpoints.get(&(b, a)) {
                Some(reverse) if reverse.len() == 1 => opposite[edges[0]] = Some(reverse[0]),
                Some(_) => {
                    non_manifold[a] = true;
                    non_manifold[b] = true;
                }
                None => {}
            }
        }

        let mut vertex_edge = vec![None; vertex_count];
        let mut boundary = vec![false; vertex_count];
        for (f, face) in mesh.faces.iter().enumerate() {
            for k in 0..3 {
                let e = 3 * f + k;
                let source = face[k];
                if vertex_edge[source].is_none() {
                    vertex_edge[source] = Some(e);
                }
                if opposite[e].is_none() {
                    boundary[source] = true;
                    boundary[face[(k + 1) % 3]] = true;
                }
                if opposite[dedge_prev(e)].is_none() {
                    vertex_edge[source] = Some(e);
                }
            }
        }

        Self { opposite, vertex_edge, boundary, non_manifold }
    }

    #[must_use]
    pub fn boundary_vertex_count(&self) -> usize {
        self.boundary.iter().filter(|&&b| b).count()
    }

    #[must_use]
    pub fn non_manifold_vertex_count(&self) -> usize {
        self.non_manifold.iter().filter(|&&b| b).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> TriMesh {
        TriMesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn directed_edges_pair_the_shared_diagonal() {
        let mesh = unit_square();
        let edges = DirectedEdges::build(&mesh);
        // 2 -> 0 in face 0 is edge 2, 0 -> 2 in face 1 is edge 3.
        assert_eq!(edges.opposite[2], Some(3));
        assert_eq!(edges.opposite[3], Some(2));
        assert_eq!(edges.opposite.iter().filter(|o| o.is_none()).count(), 4);
        assert_eq!(edges.boundary_vertex_count(), 4);
        assert_eq!(edges.non_manifold_vertex_count(), 0);
    }

    #[test]
    fn boundary_vertex_edge_starts_the_fan() {
        let mesh = unit_square();
        let edges = DirectedEdges::build(&mesh);
        let e = edges.vertex_edge[0].unwrap();
        assert!(edges.opposite[dedge_prev(e)].is_none());
    }

    #[test]
    fn dedge_prev_wraps_inside_face() {
        assert_eq!(dedge_prev(3), 5);
        assert_eq!(dedge_prev(4), 3);
    }

    #[test]
    fn flat_mesh_normals_point_up() {
        let mesh = unit_square();
        for n in mesh.vertex_normals() {
            assert!((n.z - 1.0).abs() < 1e-12);
        }
        assert!((mesh.surface_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_repeated_corners() {
        let mut mesh = unit_square();
        mesh.faces.push([1, 1, 2]);
        assert!(mesh.validate().is_err());
    }
}

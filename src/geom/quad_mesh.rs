//! Output quad mesh.

use std::io::{self, Write};

use super::Vec3;

/// Quad mesh over the compact vertices.
///
/// Faces may reference vertices flagged in `bad_vertices`; use
/// [`export_dense`](Self::export_dense) for a mesh without them. A face
/// whose last two indices coincide closes a three-vertex hole.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuadMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub orientations: Vec<Vec3>,
    pub faces: Vec<[usize; 4]>,
    pub bad_vertices: Vec<bool>,
}

impl QuadMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Drops bad vertices, remaps the survivors to `0..n` and drops faces
    /// that used a dropped vertex.
    #[must_use]
    pub fn export_dense(&self) -> QuadMesh {
        let mut remap = vec![None; self.positions.len()];
        let mut next = 0;
        for (v, slot) in remap.iter_mut().enumerate() {
            if !self.bad_vertices.get(v).copied().unwrap_or(false) {
                *slot = Some(next);
                next += 1;
            }
        }

        let keep = |v: usize| remap[v].is_some();
        let pick = |values: &[Vec3]| -> Vec<Vec3> {
            values
                .iter()
                .enumerate()
                .filter(|(v, _)| keep(*v))
                .map(|(_, &p)| p)
                .collect()
        };

        let faces = self
            .faces
            .iter()
            .filter_map(|face| {
                let mapped = face.map(|v| remap[v]);
                Some([mapped[0]?, mapped[1]?, mapped[2]?, mapped[3]?])
            })
            .collect();

        QuadMesh {
            positions: pick(&self.positions),
            normals: pick(&self.normals),
            orientations: pick(&self.orientations),
            faces,
            bad_vertices: vec![false; next],
        }
    }

    /// Writes `v x y z` and `f i1 i2 i3 i4` records (1-based indices).
    pub fn write_obj<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for p in &self.positions {
            writeln!(w, "v {} {} {}", p.x, p.y, p.z)?;
        }
        for f in &self.faces {
            writeln!(w, "f {} {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1, f[3] + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_quads() -> QuadMesh {
        let positions: Vec<Vec3> = (0..6).map(|i| Vec3::new(f64::from(i % 3), f64::from(i / 3), 0.0)).collect();
        QuadMesh {
            normals: vec![Vec3::Z; 6],
            orientations: vec![Vec3::X; 6],
            positions,
            faces: vec![[0, 1, 4, 3], [1, 2, 5, 4]],
            bad_vertices: vec![false, false, true, false, false, false],
        }
    }

    #[test]
    fn export_drops_faces_touching_bad_vertices() {
        let dense = two_quads().export_dense();
        assert_eq!(dense.vertex_count(), 5);
        assert_eq!(dense.faces, vec![[0, 1, 3, 2]]);
        assert_eq!(dense.positions[3], Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn obj_indices_are_one_based() {
        let mut out = Vec::new();
        two_quads().export_dense().write_obj(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 5);
        assert!(text.contains("f 1 2 4 3"));
    }
}

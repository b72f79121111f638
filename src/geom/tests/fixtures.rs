use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{FieldMesh, TriMesh, Vec3};

pub fn planar(degrees: f64) -> Vec3 {
    let r = degrees.to_radians();
    Vec3::new(r.cos(), r.sin(), 0.0)
}

/// `n x n` unit cells in the xy plane, vertex `j * (n + 1) + i` at `(i, j)`.
/// Cells are split along the `(i, j) - (i + 1, j + 1)` diagonal. The field is
/// aligned with the x axis and the position field sits on the vertices.
pub fn make_grid(n: usize) -> FieldMesh {
    let side = n + 1;
    let mut positions = Vec::with_capacity(side * side);
    for j in 0..side {
        for i in 0..side {
            positions.push(Vec3::new(i as f64, j as f64, 0.0));
        }
    }
    let mut faces = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let v = j * side + i;
            faces.push([v, v + 1, v + side + 1]);
            faces.push([v, v + side + 1, v + side]);
        }
    }

    let count = positions.len();
    let origins = positions.clone();
    FieldMesh::new(
        TriMesh::new(positions, faces),
        vec![Vec3::Z; count],
        vec![Vec3::X; count],
        origins,
        1.0,
    )
    .expect("grid field")
}

/// [`make_grid`] with the orientation field turning by `twist_degrees`
/// from corner `(0, 0)` to corner `(n, n)`, and every vertex moved by up to
/// `jitter` along x and y.
pub fn make_twisted_grid(n: usize, twist_degrees: f64, jitter: f64, seed: u64) -> FieldMesh {
    let grid = make_grid(n);
    let side = n + 1;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut positions = grid.mesh.positions.clone();
    for p in &mut positions {
        p.x += rng.random_range(-jitter..=jitter);
        p.y += rng.random_range(-jitter..=jitter);
    }
    let orientations = (0..positions.len())
        .map(|v| planar(twist_degrees * ((v % side) + (v / side)) as f64 / (2 * n) as f64))
        .collect();

    let count = positions.len();
    let origins = positions.clone();
    FieldMesh::new(
        TriMesh::new(positions, grid.mesh.faces.clone()),
        vec![Vec3::Z; count],
        orientations,
        origins,
        1.0,
    )
    .expect("twisted grid field")
}

pub fn make_unit_square() -> FieldMesh {
    make_grid(1)
}

/// Six-triangle fan around the origin whose orientation field turns a
/// quarter turn along the rim, so exactly one face holds the singularity.
pub fn make_singular_disk(scale: f64) -> FieldMesh {
    let mut positions = vec![Vec3::ZERO];
    let mut orientations = vec![planar(10.0)];
    for k in 0..6 {
        let polar = 60.0 * f64::from(k);
        let rim = planar(polar);
        positions.push(rim);
        orientations.push(planar(polar / 4.0));
    }
    let faces = (0..6).map(|i| [0, 1 + i, 1 + (i + 1) % 6]).collect();

    let origins = positions.clone();
    FieldMesh::new(TriMesh::new(positions, faces), vec![Vec3::Z; 7], orientations, origins, scale)
        .expect("disk field")
}

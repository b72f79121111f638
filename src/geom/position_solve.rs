//! Least-squares vertex placement from the integer edge offsets.
//!
//! Every vertex gets two unknowns, its displacement along `q` and `n × q`
//! from the input position. Every edge asks the displaced endpoints to be
//! `scale * offset` apart along the averaged lattice axes of the two
//! endpoints. The normal equations are assembled with `sprs` and solved
//! iteratively, warm-started from the projection of the position field.

use sprs::{CsMat, TriMat};

use super::field::FieldMesh;
use super::field_math::{orientation_index_pair, rotate90_by};
use super::mesh::EdgeKey;
use super::{GridOffset, Tolerance, Vec3};

/// Iterative scheme for the placement system.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PositionSolver {
    /// Jacobi-preconditioned conjugate gradient.
    ConjugateGradient { max_iterations: usize, tolerance: f64 },
    /// Weighted Jacobi sweeps.
    Jacobi { iterations: usize, weight: f64 },
}

impl Default for PositionSolver {
    fn default() -> Self {
        Self::ConjugateGradient { max_iterations: 1000, tolerance: 1e-8 }
    }
}

impl PositionSolver {
    #[must_use]
    pub const fn jacobi() -> Self {
        Self::Jacobi { iterations: 200, weight: 2.0 / 3.0 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    /// Relative residual `|b - Ax| / |b|` at exit.
    pub residual: f64,
    pub converged: bool,
}

/// Solves for one output point per input vertex.
#[must_use]
pub fn solve_positions(
    field: &FieldMesh,
    edges: &[EdgeKey],
    offsets: &[GridOffset],
    solver: PositionSolver,
) -> (Vec<Vec3>, SolveReport) {
    let n = field.vertex_count();
    let (matrix, rhs) = assemble(field, edges, offsets);

    let mut x = vec![0.0; 2 * n];
    for v in 0..n {
        let (q, qy) = tangent_frame(field, v);
        let d = field.lattice_origins[v] - field.mesh.positions[v];
        x[2 * v] = d.dot(q);
        x[2 * v + 1] = d.dot(qy);
    }

    let report = match solver {
        PositionSolver::ConjugateGradient { max_iterations, tolerance } => {
            conjugate_gradient(&matrix, &rhs, &mut x, max_iterations, tolerance)
        }
        PositionSolver::Jacobi { iterations, weight } => weighted_jacobi(&matrix, &rhs, &mut x, iterations, weight),
    };
    if !report.converged {
        log::warn!(
            "position solve stopped after {} iterations with relative residual {:.3e}",
            report.iterations,
            report.residual
        );
    }

    let positions = (0..n)
        .map(|v| {
            let (q, qy) = tangent_frame(field, v);
            field.mesh.positions[v] + q * x[2 * v] + qy * x[2 * v + 1]
        })
        .collect();
    (positions, report)
}

fn tangent_frame(field: &FieldMesh, v: usize) -> (Vec3, Vec3) {
    let q = field.orientations[v];
    (q, field.normals[v].cross(q))
}

fn assemble(field: &FieldMesh, edges: &[EdgeKey], offsets: &[GridOffset]) -> (CsMat<f64>, Vec<f64>) {
    let n = field.vertex_count();
    let mut triplets = TriMat::new((2 * n, 2 * n));
    let mut rhs = vec![0.0; 2 * n];
    let scale = field.scale;

    for (&EdgeKey(v1, v2), &diff) in edges.iter().zip(offsets) {
        let (q1, q1y) = tangent_frame(field, v1);
        let (q2, q2y) = tangent_frame(field, v2);
        let (n1, n2) = (field.normals[v1], field.normals[v2]);

        let (a, b) = orientation_index_pair(q1, n1, q2, n2);
        let rank = b - a;
        let axis_x = (rotate90_by(q2, n2, rank) + q1) * 0.5;
        let axis_y = (rotate90_by(q2y, n2, rank) + q1y) * 0.5;
        let target = axis_x * (f64::from(diff.x) * scale) + axis_y * (f64::from(diff.y) * scale)
            + field.mesh.positions[v1]
            - field.mesh.positions[v2];

        let weights = [q2, q2y, -q1, -q1y];
        let unknowns = [2 * v2, 2 * v2 + 1, 2 * v1, 2 * v1 + 1];
        for i in 0..4 {
            for j in 0..4 {
                triplets.add_triplet(unknowns[i], unknowns[j], weights[i].dot(weights[j]));
            }
            rhs[unknowns[i]] += weights[i].dot(target);
        }
    }

    let matrix: CsMat<f64> = triplets.to_csr();
    (matrix, rhs)
}

fn multiply(matrix: &CsMat<f64>, x: &[f64], out: &mut [f64]) {
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = matrix
            .outer_view(i)
            .map_or(0.0, |row| row.iter().map(|(j, &value)| value * x[j]).sum());
    }
}

fn diagonal(matrix: &CsMat<f64>, n: usize) -> Vec<f64> {
    (0..n).map(|i| matrix.get(i, i).copied().unwrap_or(0.0)).collect()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn conjugate_gradient(
    matrix: &CsMat<f64>,
    rhs: &[f64],
    x: &mut [f64],
    max_iterations: usize,
    tolerance: f64,
) -> SolveReport {
    let n = rhs.len();
    let inv_diag: Vec<f64> = diagonal(matrix, n)
        .into_iter()
        .map(|d| if d.abs() > Tolerance::SOLVER.eps { 1.0 / d } else { 0.0 })
        .collect();

    let mut ax = vec![0.0; n];
    multiply(matrix, x, &mut ax);
    let mut r: Vec<f64> = rhs.iter().zip(&ax).map(|(b, a)| b - a).collect();
    let rhs_norm = norm(rhs).max(Tolerance::ZERO_LENGTH.eps);

    let mut z: Vec<f64> = r.iter().zip(&inv_diag).map(|(ri, mi)| ri * mi).collect();
    let mut p = z.clone();
    let mut rz = dot(&r, &z);
    let mut ap = vec![0.0; n];

    let mut residual = norm(&r) / rhs_norm;
    let mut iterations = 0;
    while iterations < max_iterations && residual >= tolerance {
        multiply(matrix, &p, &mut ap);
        let pap = dot(&p, &ap);
        if pap.abs() < Tolerance::ZERO_LENGTH.eps {
            break;
        }
        let alpha = rz / pap;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
            z[i] = r[i] * inv_diag[i];
        }
        let rz_new = dot(&r, &z);
        let beta = if rz.abs() > 0.0 { rz_new / rz } else { 0.0 };
        rz = rz_new;
        for i in 0..n {
            p[i] = z[i] + beta * p[i];
        }
        iterations += 1;
        residual = norm(&r) / rhs_norm;
    }

    SolveReport { iterations, residual, converged: residual < tolerance }
}

fn weighted_jacobi(matrix: &CsMat<f64>, rhs: &[f64], x: &mut [f64], iterations: usize, weight: f64) -> SolveReport {
    let n = rhs.len();
    let diag = diagonal(matrix, n);
    let mut next = x.to_vec();
    for _ in 0..iterations {
        for i in 0..n {
            if diag[i].abs() <= Tolerance::SOLVER.eps {
                next[i] = x[i];
                continue;
            }
            let off_diagonal: f64 = matrix.outer_view(i).map_or(0.0, |row| {
                row.iter().filter(|&(j, _)| j != i).map(|(j, &value)| value * x[j]).sum()
            });
            let jacobi = (rhs[i] - off_diagonal) / diag[i];
            next[i] = (1.0 - weight) * x[i] + weight * jacobi;
        }
        x.copy_from_slice(&next);
    }

    let mut ax = vec![0.0; n];
    multiply(matrix, x, &mut ax);
    let r: Vec<f64> = rhs.iter().zip(&ax).map(|(b, a)| b - a).collect();
    let residual = norm(&r) / norm(rhs).max(Tolerance::ZERO_LENGTH.eps);
    SolveReport { iterations, residual, converged: residual < 1e-6 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd() -> (CsMat<f64>, Vec<f64>) {
        let mut t = TriMat::new((3, 3));
        for (i, j, v) in [(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0), (2, 2, 2.0)] {
            t.add_triplet(i, j, v);
        }
        (t.to_csr(), vec![1.0, 2.0, 4.0])
    }

    #[test]
    fn conjugate_gradient_solves_small_system() {
        let (m, b) = spd();
        let mut x = vec![0.0; 3];
        let report = conjugate_gradient(&m, &b, &mut x, 50, 1e-12);
        assert!(report.converged);
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-9);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-9);
        assert!((x[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn jacobi_approaches_same_solution() {
        let (m, b) = spd();
        let mut x = vec![0.0; 3];
        weighted_jacobi(&m, &b, &mut x, 300, 2.0 / 3.0);
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-6);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-6);
        assert!((x[2] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn warm_start_at_solution_needs_no_iterations() {
        let (m, b) = spd();
        let mut x = vec![1.0 / 11.0, 7.0 / 11.0, 2.0];
        let report = conjugate_gradient(&m, &b, &mut x, 50, 1e-8);
        assert_eq!(report.iterations, 0);
    }
}

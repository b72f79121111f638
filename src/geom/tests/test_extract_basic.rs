use super::fixtures::{make_grid, make_singular_disk, make_twisted_grid, make_unit_square};
use crate::geom::{
    EdgeGraph, ExtractOptions, GreedyFlowOptimizer, PositionSolver, QuadMesh, encode_edges, extract_quad_mesh,
    locate_singularities, refine_flow, solve_integer_constraints,
};

/// Twice the signed xy area of each quad.
fn quad_areas(mesh: &QuadMesh) -> Vec<f64> {
    mesh.faces
        .iter()
        .map(|face| {
            (0..4)
                .map(|j| {
                    let a = mesh.positions[face[j]];
                    let b = mesh.positions[face[(j + 1) % 4]];
                    a.x * b.y - b.x * a.y
                })
                .sum()
        })
        .collect()
}

#[test]
fn unit_square_extracts_one_quad() {
    let field = make_unit_square();
    let extraction = extract_quad_mesh(&field, ExtractOptions::default()).unwrap();
    let diag = &extraction.diagnostics;

    assert_eq!(extraction.mesh.face_count(), 1);
    assert_eq!(extraction.mesh.positions, field.mesh.positions);
    assert_eq!(quad_areas(&extraction.mesh), vec![2.0]);

    assert!(diag.is_clean(), "{diag}");
    assert_eq!(diag.orientation_singularity_count, 0);
    assert_eq!(diag.edge_count, 5);
    assert_eq!(diag.cut_count, 0);
    assert_eq!(diag.compact_vertex_count, 4);
    assert_eq!(diag.paired_quad_count, 1);
    assert_eq!(diag.patched_quad_count, 0);
    assert_eq!(diag.solver_iterations, 0);
    assert_eq!(diag.summary(), "Q:1 V:4");
}

#[test]
fn grid_extracts_one_quad_per_cell() {
    let n = 4;
    let field = make_grid(n);
    let extraction = extract_quad_mesh(&field, ExtractOptions::default()).unwrap();

    assert_eq!(extraction.mesh.vertex_count(), (n + 1) * (n + 1));
    assert_eq!(extraction.mesh.face_count(), n * n);
    assert!(quad_areas(&extraction.mesh).iter().all(|&a| (a - 2.0).abs() < 1e-9));
    assert!(extraction.cuts.is_empty());
    assert!(extraction.diagnostics.is_clean());
    assert_eq!(extraction.diagnostics.patched_quad_count, 0);
}

#[test]
fn jacobi_solver_gives_same_grid() {
    let field = make_grid(2);
    let cg = extract_quad_mesh(&field, ExtractOptions::default()).unwrap();
    let jacobi =
        extract_quad_mesh(&field, ExtractOptions::default().with_position_solver(PositionSolver::jacobi())).unwrap();

    assert_eq!(cg.mesh.faces, jacobi.mesh.faces);
    assert_eq!(cg.mesh.positions, jacobi.mesh.positions);
}

#[test]
fn coarse_disk_collapses_to_one_vertex() {
    let field = make_singular_disk(100.0);
    let extraction = extract_quad_mesh(&field, ExtractOptions::default()).unwrap();
    let diag = &extraction.diagnostics;

    assert_eq!(extraction.singularities.orientation.len(), 1);
    assert_eq!(diag.orientation_singularity_count, 1);
    assert_eq!(diag.compact_vertex_count, 1);
    assert_eq!(diag.bad_vertex_count, 1);
    assert_eq!(extraction.mesh.face_count(), 0);
    assert!(!diag.is_clean());
    assert!(extraction.mesh.export_dense().positions.is_empty());
}

#[test]
fn same_seed_is_reproducible() {
    let field = make_twisted_grid(4, 35.0, 0.2, 9);
    let options = ExtractOptions::default().with_seed(5);
    let a = extract_quad_mesh(&field, options).unwrap();
    let b = extract_quad_mesh(&field, options).unwrap();

    assert_eq!(a.mesh, b.mesh);
    assert_eq!(a.edges, b.edges);
    assert_eq!(a.diagnostics.summary(), b.diagnostics.summary());
}

#[test]
fn twisted_grids_balance_every_face_before_repair() {
    let options = ExtractOptions::default();
    for (n, twist, jitter) in [(3, 20.0, 0.1), (4, 35.0, 0.2), (5, 60.0, 0.25), (6, 90.0, 0.2)] {
        for seed in 0..4 {
            let field = make_twisted_grid(n, twist, jitter, seed);
            let sing = locate_singularities(&field);
            let mut encoded = encode_edges(&field, &sing);
            let solution = solve_integer_constraints(&field, &sing, &mut encoded, seed).unwrap();
            let graph = EdgeGraph {
                face_edge_ids: encoded.face_edge_ids.clone(),
                face_edge_orients: solution.face_edge_orients.clone(),
                edge_faces: encoded.edge_faces(),
                offsets: encoded.offsets.clone(),
            };
            let (refined, report) = refine_flow(graph, options.flow_levels, &GreedyFlowOptimizer::default()).unwrap();
            assert!(
                refined.unbalanced_faces().is_empty(),
                "n {n} twist {twist} seed {seed}: {:?}",
                refined.unbalanced_faces()
            );
            assert!(refined.offsets.iter().all(|o| o.max_abs() <= 1));
            assert!(report.zeroed_edges == 0 || report.unbalanced_after > 0);

            let extraction = extract_quad_mesh(&field, options.with_seed(seed))
                .unwrap_or_else(|err| panic!("n {n} twist {twist} seed {seed}: {err}"));
            assert_eq!(extraction.diagnostics.unresolved_flow, 0);
            assert!(extraction.mesh.face_count() > 0);
        }
    }
}

#[test]
fn half_scale_disk_is_not_degraded_by_border_chains() {
    let field = make_singular_disk(0.5);
    let extraction = extract_quad_mesh(&field, ExtractOptions::default()).unwrap();
    let diag = &extraction.diagnostics;

    assert!(
        !diag.warnings.iter().any(|w| w.contains("hole loop")),
        "{:?}",
        diag.warnings
    );
}

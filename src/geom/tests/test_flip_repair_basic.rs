use std::collections::BTreeSet;

use super::fixtures::{make_singular_disk, make_unit_square};
use crate::geom::{
    EdgeKey, EncodedEdges, FieldMesh, GridOffset, RepairSession, Rot4, TriMesh, Vec3, edges_around_singularities,
    encode_edges, locate_singularities, solve_integer_constraints,
};

const FLIPPED_ORIENTS: [[Rot4; 3]; 2] = [
    [Rot4::IDENTITY, Rot4::IDENTITY, Rot4::HALF],
    [Rot4::IDENTITY, Rot4::IDENTITY, Rot4::HALF],
];

/// Square `0, 1, 2, 3` split along `0 - 2`, with offsets that turn both
/// triangles inside out.
fn flipped_square() -> (FieldMesh, EncodedEdges) {
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ];
    let origins = positions.clone();
    let mesh = TriMesh::new(positions, vec![[0, 1, 2], [0, 2, 3]]);
    let field = FieldMesh::new(mesh, vec![Vec3::Z; 4], vec![Vec3::X; 4], origins, 1.0).unwrap();

    let encoded = EncodedEdges {
        edges: vec![EdgeKey(0, 1), EdgeKey(1, 2), EdgeKey(0, 2), EdgeKey(2, 3), EdgeKey(0, 3)],
        offsets: vec![
            GridOffset::new(-1, 0),
            GridOffset::new(1, 1),
            GridOffset::new(0, 1),
            GridOffset::new(1, 0),
            GridOffset::new(1, 1),
        ],
        face_edge_ids: vec![[0, 1, 2], [2, 3, 4]],
        clamped: 0,
    };
    (field, encoded)
}

#[test]
fn flipped_square_has_negative_area() {
    let (field, encoded) = flipped_square();
    let mut session = RepairSession::new(&field, &encoded, &FLIPPED_ORIENTS, BTreeSet::new());
    assert_eq!(session.total_negative_area(), 2);
}

#[test]
fn checked_moves_never_increase_negative_area() {
    let (field, encoded) = flipped_square();
    for vertex in 0..4 {
        for edge in 0..encoded.edge_count() {
            let mut session = RepairSession::new(&field, &encoded, &FLIPPED_ORIENTS, BTreeSet::new());
            let before = session.total_negative_area();
            let accepted = session.try_move(vertex, edge, true).unwrap();
            let after = session.total_negative_area();
            if accepted {
                assert!(after < before, "move ({vertex}, {edge}) kept area {after}");
                assert_eq!(session.report().accepted_moves, 1);
                let EdgeKey(a, b) = encoded.edges[edge];
                assert!(session.offset(edge).is_zero());
                assert_eq!(session.vertex_root(a), session.vertex_root(b));
            } else {
                assert_eq!(after, before, "rejected move ({vertex}, {edge}) changed area");
                assert_eq!(session.report().accepted_moves, 0);
            }
        }
    }
}

#[test]
fn clean_square_is_left_alone() {
    let field = make_unit_square();
    let sing = locate_singularities(&field);
    let mut encoded = encode_edges(&field, &sing);
    let solution = solve_integer_constraints(&field, &sing, &mut encoded, 0).unwrap();

    let session = RepairSession::new(&field, &encoded, &solution.face_edge_orients, BTreeSet::new());
    let (offsets, report) = session.run(1).unwrap();

    assert_eq!(offsets, encoded.offsets);
    assert_eq!(report.accepted_moves, 0);
    assert_eq!(report.collapsed_edges, 0);
    assert_eq!(report.flipped_faces, 0);
    assert_eq!(report.negative_area, 0);
}

#[test]
fn zero_edges_of_coarse_disk_collapse() {
    let field = make_singular_disk(100.0);
    let sing = locate_singularities(&field);
    let mut encoded = encode_edges(&field, &sing);
    let solution = solve_integer_constraints(&field, &sing, &mut encoded, 0).unwrap();
    assert!(encoded.offsets.iter().all(|o| o.is_zero()));

    let around = edges_around_singularities(&sing, &encoded);
    let session = RepairSession::new(&field, &encoded, &solution.face_edge_orients, around);
    let (_, report) = session.run(1).unwrap();

    assert_eq!(report.collapsed_edges, 6);
    assert_eq!(report.flipped_faces, 0);
}

use super::fixtures::{make_grid, make_unit_square};
use crate::geom::{
    EdgeKey, FieldMesh, GridOffset, TriMesh, Vec3, clamp_unit_steps, encode_edges, locate_singularities,
};

#[test]
fn square_edges_get_lattice_offsets() {
    let field = make_unit_square();
    let encoded = encode_edges(&field, &locate_singularities(&field));

    assert_eq!(
        encoded.edges,
        vec![EdgeKey(0, 1), EdgeKey(1, 3), EdgeKey(0, 3), EdgeKey(2, 3), EdgeKey(0, 2)]
    );
    assert_eq!(
        encoded.offsets,
        vec![
            GridOffset::new(1, 0),
            GridOffset::new(0, 1),
            GridOffset::new(1, 1),
            GridOffset::new(1, 0),
            GridOffset::new(0, 1),
        ]
    );
    assert_eq!(encoded.face_edge_ids, vec![[0, 1, 2], [2, 3, 4]]);
    assert_eq!(encoded.clamped, 0);
}

#[test]
fn shared_edges_are_encoded_once() {
    let field = make_grid(3);
    let encoded = encode_edges(&field, &locate_singularities(&field));

    assert_eq!(encoded.edge_count(), 33);
    let faces = encoded.edge_faces();
    let interior = faces.iter().filter(|[_, b]| b.is_some()).count();
    assert_eq!(interior, 33 - 12);
    assert!(faces.iter().all(|[a, _]| a.is_some()));
}

#[test]
fn long_edges_are_clamped_to_unit_steps() {
    let mesh = TriMesh::new(
        vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)],
        vec![[0, 1, 2]],
    );
    let origins = mesh.positions.clone();
    let field = FieldMesh::new(mesh, vec![Vec3::Z; 3], vec![Vec3::X; 3], origins, 1.0).unwrap();
    let encoded = encode_edges(&field, &locate_singularities(&field));

    assert_eq!(encoded.edges, vec![EdgeKey(0, 1), EdgeKey(1, 2), EdgeKey(0, 2)]);
    assert_eq!(
        encoded.offsets,
        vec![GridOffset::new(1, 0), GridOffset::new(-1, 1), GridOffset::new(0, 1)]
    );
    assert_eq!(encoded.clamped, 3);
}

#[test]
fn clamp_counts_changed_offsets() {
    let mut offsets = vec![GridOffset::new(2, 0), GridOffset::new(1, -1), GridOffset::new(-3, 5)];
    assert_eq!(clamp_unit_steps(&mut offsets), 2);
    assert_eq!(offsets, vec![GridOffset::new(1, 0), GridOffset::new(1, -1), GridOffset::new(-1, 1)]);
}

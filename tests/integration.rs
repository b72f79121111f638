use std::fmt::Write as _;

use quadfield_engine::geom::{ExtractOptions, PositionSolver, extract_quad_mesh};
use quadfield_engine::parse::{ParseError, parse_field_obj};

/// Field OBJ text for an `n x n` grid of unit cells aligned with the x axis.
fn grid_obj(n: usize) -> String {
    let side = n + 1;
    let mut text = String::from("# flat grid\n");
    for j in 0..side {
        for i in 0..side {
            writeln!(text, "v {i} {j} 0").unwrap();
        }
    }
    for j in 0..side {
        for i in 0..side {
            writeln!(text, "vq 1 0 0\nvo {i} {j} 0").unwrap();
        }
    }
    for j in 0..n {
        for i in 0..n {
            let v = j * side + i + 1;
            writeln!(text, "f {} {} {} {}", v, v + 1, v + side + 1, v + side).unwrap();
        }
    }
    text.push_str("scale 1\n");
    text
}

#[test]
fn grid_obj_round_trips_to_quads() {
    let field = parse_field_obj(&grid_obj(3)).expect("parse grid");
    assert_eq!(field.vertex_count(), 16);
    assert_eq!(field.face_count(), 18);

    let extraction = extract_quad_mesh(&field, ExtractOptions::default()).expect("extract");
    assert!(extraction.diagnostics.is_clean(), "{}", extraction.diagnostics);

    let mesh = extraction.mesh.export_dense();
    assert_eq!(mesh.vertex_count(), 16);
    assert_eq!(mesh.face_count(), 9);

    let mut out = Vec::new();
    mesh.write_obj(&mut out).expect("write obj");
    let text = String::from_utf8(out).expect("utf8");
    assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 16);
    let faces: Vec<&str> = text.lines().filter(|l| l.starts_with("f ")).collect();
    assert_eq!(faces.len(), 9);
    for face in faces {
        let indices: Vec<usize> = face[2..].split_whitespace().map(|s| s.parse().unwrap()).collect();
        assert_eq!(indices.len(), 4);
        assert!(indices.iter().all(|&i| (1..=16).contains(&i)));
    }
}

#[test]
fn seed_and_solver_do_not_change_a_regular_grid() {
    let field = parse_field_obj(&grid_obj(2)).expect("parse grid");
    let base = extract_quad_mesh(&field, ExtractOptions::default()).expect("extract");
    let other = extract_quad_mesh(
        &field,
        ExtractOptions::new()
            .with_seed(99)
            .with_position_solver(PositionSolver::jacobi())
            .with_flow_levels(1),
    )
    .expect("extract");

    assert_eq!(base.mesh, other.mesh);
    assert_eq!(base.diagnostics.summary(), "Q:4 V:9");
}

#[test]
fn missing_position_field_is_reported() {
    let text: String = grid_obj(1)
        .lines()
        .filter(|l| !l.starts_with("vo"))
        .map(|l| format!("{l}\n"))
        .collect();
    let err = parse_field_obj(&text).unwrap_err();
    assert!(matches!(err, ParseError::MissingRecords("vo")));
    assert_eq!(err.to_string(), "no `vo` records found");
}

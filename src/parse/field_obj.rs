//! Reader for triangle meshes annotated with field samples.
//!
//! Besides the usual `v`, `vn` and `f` records the file carries one `vq`
//! (orientation) and one `vo` (position-field point) record per vertex, and
//! optionally a `scale s` record with the lattice spacing:
//!
//! ```text
//! v 0 0 0
//! vq 1 0 0
//! vo 0 0 0
//! ...
//! f 1 2 3
//! scale 1.0
//! ```
//!
//! Faces with more than three corners are fanned into triangles. Unknown
//! records (`vt`, `g`, `usemtl`, ...) are skipped.

use thiserror::Error;

use crate::geom::{FieldError, FieldMesh, TriMesh, Vec3};

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Error)]
pub enum ParseError {
    /// A record could not be read.
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A per-vertex field is absent altogether.
    #[error("no `{0}` records found")]
    MissingRecords(&'static str),

    /// The records parse but do not form a usable field mesh.
    #[error(transparent)]
    Field(#[from] FieldError),
}

impl ParseError {
    fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax { line, message: message.into() }
    }
}

#[derive(Debug, Default)]
struct Records {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    orientations: Vec<Vec3>,
    origins: Vec<Vec3>,
    faces: Vec<[usize; 3]>,
    scale: Option<f64>,
}

/// Parses a field OBJ document into a validated [`FieldMesh`].
///
/// Missing `vn` records fall back to angle-weighted vertex normals and a
/// missing `scale` record to [`FieldMesh::default_scale`]. `vq` and `vo`
/// records are required.
pub fn parse_field_obj(input: &str) -> ParseResult<FieldMesh> {
    let mut records = Records::default();

    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        let mut tokens = content.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        let rest: Vec<&str> = tokens.collect();

        match keyword {
            "v" => records.positions.push(parse_vec3(line, &rest)?),
            "vn" => records.normals.push(parse_vec3(line, &rest)?),
            "vq" => records.orientations.push(parse_vec3(line, &rest)?),
            "vo" => records.origins.push(parse_vec3(line, &rest)?),
            "f" => {
                let count = records.positions.len();
                let corners = rest
                    .iter()
                    .map(|token| parse_index(line, token, count))
                    .collect::<ParseResult<Vec<_>>>()?;
                if corners.len() < 3 {
                    return Err(ParseError::syntax(line, format!("face has {} corners", corners.len())));
                }
                for k in 1..corners.len() - 1 {
                    records.faces.push([corners[0], corners[k], corners[k + 1]]);
                }
            }
            "scale" => {
                let [token] = rest.as_slice() else {
                    return Err(ParseError::syntax(line, "`scale` takes exactly one value"));
                };
                records.scale = Some(parse_f64(line, token)?);
            }
            _ => {}
        }
    }

    log::debug!(
        "field obj: {} vertices, {} faces, {} normals",
        records.positions.len(),
        records.faces.len(),
        records.normals.len()
    );
    build_field(records)
}

fn build_field(records: Records) -> ParseResult<FieldMesh> {
    if records.orientations.is_empty() {
        return Err(ParseError::MissingRecords("vq"));
    }
    if records.origins.is_empty() {
        return Err(ParseError::MissingRecords("vo"));
    }

    let mesh = TriMesh::new(records.positions, records.faces);
    mesh.validate().map_err(FieldError::InvalidMesh)?;
    let normals = if records.normals.is_empty() {
        mesh.vertex_normals()
    } else {
        records.normals
    };
    let scale = records.scale.unwrap_or_else(|| FieldMesh::default_scale(&mesh));

    Ok(FieldMesh::new(mesh, normals, records.orientations, records.origins, scale)?)
}

fn parse_f64(line: usize, token: &str) -> ParseResult<f64> {
    token
        .parse::<f64>()
        .map_err(|err| ParseError::syntax(line, format!("invalid number `{token}`: {err}")))
}

fn parse_vec3(line: usize, values: &[&str]) -> ParseResult<Vec3> {
    if values.len() < 3 {
        return Err(ParseError::syntax(line, format!("expected 3 coordinates, found {}", values.len())));
    }
    Ok(Vec3::new(
        parse_f64(line, values[0])?,
        parse_f64(line, values[1])?,
        parse_f64(line, values[2])?,
    ))
}

/// Resolves a `v`, `v/t`, `v//n` or `v/t/n` corner to a 0-based vertex index.
fn parse_index(line: usize, token: &str, vertex_count: usize) -> ParseResult<usize> {
    let head = token.split('/').next().unwrap_or_default();
    let value = head
        .parse::<i64>()
        .map_err(|err| ParseError::syntax(line, format!("invalid vertex index `{token}`: {err}")))?;

    let resolved = match value {
        0 => None,
        v if v > 0 => usize::try_from(v - 1).ok(),
        v => usize::try_from(v.unsigned_abs())
            .ok()
            .and_then(|back| vertex_count.checked_sub(back)),
    };
    resolved.ok_or_else(|| ParseError::syntax(line, format!("vertex index `{token}` out of range")))
}

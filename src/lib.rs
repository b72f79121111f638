#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Field-aligned quad mesh extraction.
//!
//! Takes a triangle mesh carrying a smooth 4-RoSy orientation field and a
//! position field (see [`parse::parse_field_obj`] for the text format) and
//! turns it into a quad mesh whose edges follow the field:
//!
//! ```ignore
//! use quadfield_engine::geom::{ExtractOptions, extract_quad_mesh};
//! use quadfield_engine::parse::parse_field_obj;
//!
//! let field = parse_field_obj(&text)?;
//! let extraction = extract_quad_mesh(&field, ExtractOptions::default().with_seed(7))?;
//! extraction.mesh.export_dense().write_obj(&mut out)?;
//! eprintln!("{}", extraction.diagnostics.summary());
//! ```

pub mod geom;
pub mod parse;

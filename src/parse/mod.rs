//! Text input formats.

pub mod field_obj;

pub use field_obj::{ParseError, ParseResult, parse_field_obj};

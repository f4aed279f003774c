//! Byte-level access to class-file data.
//!
//! - [`parser::Parser`] - Cursor over a byte slice with bounds-checked big-endian reads
//! - [`io`] - Free functions and the [`io::ClassIO`] trait used by the parser and the encoders

pub mod io;
pub mod parser;

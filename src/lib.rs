//! Back up a SQLite or DuckDB database as a dependency-ordered SQL script.
//!
//! The pipeline reads table metadata through a [`source::MetadataSource`], builds a
//! [`schema::Schema`], orders its tables so referenced tables come first, renders
//! `CREATE TABLE` and `INSERT` statements and writes them through a [`writer::SqlWriter`].

pub mod dump;
pub mod error;
pub mod render;
pub mod schema;
pub mod source;
pub mod writer;

pub use error::{Error, ErrorKind, Result};

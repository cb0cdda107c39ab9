//! Error types for schema extraction, ordering and rendering.

use thiserror::Error;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The metadata source failed to connect, query or scan
    SourceAccess,
    /// The extracted model is inconsistent (missing column, dangling reference, cycle, ...)
    Integrity,
    /// Creating or writing the output failed
    Io,
    /// Malformed invocation, detected before any connection is opened
    Usage,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("metadata source error: {0}")]
    Source(String),

    #[error("column '{column}' not found in table '{table}'")]
    NotFound { table: String, column: String },

    #[error(
        "table '{table}' references unknown table '{referenced_table}' through column '{column}'"
    )]
    DanglingReference {
        table: String,
        column: String,
        referenced_table: String,
    },

    #[error("foreign keys form a cycle between tables: {}", tables.join(", "))]
    Cycle { tables: Vec<String> },

    #[error("unsupported type '{type_name}' for column {table}.{column}")]
    UnsupportedType {
        table: String,
        column: String,
        type_name: String,
    },

    #[error("row of table '{table}' has no value for column '{column}'")]
    MissingValue { table: String, column: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Sqlite(_) | Error::DuckDb(_) | Error::Source(_) => ErrorKind::SourceAccess,
            Error::NotFound { .. }
            | Error::DanglingReference { .. }
            | Error::Cycle { .. }
            | Error::UnsupportedType { .. }
            | Error::MissingValue { .. } => ErrorKind::Integrity,
            Error::Io(_) => ErrorKind::Io,
            Error::Usage(_) => ErrorKind::Usage,
        }
    }
}

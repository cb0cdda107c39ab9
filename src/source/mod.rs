//! Metadata sources: schema and row introspection of a database.
//!
//! A [`MetadataSource`] answers the questions the extractor asks (tables, columns,
//! primary keys, imported foreign keys) and pages through table rows. Every call
//! fully consumes and releases its cursor before returning, so a single connection
//! can serve metadata queries and row scans in sequence. A dump brackets all of its
//! calls with [`MetadataSource::begin_read`] and [`MetadataSource::end_read`] so they
//! see one snapshot of the database.

mod duckdb;
mod memory;
mod pattern;
mod sqlite;

pub use self::duckdb::DuckDbSource;
pub use memory::{MemorySource, SourceOperation};
pub use pattern::{TableFilter, TablePattern};
pub use sqlite::SqliteSource;

use crate::error::Result;
use crate::render::quote_identifier;
use ahash::AHashMap;
use std::collections::VecDeque;

/// Default number of rows fetched per page during a row scan
pub const DEFAULT_SCAN_BATCH: usize = 1000;

/// One column as reported by a metadata source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Owning table
    pub table: String,
    /// Column name
    pub name: String,
    /// Declared type name, verbatim (e.g. `VARCHAR(255)`)
    pub type_name: String,
    pub nullable: bool,
    pub auto_increment: bool,
}

/// One imported (foreign) key column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedKey {
    /// Identifies the foreign-key constraint; columns of a composite key share it
    pub constraint: u32,
    pub local_column: String,
    pub referenced_column: String,
    pub referenced_table: String,
}

/// A full-table scan over a fixed column list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanQuery {
    pub table: String,
    pub columns: Vec<String>,
}

impl ScanQuery {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    /// Quoted select list, `*` when no columns are named
    pub fn select_list(&self) -> String {
        if self.columns.is_empty() {
            return "*".to_string();
        }
        self.columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// SELECT statement for this scan, without paging
    pub fn to_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}",
            self.select_list(),
            quote_identifier(&self.table)
        )
    }
}

/// Where the next page of a row scan starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanCursor {
    /// First page; the source picks how to continue
    #[default]
    Start,
    /// After the row with this rowid
    After(i64),
    /// After this many rows, for tables without a usable rowid
    Offset(usize),
}

impl ScanCursor {
    /// Rows already consumed by an offset-paged scan
    pub fn offset(&self) -> usize {
        match self {
            ScanCursor::Offset(n) => *n,
            _ => 0,
        }
    }
}

/// One page of a row scan
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<Row>,
    /// Cursor for the following page
    pub next: ScanCursor,
}

/// A single cell value read from a table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    /// Exact numeric kept in its textual form (decimals, 128-bit integers)
    Numeric(String),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

/// A row: column name → value
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: AHashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Row::insert`]
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

/// Schema and row introspection of a database.
///
/// Table patterns use metadata-API syntax, see [`TablePattern`].
pub trait MetadataSource {
    /// Names of the tables matching `pattern`, in a stable order
    fn list_tables(&self, pattern: &TablePattern) -> Result<Vec<String>>;

    /// Columns of every table matching `pattern`, in ordinal order per table
    fn list_columns(&self, pattern: &TablePattern) -> Result<Vec<ColumnInfo>>;

    /// Primary-key column names of `table`, in key order
    fn list_primary_keys(&self, table: &str) -> Result<Vec<String>>;

    /// Foreign-key columns of `table`
    fn list_imported_keys(&self, table: &str) -> Result<Vec<ImportedKey>>;

    /// Fetch up to `limit` rows starting at `cursor`. The database cursor is
    /// released before this returns.
    fn fetch_rows(&self, query: &ScanQuery, cursor: ScanCursor, limit: usize) -> Result<Page>;

    /// Start a read transaction so later calls share one snapshot
    fn begin_read(&self) -> Result<()> {
        Ok(())
    }

    /// Finish the read transaction started by [`MetadataSource::begin_read`]
    fn end_read(&self) -> Result<()> {
        Ok(())
    }

    /// Rows fetched per page by [`MetadataSource::scan_rows`]
    fn scan_batch_size(&self) -> usize {
        DEFAULT_SCAN_BATCH
    }

    /// Lazily scan all rows matching `query`
    fn scan_rows(&self, query: ScanQuery) -> RowScan<'_, Self> {
        RowScan::new(self, query, self.scan_batch_size())
    }
}

/// Lazy row iterator that pages through [`MetadataSource::fetch_rows`].
///
/// A failed page is yielded once as `Err` and ends the scan.
pub struct RowScan<'a, S: ?Sized> {
    source: &'a S,
    query: ScanQuery,
    batch_size: usize,
    cursor: ScanCursor,
    buffer: VecDeque<Row>,
    exhausted: bool,
}

impl<'a, S: MetadataSource + ?Sized> RowScan<'a, S> {
    pub fn new(source: &'a S, query: ScanQuery, batch_size: usize) -> Self {
        Self {
            source,
            query,
            batch_size: batch_size.max(1),
            cursor: ScanCursor::Start,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let page = self
            .source
            .fetch_rows(&self.query, self.cursor, self.batch_size)?;
        if page.rows.len() < self.batch_size {
            self.exhausted = true;
        }
        self.cursor = page.next;
        self.buffer.extend(page.rows);
        Ok(())
    }
}

impl<S: MetadataSource + ?Sized> Iterator for RowScan<'_, S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

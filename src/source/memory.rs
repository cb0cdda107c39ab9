//! In-memory metadata source for tests and benchmarks.

use super::{
    ColumnInfo, ImportedKey, MetadataSource, Page, Row, ScanCursor, ScanQuery, TablePattern, Value,
};
use crate::error::{Error, Result};

/// A [`MetadataSource`] call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOperation {
    ListTables,
    ListColumns,
    PrimaryKeys,
    ImportedKeys,
    FetchRows,
}

#[derive(Debug, Default)]
struct MemoryTable {
    name: String,
    columns: Vec<ColumnInfo>,
    primary_keys: Vec<String>,
    imported_keys: Vec<ImportedKey>,
    rows: Vec<Row>,
}

/// Metadata source built up in code.
///
/// ```
/// use sql_backup::source::{MemorySource, Value};
///
/// let source = MemorySource::new()
///     .column("users", "id", "INTEGER", false)
///     .primary_key("users", "id")
///     .row("users", [("id", Value::Integer(1))]);
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: Vec<MemoryTable>,
    failing: Option<SourceOperation>,
    batch_size: Option<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, name: &str) -> &mut MemoryTable {
        let pos = match self.tables.iter().position(|t| t.name == name) {
            Some(pos) => pos,
            None => {
                self.tables.push(MemoryTable {
                    name: name.to_string(),
                    ..Default::default()
                });
                self.tables.len() - 1
            }
        };
        &mut self.tables[pos]
    }

    fn next_constraint(&self, table: &str) -> u32 {
        self.find(table)
            .and_then(|t| t.imported_keys.iter().map(|k| k.constraint + 1).max())
            .unwrap_or(0)
    }

    fn find(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Declare a table with no columns yet
    pub fn table(mut self, name: &str) -> Self {
        self.table_mut(name);
        self
    }

    /// Add a column, creating the table on first use
    pub fn column(mut self, table: &str, name: &str, type_name: &str, nullable: bool) -> Self {
        self.table_mut(table).columns.push(ColumnInfo {
            table: table.to_string(),
            name: name.to_string(),
            type_name: type_name.to_string(),
            nullable,
            auto_increment: false,
        });
        self
    }

    /// Add a non-null auto-increment column
    pub fn auto_increment_column(mut self, table: &str, name: &str, type_name: &str) -> Self {
        self.table_mut(table).columns.push(ColumnInfo {
            table: table.to_string(),
            name: name.to_string(),
            type_name: type_name.to_string(),
            nullable: false,
            auto_increment: true,
        });
        self
    }

    pub fn primary_key(mut self, table: &str, column: &str) -> Self {
        self.table_mut(table).primary_keys.push(column.to_string());
        self
    }

    pub fn foreign_key(
        self,
        table: &str,
        column: &str,
        referenced_table: &str,
        referenced_column: &str,
    ) -> Self {
        self.composite_foreign_key(table, &[(column, referenced_column)], referenced_table)
    }

    /// One foreign-key constraint over several `(column, referenced column)` pairs
    pub fn composite_foreign_key(
        mut self,
        table: &str,
        columns: &[(&str, &str)],
        referenced_table: &str,
    ) -> Self {
        let constraint = self.next_constraint(table);
        let keys = &mut self.table_mut(table).imported_keys;
        for (column, referenced_column) in columns {
            keys.push(ImportedKey {
                constraint,
                local_column: column.to_string(),
                referenced_column: referenced_column.to_string(),
                referenced_table: referenced_table.to_string(),
            });
        }
        self
    }

    pub fn row<'a>(mut self, table: &str, values: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        self.table_mut(table).rows.push(values.into_iter().collect());
        self
    }

    /// Make every call of `operation` fail with a source error
    pub fn fail_on(mut self, operation: SourceOperation) -> Self {
        self.failing = Some(operation);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    fn check(&self, operation: SourceOperation) -> Result<()> {
        if self.failing == Some(operation) {
            return Err(Error::Source(format!("{:?} failed", operation)));
        }
        Ok(())
    }
}

impl MetadataSource for MemorySource {
    fn list_tables(&self, pattern: &TablePattern) -> Result<Vec<String>> {
        self.check(SourceOperation::ListTables)?;
        Ok(self
            .tables
            .iter()
            .filter(|t| pattern.matches(&t.name))
            .map(|t| t.name.clone())
            .collect())
    }

    fn list_columns(&self, pattern: &TablePattern) -> Result<Vec<ColumnInfo>> {
        self.check(SourceOperation::ListColumns)?;
        Ok(self
            .tables
            .iter()
            .filter(|t| pattern.matches(&t.name))
            .flat_map(|t| t.columns.iter().cloned())
            .collect())
    }

    fn list_primary_keys(&self, table: &str) -> Result<Vec<String>> {
        self.check(SourceOperation::PrimaryKeys)?;
        Ok(self
            .find(table)
            .map(|t| t.primary_keys.clone())
            .unwrap_or_default())
    }

    fn list_imported_keys(&self, table: &str) -> Result<Vec<ImportedKey>> {
        self.check(SourceOperation::ImportedKeys)?;
        Ok(self
            .find(table)
            .map(|t| t.imported_keys.clone())
            .unwrap_or_default())
    }

    fn fetch_rows(&self, query: &ScanQuery, cursor: ScanCursor, limit: usize) -> Result<Page> {
        self.check(SourceOperation::FetchRows)?;
        let table = self
            .find(&query.table)
            .ok_or_else(|| Error::Source(format!("no such table: {}", query.table)))?;

        let offset = cursor.offset();
        let rows: Vec<Row> = table
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                query
                    .columns
                    .iter()
                    .filter_map(|c| row.get(c).map(|v| (c.as_str(), v.clone())))
                    .collect::<Row>()
            })
            .collect();

        Ok(Page {
            next: ScanCursor::Offset(offset + rows.len()),
            rows,
        })
    }

    fn scan_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(super::DEFAULT_SCAN_BATCH)
    }
}

//! In-memory schema model extracted from a metadata source.
//!
//! This module provides:
//! - Data models for tables, columns, constraints and foreign-key references
//! - Extraction of the model from a [`MetadataSource`](crate::source::MetadataSource)
//! - Dependency ordering with topological sorting and cycle detection

mod extract;
mod graph;
mod types;

pub use extract::*;
pub use graph::*;
pub use types::*;

use crate::error::{Error, Result};
use ahash::AHashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Unique identifier for a table within a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// A foreign-key edge: the referenced table and column.
///
/// The local column is the [`Column`] the reference is attached to. References are
/// plain names, so cycles between tables need no cycles in ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    /// Referenced table name
    pub table: String,
    /// Referenced column name
    pub column: String,
}

impl Reference {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Column definition within a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type
    pub declared_type: DeclaredType,
    constraints: BTreeSet<Constraint>,
    /// Foreign key originating from this column, if any
    pub reference: Option<Reference>,
}

impl Column {
    pub fn new(name: impl Into<String>, declared_type: impl Into<DeclaredType>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            constraints: BTreeSet::new(),
            reference: None,
        }
    }

    /// Builder form of [`Column::add_constraint`]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    /// Builder form of setting the foreign-key reference
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Add a constraint. `AUTOINCREMENT` always brings `PRIMARY KEY` with it.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        if constraint == Constraint::AutoIncrement {
            self.constraints.insert(Constraint::PrimaryKey);
        }
        self.constraints.insert(constraint);
    }

    pub fn has_constraint(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }

    /// Constraints in rendering order
    pub fn constraints(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.constraints.iter().copied()
    }

    pub fn field_type(&self) -> FieldType {
        self.declared_type.field_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.has_constraint(Constraint::PrimaryKey)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.has_constraint(Constraint::AutoIncrement)
    }

    pub fn is_not_null(&self) -> bool {
        self.has_constraint(Constraint::NotNull)
    }
}

/// Table definition: columns in ordinal order, primary key in key order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Table name (case-sensitive key)
    pub name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
}

impl Table {
    /// Create a new empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Builder form of [`Table::add_column`]
    pub fn with_column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    /// Add a column unless one with the same name already exists.
    ///
    /// Returns `false` when the name was taken; the existing column is kept.
    pub fn add_column(&mut self, column: Column) -> bool {
        if self.column(&column.name).is_some() {
            return false;
        }
        if column.is_primary_key() && !self.primary_key.contains(&column.name) {
            self.primary_key.push(column.name.clone());
        }
        self.columns.push(column);
        true
    }

    /// Get a column by name (case-sensitive)
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Columns in ordinal order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Primary-key column names in key order
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Mark an existing column as part of the primary key
    pub fn mark_primary_key(&mut self, column_name: &str) -> Result<()> {
        let table_name = self.name.clone();
        let column = self
            .column_mut(column_name)
            .ok_or_else(|| Error::NotFound {
                table: table_name,
                column: column_name.to_string(),
            })?;
        column.add_constraint(Constraint::PrimaryKey);

        if !self.primary_key.iter().any(|c| c == column_name) {
            self.primary_key.push(column_name.to_string());
        }
        Ok(())
    }

    /// Attach a foreign key to a local column.
    ///
    /// Returns `false` (and changes nothing) when the column does not exist.
    pub fn set_reference(&mut self, column_name: &str, reference: Reference) -> bool {
        match self.column_mut(column_name) {
            Some(column) => {
                column.reference = Some(reference);
                true
            }
            None => false,
        }
    }

    /// Foreign keys originating from this table, in column order
    pub fn references(&self) -> impl Iterator<Item = (&Column, &Reference)> + '_ {
        self.columns
            .iter()
            .filter_map(|c| c.reference.as_ref().map(|r| (c, r)))
    }

    /// Check whether any column of this table references `table_name`
    pub fn references_table(&self, table_name: &str) -> bool {
        self.references().any(|(_, r)| r.table == table_name)
    }
}

/// Complete extracted schema: tables keyed by name, kept in discovery order
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    #[serde(skip)]
    index: AHashMap<String, TableId>,
    tables: Vec<Table>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, returning its ID.
    ///
    /// A table whose name is already present is not replaced; the existing ID is returned.
    pub fn add_table(&mut self, table: Table) -> TableId {
        if let Some(&id) = self.index.get(&table.name) {
            return id;
        }
        let id = TableId(self.tables.len() as u32);
        self.index.insert(table.name.clone(), id);
        self.tables.push(table);
        id
    }

    /// Get table ID by name (case-sensitive)
    pub fn get_table_id(&self, name: &str) -> Option<TableId> {
        self.index.get(name).copied()
    }

    /// Get table by ID
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.0 as usize)
    }

    /// Get table by name
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.get_table_id(name).and_then(|id| self.table(id))
    }

    /// Get mutable table by name
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        let id = self.get_table_id(name)?;
        self.tables.get_mut(id.0 as usize)
    }

    /// Get the number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if schema is empty
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Iterate over tables in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }
}

/// Schemas compare by table name; discovery order is not significant.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|table| other.get_table(&table.name) == Some(table))
    }
}

impl Eq for Schema {}

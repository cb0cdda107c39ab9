//! Build a [`Schema`] from a [`MetadataSource`].

use super::{Column, Constraint, DeclaredType, Reference, Schema, Table};
use crate::error::{Error, Result};
use crate::source::{ColumnInfo, ImportedKey, MetadataSource, TableFilter};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A recoverable inconsistency found while extracting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractWarning {
    /// A foreign key names a local column the table does not have; the key was skipped
    MissingForeignKeyColumn {
        table: String,
        column: String,
        referenced_table: String,
    },
    /// A multi-column foreign key, kept as one single-column reference per column
    FlattenedForeignKey {
        table: String,
        columns: Vec<String>,
        referenced_table: String,
    },
}

impl std::fmt::Display for ExtractWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractWarning::MissingForeignKeyColumn {
                table,
                column,
                referenced_table,
            } => write!(
                f,
                "foreign key {}.{} -> {} skipped: column not found",
                table, column, referenced_table
            ),
            ExtractWarning::FlattenedForeignKey {
                table,
                columns,
                referenced_table,
            } => write!(
                f,
                "composite foreign key {}({}) -> {} written as one reference per column",
                table,
                columns.join(", "),
                referenced_table
            ),
        }
    }
}

/// Extracted schema plus the warnings raised while building it
#[derive(Debug, Default)]
pub struct Extraction {
    pub schema: Schema,
    pub warnings: Vec<ExtractWarning>,
}

/// Single-pass schema extraction.
///
/// Tables are created in the order the source lists them. Columns are attached
/// deduplicated by name, then primary keys are marked, then foreign keys attached.
pub struct SchemaExtractor<'a, S: MetadataSource + ?Sized> {
    source: &'a S,
    filter: TableFilter,
}

impl<'a, S: MetadataSource + ?Sized> SchemaExtractor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            filter: TableFilter::all(),
        }
    }

    pub fn with_filter(mut self, filter: TableFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn extract(&self) -> Result<Extraction> {
        let mut extraction = Extraction::default();

        for pattern in self.filter.include_patterns() {
            for name in self.source.list_tables(pattern)? {
                if self.filter.includes(&name) {
                    extraction.schema.add_table(Table::new(name));
                }
            }
        }

        for pattern in self.filter.include_patterns() {
            for info in self.source.list_columns(pattern)? {
                if let Some(table) = extraction.schema.get_table_mut(&info.table) {
                    table.add_column(column_from_info(&info)?);
                }
            }
        }

        let names: Vec<String> = extraction.schema.iter().map(|t| t.name.clone()).collect();
        for name in &names {
            let keys = self.source.list_primary_keys(name)?;
            let imported = self.source.list_imported_keys(name)?;
            for keys in composite_keys(&imported) {
                let columns: Vec<String> = keys.iter().map(|k| k.local_column.clone()).collect();
                warn!(
                    table = %name,
                    columns = %columns.join(", "),
                    referenced_table = %keys[0].referenced_table,
                    "composite foreign key flattened to single-column references"
                );
                extraction.warnings.push(ExtractWarning::FlattenedForeignKey {
                    table: name.clone(),
                    columns,
                    referenced_table: keys[0].referenced_table.clone(),
                });
            }

            let Some(table) = extraction.schema.get_table_mut(name) else {
                continue;
            };

            for key in &keys {
                table.mark_primary_key(key)?;
            }

            for fk in imported {
                let reference = Reference::new(&fk.referenced_table, &fk.referenced_column);
                if !table.set_reference(&fk.local_column, reference) {
                    warn!(
                        table = %name,
                        column = %fk.local_column,
                        referenced_table = %fk.referenced_table,
                        "foreign key column not found, skipping"
                    );
                    extraction
                        .warnings
                        .push(ExtractWarning::MissingForeignKeyColumn {
                            table: name.clone(),
                            column: fk.local_column,
                            referenced_table: fk.referenced_table,
                        });
                }
            }
        }

        debug!(
            tables = extraction.schema.len(),
            warnings = extraction.warnings.len(),
            "schema extracted"
        );
        Ok(extraction)
    }
}

/// Extract the tables selected by `filter`, discarding warnings (they are still logged)
pub fn extract<S: MetadataSource + ?Sized>(source: &S, filter: &TableFilter) -> Result<Schema> {
    Ok(SchemaExtractor::new(source)
        .with_filter(filter.clone())
        .extract()?
        .schema)
}

/// Imported keys grouped by constraint, for constraints spanning several columns
fn composite_keys(imported: &[ImportedKey]) -> Vec<Vec<&ImportedKey>> {
    let mut by_constraint: BTreeMap<u32, Vec<&ImportedKey>> = BTreeMap::new();
    for key in imported {
        by_constraint.entry(key.constraint).or_default().push(key);
    }
    by_constraint
        .into_values()
        .filter(|keys| keys.len() > 1)
        .collect()
}

fn column_from_info(info: &ColumnInfo) -> Result<Column> {
    let declared_type =
        DeclaredType::parse(&info.type_name).ok_or_else(|| Error::UnsupportedType {
            table: info.table.clone(),
            column: info.name.clone(),
            type_name: info.type_name.clone(),
        })?;

    let mut column = Column::new(&info.name, declared_type);
    if !info.nullable {
        column.add_constraint(Constraint::NotNull);
    }
    if info.auto_increment {
        column.add_constraint(Constraint::AutoIncrement);
    }
    Ok(column)
}

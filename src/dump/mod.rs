//! Dump pipeline: extract → order → render → write.
//!
//! All CREATE statements are written first, one group per table, followed by the
//! INSERT statements of every table in the same dependency order.

mod config;

pub use config::DumpConfig;

use crate::error::{Error, Result};
use crate::render::{RenderOptions, SqlRenderer};
use crate::schema::{
    order_tables, ExtractWarning, OrderStrategy, Schema, SchemaExtractor, SchemaGraph, Table,
};
use crate::source::{MetadataSource, ScanQuery, TableFilter};
use crate::writer::SqlWriter;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Database engine behind a source path, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Sqlite,
    DuckDb,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "db" | "sqlite" | "sqlite3" => Some(SourceKind::Sqlite),
            "duckdb" => Some(SourceKind::DuckDb),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Sqlite => write!(f, "SQLite"),
            SourceKind::DuckDb => write!(f, "DuckDB"),
        }
    }
}

/// Check the command-line paths before any connection is opened
pub fn validate_paths(source: &Path, output: &Path) -> Result<SourceKind> {
    let kind = SourceKind::from_path(source).ok_or_else(|| {
        Error::Usage(format!(
            "source database must have a .db, .sqlite, .sqlite3 or .duckdb extension: {}",
            source.display()
        ))
    })?;

    let is_sql = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sql"));
    if !is_sql {
        return Err(Error::Usage(format!(
            "output file must have a .sql extension: {}",
            output.display()
        )));
    }

    if !source.is_file() {
        return Err(Error::Usage(format!(
            "source database does not exist: {}",
            source.display()
        )));
    }

    Ok(kind)
}

/// Dump options
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    pub filter: TableFilter,
    pub render: RenderOptions,
    pub ordering: OrderStrategy,
    /// Append tables caught in foreign-key cycles instead of failing
    pub allow_cycles: bool,
    pub schema_only: bool,
    pub data_only: bool,
}

/// Extracted schema with the order its tables will be written in
#[derive(Debug)]
pub struct DumpPlan {
    pub schema: Schema,
    /// Table names in output order, cyclic tables last
    pub order: Vec<String>,
    pub cyclic_tables: Vec<String>,
    pub warnings: Vec<ExtractWarning>,
}

impl DumpPlan {
    /// Tables in output order
    pub fn tables(&self) -> Vec<&Table> {
        self.order
            .iter()
            .filter_map(|name| self.schema.get_table(name))
            .collect()
    }
}

/// Statistics from a dump
#[derive(Debug, Default)]
pub struct DumpStats {
    pub tables: usize,
    pub rows: u64,
    pub warnings: Vec<ExtractWarning>,
    pub cyclic_tables: Vec<String>,
}

type ProgressFn<'a> = Box<dyn Fn(usize, usize, &str) + 'a>;

pub struct Dumper<'a, S: MetadataSource + ?Sized> {
    source: &'a S,
    options: DumpOptions,
    progress_fn: Option<ProgressFn<'a>>,
}

impl<'a, S: MetadataSource + ?Sized> Dumper<'a, S> {
    pub fn new(source: &'a S, options: DumpOptions) -> Self {
        Self {
            source,
            options,
            progress_fn: None,
        }
    }

    /// Called with (tables done, total tables, table name) after each table's data
    pub fn with_progress<F: Fn(usize, usize, &str) + 'a>(mut self, f: F) -> Self {
        self.progress_fn = Some(Box::new(f));
        self
    }

    /// Extract the schema and decide the output order without reading any rows
    pub fn plan(&self) -> Result<DumpPlan> {
        let extraction = SchemaExtractor::new(self.source)
            .with_filter(self.options.filter.clone())
            .extract()?;

        let (order, cyclic_tables) = resolve_order(
            &extraction.schema,
            self.options.ordering,
            self.options.allow_cycles,
        )?;

        Ok(DumpPlan {
            schema: extraction.schema,
            order,
            cyclic_tables,
            warnings: extraction.warnings,
        })
    }

    /// Extract, order and write the whole database inside one read transaction
    pub fn dump<W: Write>(&self, writer: &mut SqlWriter<W>) -> Result<DumpStats> {
        self.source.begin_read()?;
        let result = self.dump_snapshot(writer);
        let ended = self.source.end_read();
        let stats = result?;
        ended?;
        Ok(stats)
    }

    fn dump_snapshot<W: Write>(&self, writer: &mut SqlWriter<W>) -> Result<DumpStats> {
        let plan = self.plan()?;
        let tables = plan.tables();
        let renderer = SqlRenderer::new(self.options.render);

        info!(
            tables = tables.len(),
            ordering = %self.options.ordering,
            "dumping database"
        );

        if !self.options.data_only {
            for table in &tables {
                writer.write_group(&renderer.render_create(table))?;
            }
        }

        let mut rows = 0;
        if !self.options.schema_only {
            let batch_size = self.source.scan_batch_size();
            for (i, table) in tables.iter().enumerate() {
                let written = self.dump_rows(table, &renderer, writer, batch_size)?;
                debug!(table = %table.name, rows = written, "table data written");
                rows += written;
                if let Some(ref progress) = self.progress_fn {
                    progress(i + 1, tables.len(), &table.name);
                }
            }
        }

        writer.flush()?;

        Ok(DumpStats {
            tables: tables.len(),
            rows,
            warnings: plan.warnings.clone(),
            cyclic_tables: plan.cyclic_tables.clone(),
        })
    }

    /// Write one group per scanned page of `table`
    fn dump_rows<W: Write>(
        &self,
        table: &Table,
        renderer: &SqlRenderer,
        writer: &mut SqlWriter<W>,
        batch_size: usize,
    ) -> Result<u64> {
        if table.columns().is_empty() {
            return Ok(0);
        }

        let columns = table.columns().iter().map(|c| c.name.clone()).collect();
        let query = ScanQuery::new(table.name.clone(), columns);

        let mut group = String::new();
        let mut in_group = 0;
        let mut count = 0;
        for row in self.source.scan_rows(query) {
            group.push_str(&renderer.render_insert(table, &row?)?);
            in_group += 1;
            count += 1;
            if in_group >= batch_size {
                writer.write_group(&group)?;
                group.clear();
                in_group = 0;
            }
        }

        if count > 0 && renderer.options().pretty {
            group.push('\n');
        }
        writer.write_group(&group)?;
        Ok(count)
    }
}

/// Output order plus the tables appended because of cycles
fn resolve_order(
    schema: &Schema,
    strategy: OrderStrategy,
    allow_cycles: bool,
) -> Result<(Vec<String>, Vec<String>)> {
    if strategy == OrderStrategy::Pairwise {
        let order = order_tables(schema, strategy)?
            .into_iter()
            .map(|t| t.name.clone())
            .collect();
        return Ok((order, Vec::new()));
    }

    let graph = SchemaGraph::from_schema(schema)?;
    let (order, cyclic) = graph.processing_order();
    let cyclic_names = graph.names(&cyclic);

    if !cyclic_names.is_empty() {
        if !allow_cycles {
            return Err(Error::Cycle {
                tables: cyclic_names,
            });
        }
        warn!(
            tables = %cyclic_names.join(", "),
            "foreign keys form a cycle, appending tables in discovery order"
        );
    }

    let mut names = graph.names(&order);
    names.extend(cyclic_names.iter().cloned());
    Ok((names, cyclic_names))
}

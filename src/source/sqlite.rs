//! SQLite metadata source backed by `rusqlite`.
//!
//! Tables are read from `sqlite_master` in creation order; columns, primary keys and
//! foreign keys come from the `pragma_table_info` and `pragma_foreign_key_list`
//! table-valued functions. Internal `sqlite_*` tables are never reported.
//!
//! Rows are paged by rowid (`WHERE rowid > ? ORDER BY rowid`); WITHOUT ROWID tables
//! fall back to LIMIT/OFFSET in primary-key order.

use super::{
    ColumnInfo, ImportedKey, MetadataSource, Page, Row, ScanCursor, ScanQuery, TablePattern, Value,
};
use crate::error::{Error, Result};
use crate::render::quote_identifier;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::cell::Cell;
use std::path::Path;

const LIST_TABLES_SQL: &str = "SELECT name, sql FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
     ORDER BY rowid";

const TABLE_INFO_SQL: &str =
    "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid";

const FOREIGN_KEYS_SQL: &str = "SELECT id, seq, \"table\", \"from\", \"to\" \
     FROM pragma_foreign_key_list(?1) ORDER BY id, seq";

const TABLE_SQL: &str = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1";

/// Names the rowid can be selected under, unless a column takes them
const ROWID_ALIASES: [&str; 3] = ["rowid", "_rowid_", "oid"];

/// Comments, string literals and quoted identifiers inside a DDL statement
static DDL_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"--[^\n]*|/\*(?s:.*?)\*/|'(?:[^']|'')*'|"(?:[^"]|"")*"|`(?:[^`]|``)*`|\[[^\]]*\]"#)
        .unwrap()
});

/// AUTOINCREMENT as a column constraint or inside a table-level primary key
static AUTOINCREMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bPRIMARY\s+KEY(?:\s+(?:ASC|DESC))?(?:\s+ON\s+CONFLICT\s+\w+)?\s+AUTOINCREMENT\b|\bPRIMARY\s+KEY\s*\([^)]*\bAUTOINCREMENT\s*\)",
    )
    .unwrap()
});

static WITHOUT_ROWID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\)\s*(?:STRICT\s*,\s*)?WITHOUT\s+ROWID\b").unwrap());

/// One row of `pragma_table_info`
struct TableInfo {
    name: String,
    type_name: String,
    not_null: bool,
    pk_position: i64,
}

pub struct SqliteSource {
    conn: Connection,
    batch_size: usize,
    /// Whether `begin_read` opened the current transaction
    in_read: Cell<bool>,
}

impl SqliteSource {
    /// Open a database file read-only
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            batch_size: super::DEFAULT_SCAN_BATCH,
            in_read: Cell::new(false),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// All user tables with their `CREATE TABLE` text, in creation order
    fn all_tables(&self) -> Result<Vec<(String, Option<String>)>> {
        let mut stmt = self.conn.prepare(LIST_TABLES_SQL)?;
        let tables = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    fn table_info(&self, table: &str) -> Result<Vec<TableInfo>> {
        let mut stmt = self.conn.prepare(TABLE_INFO_SQL)?;
        let info = stmt
            .query_map([table], |row| {
                Ok(TableInfo {
                    name: row.get(0)?,
                    type_name: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    pk_position: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(info)
    }

    /// Name under which the rowid of `table` can be selected.
    ///
    /// `None` for WITHOUT ROWID tables and for tables whose columns shadow every alias.
    fn rowid_alias(&self, table: &str) -> Result<Option<&'static str>> {
        let create_sql = self
            .conn
            .query_row(TABLE_SQL, [table], |row| row.get::<_, Option<String>>(0))
            .optional()?
            .flatten();
        let without_rowid = create_sql
            .is_some_and(|sql| WITHOUT_ROWID_RE.is_match(&DDL_NOISE_RE.replace_all(&sql, " ")));
        if without_rowid {
            return Ok(None);
        }

        let columns = self.table_info(table)?;
        Ok(ROWID_ALIASES
            .into_iter()
            .find(|alias| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(alias))))
    }
}

/// SQLite only honours AUTOINCREMENT on a sole `INTEGER PRIMARY KEY` column
fn is_auto_increment(info: &TableInfo, pk_count: usize, create_sql: Option<&str>) -> bool {
    pk_count == 1
        && info.pk_position == 1
        && info.type_name.eq_ignore_ascii_case("INTEGER")
        && create_sql.is_some_and(|sql| {
            AUTOINCREMENT_RE.is_match(&DDL_NOISE_RE.replace_all(sql, " "))
        })
}

/// The stored spelling of `name`; SQLite compares identifiers ASCII case-insensitively
fn stored_name<'a>(mut candidates: impl Iterator<Item = &'a str>, name: &str) -> Option<String> {
    candidates
        .find(|candidate| candidate.eq_ignore_ascii_case(name))
        .map(String::from)
}

fn convert_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Integer(n),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

impl MetadataSource for SqliteSource {
    fn list_tables(&self, pattern: &TablePattern) -> Result<Vec<String>> {
        Ok(self
            .all_tables()?
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| pattern.matches(name))
            .collect())
    }

    fn list_columns(&self, pattern: &TablePattern) -> Result<Vec<ColumnInfo>> {
        let mut columns = Vec::new();
        for (table, create_sql) in self.all_tables()? {
            if !pattern.matches(&table) {
                continue;
            }
            let info = self.table_info(&table)?;
            let pk_count = info.iter().filter(|c| c.pk_position > 0).count();
            for column in &info {
                columns.push(ColumnInfo {
                    table: table.clone(),
                    name: column.name.clone(),
                    type_name: column.type_name.clone(),
                    nullable: !column.not_null,
                    auto_increment: is_auto_increment(column, pk_count, create_sql.as_deref()),
                });
            }
        }
        Ok(columns)
    }

    fn list_primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let mut keys: Vec<(i64, String)> = self
            .table_info(table)?
            .into_iter()
            .filter(|c| c.pk_position > 0)
            .map(|c| (c.pk_position, c.name))
            .collect();
        keys.sort_by_key(|(position, _)| *position);
        Ok(keys.into_iter().map(|(_, name)| name).collect())
    }

    fn list_imported_keys(&self, table: &str) -> Result<Vec<ImportedKey>> {
        let rows: Vec<(u32, i64, String, String, Option<String>)> = {
            let mut stmt = self.conn.prepare(FOREIGN_KEYS_SQL)?;
            let rows = stmt
                .query_map([table], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // parent names come back spelled as in the REFERENCES clause
        let tables = self.all_tables()?;
        let mut keys = Vec::with_capacity(rows.len());
        for (constraint, seq, parent, local_column, to) in rows {
            let referenced_table =
                stored_name(tables.iter().map(|(name, _)| name.as_str()), &parent)
                    .unwrap_or(parent);

            // `REFERENCES parent` without a column list targets the parent's primary key
            let referenced_column = match to {
                Some(column) => {
                    let parent_columns = self.table_info(&referenced_table)?;
                    stored_name(parent_columns.iter().map(|c| c.name.as_str()), &column)
                        .unwrap_or(column)
                }
                None => {
                    let parent_keys = self.list_primary_keys(&referenced_table)?;
                    parent_keys
                        .get(seq as usize)
                        .cloned()
                        .ok_or_else(|| Error::NotFound {
                            table: referenced_table.clone(),
                            column: format!("primary key column #{}", seq + 1),
                        })?
                }
            };
            keys.push(ImportedKey {
                constraint,
                local_column,
                referenced_column,
                referenced_table,
            });
        }
        Ok(keys)
    }

    fn fetch_rows(&self, query: &ScanQuery, cursor: ScanCursor, limit: usize) -> Result<Page> {
        let rowid = match cursor {
            ScanCursor::Offset(_) => None,
            ScanCursor::Start => self.rowid_alias(&query.table)?,
            ScanCursor::After(_) => Some(self.rowid_alias(&query.table)?.ok_or_else(|| {
                Error::Source(format!("table {} has no rowid to page by", query.table))
            })?),
        };

        let table = quote_identifier(&query.table);
        let select = query.select_list();
        let (sql, bounds) = match (rowid, cursor) {
            (Some(alias), ScanCursor::After(last)) => (
                format!(
                    "SELECT {alias}, {select} FROM {table} WHERE {alias} > ?2 ORDER BY {alias} LIMIT ?1"
                ),
                vec![limit as i64, last],
            ),
            (Some(alias), _) => (
                format!("SELECT {alias}, {select} FROM {table} ORDER BY {alias} LIMIT ?1"),
                vec![limit as i64],
            ),
            (None, _) => {
                let keys = self.list_primary_keys(&query.table)?;
                let order = if keys.is_empty() {
                    String::new()
                } else {
                    let keys: Vec<_> = keys.iter().map(|k| quote_identifier(k)).collect();
                    format!(" ORDER BY {}", keys.join(", "))
                };
                (
                    format!("{}{} LIMIT ?1 OFFSET ?2", query.to_sql(), order),
                    vec![limit as i64, cursor.offset() as i64],
                )
            }
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let skip = usize::from(rowid.is_some());
        let names: Vec<String> = if query.columns.is_empty() {
            stmt.column_names()
                .into_iter()
                .skip(skip)
                .map(String::from)
                .collect()
        } else {
            query.columns.clone()
        };

        let mut rows = stmt.query(params_from_iter(bounds))?;
        let mut page = Vec::new();
        let mut last_rowid = None;
        while let Some(row) = rows.next()? {
            if rowid.is_some() {
                last_rowid = Some(row.get::<_, i64>(0)?);
            }
            let mut values = Row::new();
            for (i, name) in names.iter().enumerate() {
                values.insert(name.as_str(), convert_value(row.get_ref(i + skip)?));
            }
            page.push(values);
        }

        let next = match (rowid, last_rowid) {
            (Some(_), Some(last)) => ScanCursor::After(last),
            (Some(_), None) => cursor,
            (None, _) => ScanCursor::Offset(cursor.offset() + page.len()),
        };
        Ok(Page { rows: page, next })
    }

    fn begin_read(&self) -> Result<()> {
        // a caller's open transaction already pins the snapshot
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
            self.in_read.set(true);
        }
        Ok(())
    }

    fn end_read(&self) -> Result<()> {
        if self.in_read.replace(false) {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn scan_batch_size(&self) -> usize {
        self.batch_size
    }
}

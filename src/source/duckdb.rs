//! DuckDB metadata source.
//!
//! Reads the `main` schema through `information_schema` and `duckdb_constraints()`.
//! DuckDB has no AUTOINCREMENT column property, so no column reports one.
//! Rows are paged by the `rowid` pseudo-column unless a real column shadows it.

use super::{
    ColumnInfo, ImportedKey, MetadataSource, Page, Row, ScanCursor, ScanQuery, TablePattern, Value,
};
use crate::error::Result;
use crate::render::quote_identifier;
use duckdb::types::ValueRef;
use duckdb::{params_from_iter, AccessMode, Config, Connection};
use std::cell::Cell;
use std::path::Path;

const LIST_TABLES_SQL: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema = 'main' AND table_type = 'BASE TABLE' ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT column_name, data_type, is_nullable \
     FROM information_schema.columns \
     WHERE table_schema = 'main' AND table_name = ? ORDER BY ordinal_position";

const PRIMARY_KEYS_SQL: &str = "SELECT unnest(constraint_column_names) \
     FROM duckdb_constraints() \
     WHERE schema_name = 'main' AND table_name = ? AND constraint_type = 'PRIMARY KEY'";

const FOREIGN_KEYS_SQL: &str = "SELECT constraint_index, unnest(constraint_column_names), \
     unnest(referenced_column_names), referenced_table \
     FROM duckdb_constraints() \
     WHERE schema_name = 'main' AND table_name = ? AND constraint_type = 'FOREIGN KEY' \
     ORDER BY constraint_index";

/// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

pub struct DuckDbSource {
    conn: Connection,
    batch_size: usize,
    /// Whether `begin_read` opened the current transaction
    in_read: Cell<bool>,
}

impl DuckDbSource {
    /// Open a database file read-only
    pub fn open(path: &Path) -> Result<Self> {
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        let conn = Connection::open_with_flags(path, config)?;
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

    fn query_strings(&self, sql: &str, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(values)
    }

    /// Whether a column of `table` shadows the `rowid` pseudo-column
    fn shadows_rowid(&self, table: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare(COLUMNS_SQL)?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(names.iter().any(|name| name.eq_ignore_ascii_case("rowid")))
    }
}

/// Interval in the `N months N days HH:MM:SS[.ffffff]` form DuckDB parses back
fn format_interval(months: i32, days: i32, nanos: i64) -> String {
    let mut parts = Vec::new();
    if months != 0 {
        parts.push(format!("{} months", months));
    }
    if days != 0 {
        parts.push(format!("{} days", days));
    }
    if nanos != 0 || parts.is_empty() {
        let sign = if nanos < 0 { "-" } else { "" };
        let nanos = nanos.unsigned_abs();
        let secs = nanos / NANOS_PER_SECOND as u64;
        let micros = (nanos % NANOS_PER_SECOND as u64) / 1000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if micros != 0 {
            time.push_str(&format!(".{:06}", micros));
        }
        parts.push(time);
    }
    parts.join(" ")
}

fn convert_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Boolean(b),
        ValueRef::TinyInt(n) => Value::Integer(n.into()),
        ValueRef::SmallInt(n) => Value::Integer(n.into()),
        ValueRef::Int(n) => Value::Integer(n.into()),
        ValueRef::BigInt(n) => Value::Integer(n),
        ValueRef::HugeInt(n) => Value::Numeric(n.to_string()),
        ValueRef::UTinyInt(n) => Value::Integer(n.into()),
        ValueRef::USmallInt(n) => Value::Integer(n.into()),
        ValueRef::UInt(n) => Value::Integer(n.into()),
        ValueRef::UBigInt(n) => match i64::try_from(n) {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Numeric(n.to_string()),
        },
        ValueRef::Float(f) => Value::Real(f.into()),
        ValueRef::Double(f) => Value::Real(f),
        ValueRef::Decimal(d) => Value::Numeric(d.to_string()),
        ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        // with or without time zone, DuckDB hands over UTC instants
        ValueRef::Timestamp(unit, ts) => {
            let micros = unit.to_micros(ts);
            let secs = micros.div_euclid(1_000_000);
            let nanos = (micros.rem_euclid(1_000_000) * 1000) as u32;
            match chrono::DateTime::from_timestamp(secs, nanos) {
                Some(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
                None => Value::Integer(ts),
            }
        }
        ValueRef::Date32(days) => {
            match chrono::NaiveDate::from_num_days_from_ce_opt(UNIX_EPOCH_DAYS_FROM_CE + days) {
                Some(date) => Value::Text(date.format("%Y-%m-%d").to_string()),
                None => Value::Integer(days.into()),
            }
        }
        ValueRef::Time64(unit, t) => {
            let micros = unit.to_micros(t);
            let secs = micros.div_euclid(1_000_000) as u32;
            let nanos = (micros.rem_euclid(1_000_000) * 1000) as u32;
            match chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos) {
                Some(time) => Value::Text(time.format("%H:%M:%S%.f").to_string()),
                None => Value::Integer(t),
            }
        }
        ValueRef::Interval {
            months,
            days,
            nanos,
        } => Value::Text(format_interval(months, days, nanos)),
        other => Value::Text(format!("{:?}", other)),
    }
}

impl MetadataSource for DuckDbSource {
    fn list_tables(&self, pattern: &TablePattern) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(LIST_TABLES_SQL)?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(tables.into_iter().filter(|t| pattern.matches(t)).collect())
    }

    fn list_columns(&self, pattern: &TablePattern) -> Result<Vec<ColumnInfo>> {
        let mut columns = Vec::new();
        for table in self.list_tables(pattern)? {
            let mut stmt = self.conn.prepare(COLUMNS_SQL)?;
            let rows = stmt
                .query_map([table.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<duckdb::Result<Vec<_>>>()?;

            for (name, type_name, is_nullable) in rows {
                columns.push(ColumnInfo {
                    table: table.clone(),
                    name,
                    type_name,
                    nullable: is_nullable.eq_ignore_ascii_case("YES"),
                    auto_increment: false,
                });
            }
        }
        Ok(columns)
    }

    fn list_primary_keys(&self, table: &str) -> Result<Vec<String>> {
        self.query_strings(PRIMARY_KEYS_SQL, table)
    }

    fn list_imported_keys(&self, table: &str) -> Result<Vec<ImportedKey>> {
        let mut stmt = self.conn.prepare(FOREIGN_KEYS_SQL)?;
        let keys = stmt
            .query_map([table], |row| {
                Ok(ImportedKey {
                    constraint: row.get::<_, i64>(0)? as u32,
                    local_column: row.get(1)?,
                    referenced_column: row.get(2)?,
                    referenced_table: row.get(3)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn fetch_rows(&self, query: &ScanQuery, cursor: ScanCursor, limit: usize) -> Result<Page> {
        let keyed = match cursor {
            ScanCursor::Offset(_) => false,
            ScanCursor::Start => !self.shadows_rowid(&query.table)?,
            ScanCursor::After(_) => true,
        };

        let table = quote_identifier(&query.table);
        let select = query.select_list();
        let (sql, bounds) = match cursor {
            ScanCursor::After(last) => (
                format!("SELECT rowid, {select} FROM {table} WHERE rowid > ? ORDER BY rowid LIMIT ?"),
                vec![last, limit as i64],
            ),
            _ if keyed => (
                format!("SELECT rowid, {select} FROM {table} ORDER BY rowid LIMIT ?"),
                vec![limit as i64],
            ),
            // parallel scans have no stable order of their own
            _ => (
                format!("{} ORDER BY ALL LIMIT ? OFFSET ?", query.to_sql()),
                vec![limit as i64, cursor.offset() as i64],
            ),
        };

        let skip = usize::from(keyed);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bounds))?;

        let mut page = Vec::new();
        let mut last_rowid = None;
        while let Some(row) = rows.next()? {
            if keyed {
                last_rowid = Some(row.get::<_, i64>(0)?);
            }
            let mut values = Row::new();
            for (i, name) in query.columns.iter().enumerate() {
                values.insert(name.as_str(), convert_value(row.get_ref(i + skip)?));
            }
            page.push(values);
        }

        let next = match (keyed, last_rowid) {
            (true, Some(last)) => ScanCursor::After(last),
            (true, None) => cursor,
            (false, _) => ScanCursor::Offset(cursor.offset() + page.len()),
        };
        Ok(Page { rows: page, next })
    }

    fn begin_read(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN TRANSACTION")?;
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

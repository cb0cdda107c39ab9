//! SQL rendering of schema and data statements (SQLite dialect).
//!
//! - `CREATE TABLE` statements with inline column constraints, a table-level
//!   composite primary key and table-level foreign keys
//! - `INSERT INTO ... VALUES` statements with domain-aware literal quoting

use crate::error::{Error, Result};
use crate::schema::{Column, Constraint, Table};
use crate::source::{Row, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Literal written for absent values
pub const NULL_LITERAL: &str = "null";

/// Sentinel some exporters use for "no data" inside text values
const NO_DATA_SENTINEL: &str = "\\N";

static PLAIN_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// SQLite keywords, sorted for binary search
const KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "KEY",
    "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT", "NOTHING",
    "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS", "OUTER", "OVER",
    "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE", "RANGE",
    "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE", "RESTRICT",
    "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET", "TABLE",
    "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED", "UNION",
    "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE", "WINDOW",
    "WITH", "WITHOUT",
];

/// Quote an identifier when it is not a plain, non-keyword name
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    let is_keyword = KEYWORDS
        .binary_search(&name.to_ascii_uppercase().as_str())
        .is_ok();
    if PLAIN_IDENTIFIER.is_match(name) && !is_keyword {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// Quote character used for string literals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    /// Standard SQL `'...'`
    #[default]
    Single,
    /// Legacy `"..."` output; SQLite reads it as a string when no column matches
    Double,
}

impl QuoteStyle {
    pub fn quote_char(&self) -> char {
        match self {
            QuoteStyle::Single => '\'',
            QuoteStyle::Double => '"',
        }
    }
}

impl FromStr for QuoteStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(QuoteStyle::Single),
            "double" => Ok(QuoteStyle::Double),
            _ => Err(format!(
                "Unknown quote style: {}. Valid options: single, double",
                s
            )),
        }
    }
}

impl fmt::Display for QuoteStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteStyle::Single => write!(f, "single"),
            QuoteStyle::Double => write!(f, "double"),
        }
    }
}

/// Rendering switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// `CREATE TABLE IF NOT EXISTS` instead of a preceding `DROP TABLE IF EXISTS`
    pub soft: bool,
    /// One clause per line; whitespace only
    pub pretty: bool,
    pub quote: QuoteStyle,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            soft: false,
            pretty: true,
            quote: QuoteStyle::Single,
        }
    }
}

/// Renders tables and rows as SQL text
#[derive(Debug, Clone, Default)]
pub struct SqlRenderer {
    options: RenderOptions,
}

impl SqlRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render the `CREATE TABLE` statement of `table`, preceded by a `DROP TABLE IF EXISTS`
    /// unless rendering softly.
    pub fn render_create(&self, table: &Table) -> String {
        let name = quote_identifier(&table.name);
        let mut out = String::new();

        if self.options.soft {
            out.push_str("CREATE TABLE IF NOT EXISTS ");
        } else {
            out.push_str("DROP TABLE IF EXISTS ");
            out.push_str(&name);
            out.push_str(";\n");
            out.push_str("CREATE TABLE ");
        }
        out.push_str(&name);

        let clauses = self.table_clauses(table);
        if clauses.is_empty() {
            out.push_str(" ();\n");
        } else if self.options.pretty {
            out.push_str(" (\n\t");
            out.push_str(&clauses.join(",\n\t"));
            out.push_str("\n);\n");
        } else {
            out.push_str(" (");
            out.push_str(&clauses.join(", "));
            out.push_str(");\n");
        }

        if self.options.pretty {
            out.push('\n');
        }
        out
    }

    /// Render `CREATE TABLE` statements for tables already in dependency order
    pub fn render_schema<'t>(&self, tables: impl IntoIterator<Item = &'t Table>) -> String {
        tables
            .into_iter()
            .map(|table| self.render_create(table))
            .collect()
    }

    fn table_clauses(&self, table: &Table) -> Vec<String> {
        let inline_pk = table.primary_key().len() == 1;
        let mut clauses: Vec<String> = table
            .columns()
            .iter()
            .map(|column| column_clause(column, inline_pk))
            .collect();

        if table.primary_key().len() > 1 {
            clauses.push(format!(
                "PRIMARY KEY ({})",
                join_identifiers(table.primary_key())
            ));
        }

        for (column, reference) in table.references() {
            clauses.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                quote_identifier(&column.name),
                quote_identifier(&reference.table),
                quote_identifier(&reference.column)
            ));
        }
        clauses
    }

    /// Render one `INSERT` statement, values in the table's column order
    pub fn render_insert(&self, table: &Table, row: &Row) -> Result<String> {
        let name = quote_identifier(&table.name);
        if table.columns().is_empty() {
            return Ok(format!("INSERT INTO {} DEFAULT VALUES;\n", name));
        }

        let mut values = Vec::with_capacity(table.columns().len());
        for column in table.columns() {
            let value = row.get(&column.name).ok_or_else(|| Error::MissingValue {
                table: table.name.clone(),
                column: column.name.clone(),
            })?;
            values.push(self.format_value(column, value));
        }
        Ok(format!("INSERT INTO {} VALUES ({});\n", name, values.join(", ")))
    }

    /// Render one `INSERT` statement per row, stopping at the first failed row
    pub fn render_inserts<I>(&self, table: &Table, rows: I) -> Result<String>
    where
        I: IntoIterator<Item = Result<Row>>,
    {
        let mut out = String::new();
        for row in rows {
            out.push_str(&self.render_insert(table, &row?)?);
        }
        Ok(out)
    }

    /// Format a single value as a SQL literal for `column`
    pub fn format_value(&self, column: &Column, value: &Value) -> String {
        let field_type = column.field_type();
        let quoted_domain = field_type.is_character() || field_type.is_temporal();

        match value {
            Value::Null => NULL_LITERAL.to_string(),
            Value::Text(s) if s.is_empty() || s.contains(NO_DATA_SENTINEL) => {
                NULL_LITERAL.to_string()
            }
            Value::Blob(b) if b.is_empty() => NULL_LITERAL.to_string(),
            // text keeps its storage class even in untyped columns
            Value::Text(s) => self.quote(s),
            Value::Blob(b) => format!("X'{}'", hex::encode_upper(b)),
            other => {
                let text = match other {
                    Value::Integer(n) => n.to_string(),
                    Value::Real(f) => format_real(*f),
                    Value::Numeric(n) => n.clone(),
                    Value::Boolean(b) => b.to_string(),
                    _ => NULL_LITERAL.to_string(),
                };
                if quoted_domain && text != NULL_LITERAL {
                    self.quote(&text)
                } else {
                    text
                }
            }
        }
    }

    fn quote(&self, s: &str) -> String {
        let q = self.options.quote.quote_char();
        let mut out = String::with_capacity(s.len() + 2);
        out.push(q);
        for c in s.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }
}

fn column_clause(column: &Column, inline_pk: bool) -> String {
    let mut parts: Vec<String> = vec![quote_identifier(&column.name).into_owned()];

    let declared = column.declared_type.to_string();
    if !declared.is_empty() {
        parts.push(declared);
    }

    for constraint in column.constraints() {
        match constraint {
            Constraint::NotNull => parts.push(constraint.to_string()),
            Constraint::PrimaryKey | Constraint::AutoIncrement if inline_pk => {
                parts.push(constraint.to_string())
            }
            // part of the table-level key
            Constraint::PrimaryKey | Constraint::AutoIncrement => {}
        }
    }
    parts.join(" ")
}

fn join_identifiers(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_real(f: f64) -> String {
    if f.is_nan() {
        NULL_LITERAL.to_string()
    } else if f.is_infinite() {
        let literal = if f > 0.0 { "9e999" } else { "-9e999" };
        literal.to_string()
    } else {
        format!("{:?}", f)
    }
}

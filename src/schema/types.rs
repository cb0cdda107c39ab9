//! Declared column types and column constraints.

use serde::Serialize;
use std::fmt;

/// Declared SQL type names understood by the extractor.
///
/// The set covers the type names SQLite documents for its affinity rules plus the
/// names DuckDB reports through `information_schema`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Integer,
    Int,
    TinyInt,
    SmallInt,
    MediumInt,
    BigInt,
    UnsignedBigInt,
    HugeInt,
    UTinyInt,
    USmallInt,
    UInteger,
    UBigInt,
    Int2,
    Int8,
    Real,
    Double,
    DoublePrecision,
    Float,
    Numeric,
    Decimal,
    Boolean,
    Character,
    Char,
    Varchar,
    VaryingCharacter,
    NChar,
    NativeCharacter,
    NVarchar,
    Text,
    Clob,
    Uuid,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
    TimestampTz,
    Interval,
    /// Column declared without a type (SQLite allows this)
    Untyped,
}

impl FieldType {
    /// Parse a base type name (without modifier), case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();

        let field_type = match normalized.as_str() {
            "" => FieldType::Untyped,
            "INTEGER" => FieldType::Integer,
            "INT" => FieldType::Int,
            "TINYINT" => FieldType::TinyInt,
            "SMALLINT" => FieldType::SmallInt,
            "MEDIUMINT" => FieldType::MediumInt,
            "BIGINT" => FieldType::BigInt,
            "UNSIGNED BIG INT" => FieldType::UnsignedBigInt,
            "HUGEINT" | "INT128" => FieldType::HugeInt,
            "UTINYINT" | "UINT8" => FieldType::UTinyInt,
            "USMALLINT" | "UINT16" => FieldType::USmallInt,
            "UINTEGER" | "UINT32" => FieldType::UInteger,
            "UBIGINT" | "UINT64" => FieldType::UBigInt,
            "INT2" => FieldType::Int2,
            "INT8" => FieldType::Int8,
            "REAL" => FieldType::Real,
            "DOUBLE" => FieldType::Double,
            "DOUBLE PRECISION" => FieldType::DoublePrecision,
            "FLOAT" => FieldType::Float,
            "NUMERIC" => FieldType::Numeric,
            "DECIMAL" => FieldType::Decimal,
            "BOOLEAN" | "BOOL" => FieldType::Boolean,
            "CHARACTER" => FieldType::Character,
            "CHAR" => FieldType::Char,
            "VARCHAR" => FieldType::Varchar,
            "VARYING CHARACTER" => FieldType::VaryingCharacter,
            "NCHAR" => FieldType::NChar,
            "NATIVE CHARACTER" => FieldType::NativeCharacter,
            "NVARCHAR" => FieldType::NVarchar,
            "TEXT" => FieldType::Text,
            "CLOB" => FieldType::Clob,
            "UUID" => FieldType::Uuid,
            "BLOB" => FieldType::Blob,
            "DATE" => FieldType::Date,
            "TIME" => FieldType::Time,
            "DATETIME" => FieldType::DateTime,
            "TIMESTAMP" => FieldType::Timestamp,
            "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" => FieldType::TimestampTz,
            "INTERVAL" => FieldType::Interval,
            _ => return None,
        };
        Some(field_type)
    }

    /// Canonical spelling used when rendering DDL
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "INTEGER",
            FieldType::Int => "INT",
            FieldType::TinyInt => "TINYINT",
            FieldType::SmallInt => "SMALLINT",
            FieldType::MediumInt => "MEDIUMINT",
            FieldType::BigInt => "BIGINT",
            FieldType::UnsignedBigInt => "UNSIGNED BIG INT",
            FieldType::HugeInt => "HUGEINT",
            FieldType::UTinyInt => "UTINYINT",
            FieldType::USmallInt => "USMALLINT",
            FieldType::UInteger => "UINTEGER",
            FieldType::UBigInt => "UBIGINT",
            FieldType::Int2 => "INT2",
            FieldType::Int8 => "INT8",
            FieldType::Real => "REAL",
            FieldType::Double => "DOUBLE",
            FieldType::DoublePrecision => "DOUBLE PRECISION",
            FieldType::Float => "FLOAT",
            FieldType::Numeric => "NUMERIC",
            FieldType::Decimal => "DECIMAL",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Character => "CHARACTER",
            FieldType::Char => "CHAR",
            FieldType::Varchar => "VARCHAR",
            FieldType::VaryingCharacter => "VARYING CHARACTER",
            FieldType::NChar => "NCHAR",
            FieldType::NativeCharacter => "NATIVE CHARACTER",
            FieldType::NVarchar => "NVARCHAR",
            FieldType::Text => "TEXT",
            FieldType::Clob => "CLOB",
            FieldType::Uuid => "UUID",
            FieldType::Blob => "BLOB",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::DateTime => "DATETIME",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            FieldType::Interval => "INTERVAL",
            FieldType::Untyped => "",
        }
    }

    /// Character/string domain: values are written as quoted literals
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            FieldType::Character
                | FieldType::Char
                | FieldType::Varchar
                | FieldType::VaryingCharacter
                | FieldType::NChar
                | FieldType::NativeCharacter
                | FieldType::NVarchar
                | FieldType::Text
                | FieldType::Clob
                | FieldType::Uuid
        )
    }

    /// Date/time domain, stored as text in SQLite
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            FieldType::Date
                | FieldType::Time
                | FieldType::DateTime
                | FieldType::Timestamp
                | FieldType::TimestampTz
                | FieldType::Interval
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column's declared type: the base type plus an optional modifier such as `(255)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeclaredType {
    pub field_type: FieldType,
    /// Parenthesised length/precision, kept verbatim (e.g. `(10,2)`)
    pub modifier: Option<String>,
}

impl DeclaredType {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            modifier: None,
        }
    }

    /// Parse a type string as reported by a metadata source, e.g. `varchar(255)`.
    ///
    /// Returns `None` for type names outside [`FieldType`].
    pub fn parse(type_str: &str) -> Option<Self> {
        let trimmed = type_str.trim();
        let (base, modifier) = match trimmed.find('(') {
            Some(pos) => {
                let modifier: String = trimmed[pos..]
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                (&trimmed[..pos], Some(modifier))
            }
            None => (trimmed, None),
        };

        let field_type = FieldType::from_name(base)?;
        Some(Self {
            field_type,
            modifier,
        })
    }
}

impl From<FieldType> for DeclaredType {
    fn from(field_type: FieldType) -> Self {
        Self::new(field_type)
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_type.as_str())?;
        if let Some(modifier) = &self.modifier {
            f.write_str(modifier)?;
        }
        Ok(())
    }
}

/// Column constraints, ordered the way they are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Constraint {
    NotNull,
    PrimaryKey,
    AutoIncrement,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::NotNull => write!(f, "NOT NULL"),
            Constraint::PrimaryKey => write!(f, "PRIMARY KEY"),
            Constraint::AutoIncrement => write!(f, "AUTOINCREMENT"),
        }
    }
}

//! Table-name patterns in metadata-API syntax.
//!
//! `%` matches any run of characters, `_` matches exactly one character and `\`
//! escapes the next character. Matching is case-sensitive.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Regex(Regex),
}

/// A compiled table-name pattern
#[derive(Debug, Clone)]
pub struct TablePattern {
    pattern: String,
    matcher: Matcher,
}

impl TablePattern {
    /// Pattern matching every table
    pub fn any() -> Self {
        Self {
            pattern: "%".to_string(),
            matcher: Matcher::Any,
        }
    }

    pub fn new(pattern: &str) -> Result<Self> {
        if !pattern.is_empty() && pattern.chars().all(|c| c == '%') {
            return Ok(Self::any());
        }

        let mut re = String::with_capacity(pattern.len() + 8);
        re.push('^');
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '%' => re.push_str(".*"),
                '_' => re.push('.'),
                '\\' => match chars.next() {
                    Some(escaped) => re.push_str(&regex::escape(&escaped.to_string())),
                    None => re.push_str(&regex::escape("\\")),
                },
                other => re.push_str(&regex::escape(&other.to_string())),
            }
        }
        re.push('$');

        let regex = Regex::new(&re)
            .map_err(|e| Error::Usage(format!("invalid table pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: Matcher::Regex(regex),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Regex(re) => re.is_match(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl Default for TablePattern {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for TablePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for TablePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Include/exclude selection of tables.
///
/// A table is selected when it matches any include pattern and no exclude pattern.
#[derive(Debug, Clone)]
pub struct TableFilter {
    include: Vec<TablePattern>,
    exclude: Vec<TablePattern>,
}

impl TableFilter {
    /// Filter selecting every table
    pub fn all() -> Self {
        Self {
            include: vec![TablePattern::any()],
            exclude: Vec::new(),
        }
    }

    /// Build a filter from pattern lists. An empty include list selects every table.
    pub fn new(include: Vec<TablePattern>, exclude: Vec<TablePattern>) -> Self {
        let include = if include.is_empty() {
            vec![TablePattern::any()]
        } else {
            include
        };
        Self { include, exclude }
    }

    /// Parse comma-separated pattern lists as given on the command line
    pub fn parse(include: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        Ok(Self::new(
            parse_pattern_list(include)?,
            parse_pattern_list(exclude)?,
        ))
    }

    pub fn include_patterns(&self) -> &[TablePattern] {
        &self.include
    }

    pub fn exclude_patterns(&self) -> &[TablePattern] {
        &self.exclude
    }

    pub fn includes(&self, table: &str) -> bool {
        self.include.iter().any(|p| p.matches(table))
            && !self.exclude.iter().any(|p| p.matches(table))
    }
}

impl Default for TableFilter {
    fn default() -> Self {
        Self::all()
    }
}

fn parse_pattern_list(list: Option<&str>) -> Result<Vec<TablePattern>> {
    list.map(|l| {
        l.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(TablePattern::new)
            .collect()
    })
    .unwrap_or_else(|| Ok(Vec::new()))
}

//! YAML configuration for the dump command.
//!
//! Every field is optional; command-line flags override the file.
//!
//! ```yaml
//! tables: ["user%", "orders"]
//! exclude: ["user_audit"]
//! soft: true
//! pretty: false
//! ordering: topological
//! quote: single
//! batch_size: 5000
//! ```

use crate::render::QuoteStyle;
use crate::schema::OrderStrategy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Table patterns to include (`%` and `_` wildcards); empty means all tables
    pub tables: Vec<String>,
    /// Table patterns to exclude
    pub exclude: Vec<String>,
    pub soft: bool,
    pub pretty: bool,
    pub ordering: OrderStrategy,
    /// Append tables caught in foreign-key cycles instead of failing
    pub allow_cycles: bool,
    pub quote: QuoteStyle,
    pub schema_only: bool,
    pub data_only: bool,
    /// Rows fetched per page while scanning
    pub batch_size: Option<usize>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            exclude: Vec::new(),
            soft: false,
            pretty: true,
            ordering: OrderStrategy::default(),
            allow_cycles: false,
            quote: QuoteStyle::default(),
            schema_only: false,
            data_only: false,
            batch_size: None,
        }
    }
}

impl DumpConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: DumpConfig = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }
}

//! Dependency ordering of tables by their foreign keys.
//!
//! Provides:
//! - Dependency graph construction with reference validation
//! - Topological sorting (Kahn's algorithm) with cycle detection
//! - The pairwise reference comparator, kept for output compatibility

use super::{Schema, Table, TableId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Schema dependency graph built from foreign key relationships.
///
/// Edges run parent → child: a parent is referenced by a child's foreign key, so
/// creating parents first means no CREATE statement refers to an undefined table.
#[derive(Debug)]
pub struct SchemaGraph<'a> {
    schema: &'a Schema,
    /// For each table, the tables it references
    parents: Vec<Vec<TableId>>,
    /// For each table, the tables referencing it
    children: Vec<Vec<TableId>>,
}

/// Result of topological sort
#[derive(Debug)]
pub struct TopoSortResult {
    /// Tables in topological order (parents before children)
    pub order: Vec<TableId>,
    /// Tables that are part of cycles (could not be ordered)
    pub cyclic_tables: Vec<TableId>,
}

impl<'a> SchemaGraph<'a> {
    /// Build a dependency graph, validating every reference.
    ///
    /// Fails with `DanglingReference` when a referenced table is not in the schema and
    /// with `NotFound` when the referenced column is missing from it.
    pub fn from_schema(schema: &'a Schema) -> Result<Self> {
        let n = schema.len();
        let mut parents: Vec<Vec<TableId>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<TableId>> = vec![Vec::new(); n];

        for (i, table) in schema.iter().enumerate() {
            let child_id = TableId(i as u32);

            for (column, reference) in table.references() {
                let parent_id = schema.get_table_id(&reference.table).ok_or_else(|| {
                    Error::DanglingReference {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        referenced_table: reference.table.clone(),
                    }
                })?;

                let parent_has_column = schema
                    .table(parent_id)
                    .is_some_and(|parent| parent.column(&reference.column).is_some());
                if !parent_has_column {
                    return Err(Error::NotFound {
                        table: reference.table.clone(),
                        column: reference.column.clone(),
                    });
                }

                // Self-references never block creation order
                if parent_id != child_id {
                    if !parents[child_id.0 as usize].contains(&parent_id) {
                        parents[child_id.0 as usize].push(parent_id);
                    }
                    if !children[parent_id.0 as usize].contains(&child_id) {
                        children[parent_id.0 as usize].push(child_id);
                    }
                }
            }
        }

        Ok(Self {
            schema,
            parents,
            children,
        })
    }

    /// Get the number of tables in the graph
    pub fn len(&self) -> usize {
        self.schema.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    /// Get the table name for a table ID
    pub fn table_name(&self, id: TableId) -> Option<&'a str> {
        self.schema.table(id).map(|t| t.name.as_str())
    }

    /// Names of the tables `id` references, excluding itself
    pub fn dependencies(&self, id: TableId) -> Vec<&'a str> {
        self.parents
            .get(id.0 as usize)
            .map(|parents| {
                parents
                    .iter()
                    .filter_map(|&p| self.table_name(p))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if a table has a self-referential FK
    pub fn has_self_reference(&self, id: TableId) -> bool {
        self.schema
            .table(id)
            .map(|t| t.references_table(&t.name))
            .unwrap_or(false)
    }

    /// Get tables that have self-referential FKs
    pub fn self_referential_tables(&self) -> Vec<TableId> {
        (0..self.len())
            .map(|i| TableId(i as u32))
            .filter(|&id| self.has_self_reference(id))
            .collect()
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Returns tables in dependency order (parents before children).
    /// Tables that are part of cycles are returned separately.
    pub fn topo_sort(&self) -> TopoSortResult {
        let n = self.len();
        if n == 0 {
            return TopoSortResult {
                order: Vec::new(),
                cyclic_tables: Vec::new(),
            };
        }

        // Number of unprocessed parents per table
        let mut in_degree: Vec<usize> = self.parents.iter().map(Vec::len).collect();

        // Roots, in discovery order
        let mut queue: VecDeque<TableId> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| TableId(i as u32))
            .collect();

        let mut order = Vec::with_capacity(n);

        while let Some(table_id) = queue.pop_front() {
            order.push(table_id);

            for &child_id in &self.children[table_id.0 as usize] {
                in_degree[child_id.0 as usize] -= 1;
                if in_degree[child_id.0 as usize] == 0 {
                    queue.push_back(child_id);
                }
            }
        }

        // Tables with remaining in-degree > 0 are part of (or behind) a cycle
        let cyclic_tables: Vec<TableId> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg > 0)
            .map(|(i, _)| TableId(i as u32))
            .collect();

        TopoSortResult {
            order,
            cyclic_tables,
        }
    }

    /// Get processing order for dumping.
    ///
    /// Returns the topologically sorted acyclic tables and, separately, the cyclic
    /// tables, which callers may append after the rest.
    pub fn processing_order(&self) -> (Vec<TableId>, Vec<TableId>) {
        let result = self.topo_sort();
        (result.order, result.cyclic_tables)
    }

    /// Topological order, failing with `Cycle` when any tables could not be ordered
    pub fn ordered_tables(&self) -> Result<Vec<&'a Table>> {
        let (order, cyclic) = self.processing_order();
        if !cyclic.is_empty() {
            return Err(Error::Cycle {
                tables: self.names(&cyclic),
            });
        }
        Ok(self.tables(&order))
    }

    /// Resolve IDs to tables
    pub fn tables(&self, ids: &[TableId]) -> Vec<&'a Table> {
        ids.iter().filter_map(|&id| self.schema.table(id)).collect()
    }

    /// Resolve IDs to table names
    pub fn names(&self, ids: &[TableId]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| self.table_name(id))
            .map(String::from)
            .collect()
    }
}

/// Algorithm used to order tables for output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStrategy {
    /// Kahn's topological sort; cycles are an error
    #[default]
    Topological,
    /// Direct-reference comparator only. Not a true topological order for chains
    /// deeper than two tables or for cycles.
    Pairwise,
}

impl FromStr for OrderStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "topological" | "topo" => Ok(OrderStrategy::Topological),
            "pairwise" => Ok(OrderStrategy::Pairwise),
            _ => Err(format!(
                "Unknown ordering: {}. Valid options: topological, pairwise",
                s
            )),
        }
    }
}

impl fmt::Display for OrderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStrategy::Topological => write!(f, "topological"),
            OrderStrategy::Pairwise => write!(f, "pairwise"),
        }
    }
}

/// Compare two tables by direct references only.
///
/// `a` sorts first when `b` references it, last when it references `b`. Mutual
/// references and unrelated tables compare equal.
pub fn compare_tables(a: &Table, b: &Table) -> Ordering {
    let b_refs_a = b.references_table(&a.name);
    let a_refs_b = a.references_table(&b.name);
    match (b_refs_a, a_refs_b) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Stable insertion sort by [`compare_tables`].
///
/// The comparator is not a total order, so the library sorts (which may panic on
/// inconsistent comparators) are not used.
pub fn pairwise_order<'t>(tables: &[&'t Table]) -> Vec<&'t Table> {
    let mut sorted: Vec<&Table> = tables.to_vec();
    for i in 1..sorted.len() {
        let mut j = i;
        while j > 0 && compare_tables(sorted[j - 1], sorted[j]) == Ordering::Greater {
            sorted.swap(j - 1, j);
            j -= 1;
        }
    }
    sorted
}

/// Order every table of `schema` so referenced tables come before referencing ones
pub fn order_tables(schema: &Schema, strategy: OrderStrategy) -> Result<Vec<&Table>> {
    let graph = SchemaGraph::from_schema(schema)?;
    match strategy {
        OrderStrategy::Topological => graph.ordered_tables(),
        OrderStrategy::Pairwise => {
            let tables: Vec<&Table> = schema.iter().collect();
            Ok(pairwise_order(&tables))
        }
    }
}

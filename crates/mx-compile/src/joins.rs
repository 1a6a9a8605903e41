//! Join inference
//!
//! Finds tables a metric's expressions reference but its declared joins do
//! not reach, and proposes a join for each from schema metadata. Strategies
//! are tried in order: foreign key, shared column name, `{singular}_id`
//! naming pattern.

use crate::inflect::singularize;
use crate::integrity::expression_texts;
use mx_core::sql_utils::table_base_name;
use mx_core::{
    ColumnInfo, JoinCondition, JoinType, SchemaMetadata, SemanticJoin, SemanticMetric,
};
use mx_sql::extract_column_references;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use serde::Serialize;
use std::collections::HashMap;

/// How a join was inferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Declared foreign key between the tables
    ForeignKey,
    /// Identically named column on both tables
    SharedColumn,
    /// `{singular}_id` column pointing at the other table
    NamingPattern,
}

impl std::fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JoinStrategy::ForeignKey => "foreign_key",
            JoinStrategy::SharedColumn => "shared_column",
            JoinStrategy::NamingPattern => "naming_pattern",
        };
        f.write_str(s)
    }
}

/// A proposed join
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinSuggestion {
    /// The join to add
    pub join: SemanticJoin,
    /// Strategy that produced it
    pub strategy: JoinStrategy,
    /// Human-readable reason
    pub explanation: String,
}

/// Result of join inference
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinInferenceReport {
    /// Joins to add, in the order they should be declared
    pub suggestions: Vec<JoinSuggestion>,
    /// Referenced tables no strategy could attach
    pub unresolved: Vec<String>,
}

impl JoinInferenceReport {
    /// Whether every referenced table is reachable once suggestions are applied
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Whether nothing is missing
    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty() && self.unresolved.is_empty()
    }

    /// The suggested joins alone
    pub fn joins(&self) -> Vec<SemanticJoin> {
        self.suggestions.iter().map(|s| s.join.clone()).collect()
    }
}

/// Tables referenced by the metric's expressions, lowercased, in first-reference order
pub fn referenced_tables(metric: &SemanticMetric) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for (_, _, text) in expression_texts(metric) {
        for reference in extract_column_references(text) {
            let table = reference.table.to_ascii_lowercase();
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
    }
    tables
}

/// Tables reachable from the base relation over declared joins, in BFS order
pub fn reachable_tables(metric: &SemanticMetric) -> Vec<String> {
    let Some(base) = metric.base_relation() else {
        return Vec::new();
    };
    let mut graph: UnGraph<String, ()> = UnGraph::new_undirected();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
    let mut node = |graph: &mut UnGraph<String, ()>, table: &str| {
        let name = table_base_name(table).to_ascii_lowercase();
        *nodes
            .entry(name.clone())
            .or_insert_with(|| graph.add_node(name))
    };

    let root = node(&mut graph, base);
    for join in &metric.joins {
        let left = node(&mut graph, &join.left_table);
        let right = node(&mut graph, &join.right_table);
        graph.add_edge(left, right, ());
    }

    let mut reachable = Vec::new();
    let mut bfs = Bfs::new(&graph, root);
    while let Some(idx) = bfs.next(&graph) {
        reachable.push(graph[idx].clone());
    }
    reachable
}

/// Propose joins for every referenced table that is not reachable
pub fn find_missing_joins(metric: &SemanticMetric, schema: &SchemaMetadata) -> JoinInferenceReport {
    let mut report = JoinInferenceReport::default();
    let mut reachable = reachable_tables(metric);
    if reachable.is_empty() {
        return report;
    }

    for table in referenced_tables(metric) {
        if reachable.contains(&table) {
            continue;
        }
        let inferred = infer_by_foreign_key(&table, &reachable, schema)
            .or_else(|| infer_by_shared_column(&table, &reachable, schema))
            .or_else(|| infer_by_naming(&table, &reachable, schema));
        match inferred {
            Some(suggestion) => {
                log::debug!(
                    "Inferred {} join for '{}': {}",
                    suggestion.strategy,
                    table,
                    suggestion.explanation
                );
                report.suggestions.push(suggestion);
                reachable.push(table);
            }
            None => report.unresolved.push(table),
        }
    }
    report
}

fn make_join(joined: &str, new: &str, joined_column: &str, new_column: &str) -> SemanticJoin {
    SemanticJoin {
        name: format!("{}_{}", joined, new),
        join_type: JoinType::Left,
        left_table: joined.to_string(),
        right_table: new.to_string(),
        conditions: vec![JoinCondition {
            left_column: joined_column.to_string(),
            right_column: new_column.to_string(),
        }],
    }
}

fn infer_by_foreign_key(
    table: &str,
    reachable: &[String],
    schema: &SchemaMetadata,
) -> Option<JoinSuggestion> {
    let fks = schema.foreign_keys();
    for joined in reachable {
        for fk in &fks {
            let from = table_base_name(&fk.table).to_ascii_lowercase();
            let to = table_base_name(&fk.ref_table).to_ascii_lowercase();
            let (joined_col, new_col) = if &from == joined && to == table {
                (&fk.column, &fk.ref_column)
            } else if from == table && &to == joined {
                (&fk.ref_column, &fk.column)
            } else {
                continue;
            };
            return Some(JoinSuggestion {
                join: make_join(joined, table, joined_col, new_col),
                strategy: JoinStrategy::ForeignKey,
                explanation: format!(
                    "foreign key {}.{} -> {}.{}",
                    from, fk.column, to, fk.ref_column
                ),
            });
        }
    }
    None
}

fn key_rank(column: &str, a: Option<&ColumnInfo>, b: Option<&ColumnInfo>) -> u8 {
    let is_pk = a.is_some_and(|c| c.primary_key) || b.is_some_and(|c| c.primary_key);
    if column.eq_ignore_ascii_case("id") || is_pk {
        0
    } else if column.to_ascii_lowercase().ends_with("_id") {
        1
    } else {
        2
    }
}

fn infer_by_shared_column(
    table: &str,
    reachable: &[String],
    schema: &SchemaMetadata,
) -> Option<JoinSuggestion> {
    let new_columns = schema.columns(table)?;
    let mut best: Option<(u8, usize, String, &str)> = None;
    for (idx, joined) in reachable.iter().enumerate() {
        let Some(joined_columns) = schema.columns(joined) else {
            continue;
        };
        for col in new_columns {
            let Some(other) = joined_columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&col.name))
            else {
                continue;
            };
            let candidate = (key_rank(&col.name, Some(col), Some(other)), idx, col.name.clone(), joined.as_str());
            let better = match &best {
                None => true,
                Some(b) => (candidate.0, candidate.1, &candidate.2) < (b.0, b.1, &b.2),
            };
            if better {
                best = Some(candidate);
            }
        }
    }
    let (_, _, column, joined) = best?;
    Some(JoinSuggestion {
        join: make_join(joined, table, &column, &column),
        strategy: JoinStrategy::SharedColumn,
        explanation: format!("'{}' and '{}' share column '{}'", joined, table, column),
    })
}

fn infer_by_naming(
    table: &str,
    reachable: &[String],
    schema: &SchemaMetadata,
) -> Option<JoinSuggestion> {
    let target_key = |t: &str| schema.primary_key(t).unwrap_or("id").to_string();
    let new_fk = format!("{}_id", singularize(table));
    for joined in reachable {
        // joined.{table}_id -> table.id
        if schema.has_column(joined, &new_fk) {
            let key = target_key(table);
            return Some(JoinSuggestion {
                join: make_join(joined, table, &new_fk, &key),
                strategy: JoinStrategy::NamingPattern,
                explanation: format!("naming pattern {}.{} -> {}.{}", joined, new_fk, table, key),
            });
        }
        // table.{joined}_id -> joined.id
        let joined_fk = format!("{}_id", singularize(joined));
        if schema.has_column(table, &joined_fk) {
            let key = target_key(joined);
            return Some(JoinSuggestion {
                join: make_join(joined, table, &key, &joined_fk),
                strategy: JoinStrategy::NamingPattern,
                explanation: format!("naming pattern {}.{} -> {}.{}", table, joined_fk, joined, key),
            });
        }
    }
    None
}

#[cfg(test)]
#[path = "joins_test.rs"]
mod tests;

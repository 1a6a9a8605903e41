//! Pre-aggregation routing
//!
//! A request is answered from a rollup when the rollup holds every
//! requested measure and can produce every requested dimension, and the
//! request's filters can be evaluated over rollup columns. The rewrite builds
//! a metric over the rollup table and runs it through the regular SQL
//! generator, so ordering, limits, formats, and derived measures carry over.

use crate::error::EngineResult;
use mx_core::sql_utils::same_table;
use mx_core::{
    CancelToken, Dialect, MeasureType, MetricId, OrderTarget, PreAggregationSpec,
    PreAggregationStatus, RollupDimension, SemanticDimension, SemanticFilter, SemanticMeasure,
    SemanticMetric,
};
use mx_sql::params::blank_placeholders;
use mx_sql::{extract_columns, ParameterValues, SqlGenerator, SqlStatement};
use regex::Regex;
use serde::Serialize;
use std::sync::RwLock;

/// Source of rollup definitions
pub trait PreAggregationCatalog: Send + Sync {
    /// Every rollup declared for a metric
    fn specs_for(&self, metric_id: &MetricId) -> Vec<PreAggregationSpec>;
}

/// Process-local catalog
#[derive(Default)]
pub struct InMemoryCatalog {
    specs: RwLock<Vec<PreAggregationSpec>>,
}

impl InMemoryCatalog {
    /// Catalog holding `specs`
    pub fn new(specs: Vec<PreAggregationSpec>) -> Self {
        Self {
            specs: RwLock::new(specs),
        }
    }

    /// Add a spec
    pub fn add(&self, spec: PreAggregationSpec) {
        if let Ok(mut specs) = self.specs.write() {
            specs.push(spec);
        }
    }

    /// Move a spec through its build lifecycle
    pub fn transition(&self, spec_id: &str, next: PreAggregationStatus) -> EngineResult<bool> {
        let Ok(mut specs) = self.specs.write() else {
            return Ok(false);
        };
        match specs.iter_mut().find(|s| s.id == spec_id) {
            Some(spec) => {
                spec.transition(next, chrono::Utc::now())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl PreAggregationCatalog for InMemoryCatalog {
    fn specs_for(&self, metric_id: &MetricId) -> Vec<PreAggregationSpec> {
        self.specs
            .read()
            .map(|specs| {
                specs
                    .iter()
                    .filter(|s| &s.metric_id == metric_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A request rewritten against a rollup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupRewrite {
    /// Spec that serves the request
    pub spec_id: String,
    /// Rollup table queried
    pub table_name: String,
    /// Whether rollup rows are re-aggregated (coarser grain or fewer dimensions)
    pub reaggregated: bool,
    /// SQL against the rollup
    pub statement: SqlStatement,
}

fn normalize(expr: &str) -> String {
    expr.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// How one requested dimension is read from the rollup
struct DimensionMapping<'a> {
    stored: &'a RollupDimension,
    /// Requested grain is coarser than the stored grain
    coarsened: bool,
}

fn map_dimension<'a>(
    requested: &SemanticDimension,
    spec: &'a PreAggregationSpec,
) -> Result<DimensionMapping<'a>, String> {
    let candidates = spec
        .dimensions
        .iter()
        .filter(|d| d.name == requested.name || normalize(&d.query) == normalize(&requested.query));
    for stored in candidates {
        match (requested.grain, stored.grain) {
            (None, None) => {
                return Ok(DimensionMapping {
                    stored,
                    coarsened: false,
                })
            }
            (Some(req), Some(have)) if req.derivable_from(have) => {
                return Ok(DimensionMapping {
                    stored,
                    coarsened: req != have,
                })
            }
            // Raw values stored; truncate on read
            (Some(_), None) => {
                return Ok(DimensionMapping {
                    stored,
                    coarsened: true,
                })
            }
            _ => continue,
        }
    }
    Err(format!("dimension '{}' is not stored at a compatible grain", requested.name))
}

fn filter_columns(filter: &SemanticFilter) -> Vec<String> {
    match (&filter.query, &filter.column) {
        (Some(query), _) if !query.trim().is_empty() => {
            extract_columns(&blank_placeholders(query, "0"))
        }
        (_, Some(column)) => vec![column.clone()],
        _ => Vec::new(),
    }
}

fn same_filter(a: &SemanticFilter, b: &SemanticFilter) -> bool {
    match (a.referenced_text(), b.referenced_text()) {
        (Some(x), Some(y)) if a.is_structured() == b.is_structured() => {
            normalize(x) == normalize(y) && a.operator == b.operator && a.values == b.values
        }
        _ => false,
    }
}

fn replace_column(text: &str, column: &str, replacement: &str) -> String {
    match Regex::new(&format!(r"\b{}\b", regex::escape(column))) {
        Ok(re) => re.replace_all(text, replacement).into_owned(),
        Err(_) => text.replace(column, replacement),
    }
}

/// Rewrite a request filter over rollup columns.
///
/// Only grain-less rollup dimensions qualify: filtering truncated values is
/// not equivalent to filtering the raw column.
fn rewrite_filter(
    filter: &SemanticFilter,
    spec: &PreAggregationSpec,
    quote: &dyn Fn(&str) -> String,
) -> Result<SemanticFilter, String> {
    let mut rewritten = filter.clone();
    for column in filter_columns(filter) {
        let stored = spec
            .dimensions
            .iter()
            .find(|d| d.grain.is_none() && normalize(&d.query) == normalize(&column))
            .ok_or_else(|| {
                format!("filter '{}' reads '{}', which the rollup does not store", filter.name, column)
            })?;
        let target = quote(&stored.name);
        if let Some(query) = &rewritten.query {
            rewritten.query = Some(replace_column(query, &column, &target));
        } else {
            rewritten.column = Some(target);
        }
    }
    Ok(rewritten)
}

/// Build the metric that reads `spec` in place of the source tables
fn rewrite_metric(
    metric: &SemanticMetric,
    spec: &PreAggregationSpec,
    quote: &dyn Fn(&str) -> String,
) -> Result<(SemanticMetric, bool), String> {
    if !metric.grouped {
        return Err("ungrouped metrics read raw rows".to_string());
    }
    // Raw source columns do not exist in the rollup table
    if let Some(column) = metric.order.iter().find_map(|item| match item.target() {
        Some(OrderTarget::Column(column)) => Some(column),
        _ => None,
    }) {
        return Err(format!("request orders by raw column '{}'", column));
    }

    let mappings = metric
        .dimensions
        .iter()
        .map(|d| map_dimension(d, spec))
        .collect::<Result<Vec<_>, _>>()?;

    let unused_dimension = spec
        .dimensions
        .iter()
        .any(|stored| !mappings.iter().any(|m| std::ptr::eq(m.stored, stored)));
    let reaggregated = unused_dimension || mappings.iter().any(|m| m.coarsened);

    if let Some(partition) = &spec.partition {
        for (requested, mapping) in metric.dimensions.iter().zip(&mappings) {
            if mapping.stored.name != partition.dimension {
                continue;
            }
            let grain = requested.grain.unwrap_or(partition.grain);
            if !grain.derivable_from(partition.grain) {
                return Err(format!(
                    "requested grain {} is finer than partition grain {}",
                    grain, partition.grain
                ));
            }
        }
    }

    let mut measures = Vec::with_capacity(metric.measures.len());
    for measure in &metric.measures {
        let stored = spec
            .measure(&measure.name)
            .filter(|m| m.measure_type == measure.measure_type)
            .ok_or_else(|| format!("measure '{}' ({}) is not stored", measure.name, measure.measure_type))?;
        let measure_type = match stored.measure_type {
            MeasureType::Sum | MeasureType::Count => MeasureType::Sum,
            MeasureType::Min => MeasureType::Min,
            MeasureType::Max => MeasureType::Max,
            MeasureType::Avg | MeasureType::CountDistinct if reaggregated => {
                return Err(format!(
                    "measure '{}' ({}) cannot be re-aggregated",
                    measure.name, stored.measure_type
                ));
            }
            // One rollup row per output group: any aggregate returns it unchanged
            MeasureType::Avg | MeasureType::CountDistinct => MeasureType::Max,
        };
        measures.push(SemanticMeasure {
            name: measure.name.clone(),
            measure_type,
            query: quote(&stored.name),
            formatting: measure.formatting.clone(),
            description: measure.description.clone(),
        });
    }

    let dimensions = metric
        .dimensions
        .iter()
        .zip(&mappings)
        .map(|(requested, mapping)| SemanticDimension {
            name: requested.name.clone(),
            query: quote(&mapping.stored.name),
            dimension_type: requested.dimension_type,
            grain: if mapping.coarsened { requested.grain } else { None },
            formatting: requested.formatting.clone(),
        })
        .collect();

    for built in &spec.filters {
        if !metric.filters.iter().any(|f| same_filter(f, built)) {
            return Err(format!("rollup filter '{}' is not part of the request", built.name));
        }
    }
    let mut filters = Vec::new();
    for filter in &metric.filters {
        if spec.filters.iter().any(|built| same_filter(filter, built)) {
            continue;
        }
        filters.push(rewrite_filter(filter, spec, quote)?);
    }

    let mut rewritten = metric.clone();
    rewritten.table_name = Some(spec.table_name.clone());
    rewritten.query = None;
    rewritten.joins = Vec::new();
    rewritten.measures = measures;
    rewritten.dimensions = dimensions;
    rewritten.filters = filters;
    Ok((rewritten, reaggregated))
}

/// Find a completed rollup that can answer `metric` and rewrite the query for it.
///
/// Candidates are tried smallest first (fewest stored dimensions, then id).
/// Incompatibility is a routing decision, logged at debug level.
pub fn route(
    metric: &SemanticMetric,
    params: &ParameterValues,
    specs: &[PreAggregationSpec],
    dialect: Dialect,
) -> Option<RollupRewrite> {
    let generator = SqlGenerator::new(dialect);
    let mut candidates: Vec<&PreAggregationSpec> = specs
        .iter()
        .filter(|s| s.metric_id == metric.id && s.is_queryable())
        .collect();
    candidates.sort_by(|a, b| {
        (a.dimensions.len(), &a.id).cmp(&(b.dimensions.len(), &b.id))
    });

    let quote = |ident: &str| generator.dialect().quote_ident(ident);
    for spec in candidates {
        if metric
            .table_name
            .as_deref()
            .is_some_and(|t| same_table(t, &spec.table_name))
        {
            continue;
        }
        let (rewritten, reaggregated) = match rewrite_metric(metric, spec, &quote) {
            Ok(r) => r,
            Err(reason) => {
                log::debug!("Rollup '{}' skipped for '{}': {}", spec.id, metric.id, reason);
                continue;
            }
        };
        match generator.generate(&rewritten, params, &CancelToken::new()) {
            Ok(statement) => {
                log::debug!(
                    "Routing '{}' to rollup '{}' ({})",
                    metric.id,
                    spec.id,
                    spec.table_name
                );
                return Some(RollupRewrite {
                    spec_id: spec.id.clone(),
                    table_name: spec.table_name.clone(),
                    reaggregated,
                    statement,
                });
            }
            Err(e) => log::debug!("Rollup '{}' rewrite failed for '{}': {}", spec.id, metric.id, e),
        }
    }
    log::debug!("No rollup serves '{}'", metric.id);
    None
}

#[cfg(test)]
#[path = "preagg_test.rs"]
mod tests;

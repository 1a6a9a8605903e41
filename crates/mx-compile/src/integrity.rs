//! Referential integrity checks
//!
//! Variant-level checks run before a variant's overrides are applied.
//! [`validate_resolved`] runs on the final materialized metric.

use crate::error::{CompileError, CompileResult};
use crate::variant::CompileOptions;
use mx_core::sql_utils::{same_table, table_base_name};
use mx_core::{closest_name, ComponentCategory, MetricVariant, SemanticMetric};
use mx_sql::extract_column_references;

/// A variant may pin the environment and data model of its source
pub fn check_compatibility(source: &SemanticMetric, variant: &MetricVariant) -> CompileResult<()> {
    let pinned = [
        (
            "environment_id",
            variant.environment_id.as_ref().map(|v| v.to_string()),
            source.environment_id.as_ref().map(|v| v.to_string()),
        ),
        (
            "data_model_id",
            variant.data_model_id.as_ref().map(|v| v.to_string()),
            source.data_model_id.as_ref().map(|v| v.to_string()),
        ),
    ];
    for (field, variant_value, source_value) in pinned {
        if let Some(variant_value) = variant_value {
            if source_value.as_deref() != Some(variant_value.as_str()) {
                return Err(CompileError::IncompatibleSource {
                    variant: variant.id.to_string(),
                    source_id: variant.source_metric_id.to_string(),
                    field: field.to_string(),
                    variant_value,
                    source_value,
                });
            }
        }
    }
    Ok(())
}

/// Names in `inclusion`, `overrides.exclude`, and `overrides.replace` must
/// exist on the source
pub fn check_variant_names(
    source: &SemanticMetric,
    variant: &MetricVariant,
    threshold: f64,
) -> CompileResult<()> {
    for category in ComponentCategory::ALL {
        let existing = source.component_names(category);

        let included = variant
            .inclusion
            .as_ref()
            .and_then(|sel| sel.get(category))
            .unwrap_or_default();
        let sections: [(&str, Vec<&str>); 3] = [
            ("inclusion", included.iter().map(String::as_str).collect()),
            (
                "overrides.exclude",
                variant
                    .overrides
                    .exclude
                    .get(category)
                    .iter()
                    .map(String::as_str)
                    .collect(),
            ),
            ("overrides.replace", variant.overrides.replace.names(category)),
        ];

        for (section, names) in sections {
            for name in names {
                if !existing.contains(&name) {
                    return Err(CompileError::not_found(
                        category,
                        name,
                        format!("variant '{}' {}", variant.id, section),
                        closest_name(name, existing.iter().copied(), threshold),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Integrity of a materialized metric: join attachment, derived measure
/// references, and (in strict mode) table-qualified column references.
pub fn validate_resolved(metric: &SemanticMetric, options: &CompileOptions) -> CompileResult<()> {
    let context = format!("metric '{}'", metric.id);
    check_join_attachment(metric, &context, options.suggestion_threshold)?;
    check_derivations(metric, &context, options.suggestion_threshold)?;
    if options.strict_references {
        check_table_references(metric, &context)?;
    }
    Ok(())
}

/// Each join must touch a table already reachable from the base relation
pub fn check_join_attachment(
    metric: &SemanticMetric,
    context: &str,
    threshold: f64,
) -> CompileResult<()> {
    let Some(base) = metric.base_relation() else {
        return Ok(());
    };
    let mut reachable: Vec<String> = vec![table_base_name(base).to_ascii_lowercase()];
    for join in &metric.joins {
        let attached = reachable
            .iter()
            .any(|t| same_table(t, &join.left_table) || same_table(t, &join.right_table));
        if !attached {
            let left = table_base_name(&join.left_table).to_ascii_lowercase();
            return Err(CompileError::InvalidJoinDimension {
                category: ComponentCategory::Joins,
                name: join.name.clone(),
                context: context.to_string(),
                message: format!(
                    "neither '{}' nor '{}' is joined to '{}'",
                    join.left_table, join.right_table, base
                ),
                suggestion: closest_name(&left, reachable.iter().map(String::as_str), threshold),
            });
        }
        for table in [&join.left_table, &join.right_table] {
            let name = table_base_name(table).to_ascii_lowercase();
            if !reachable.contains(&name) {
                reachable.push(name);
            }
        }
    }
    Ok(())
}

/// Derived measures must reference existing measures and dimensions
pub fn check_derivations(
    metric: &SemanticMetric,
    context: &str,
    threshold: f64,
) -> CompileResult<()> {
    let measures = metric.component_names(ComponentCategory::Measures);
    let dimensions = metric.component_names(ComponentCategory::Dimensions);
    let hint = |name: &str, candidates: &[&str]| {
        closest_name(name, candidates.iter().copied(), threshold)
            .map(|s| format!(" (did you mean '{}'?)", s))
            .unwrap_or_default()
    };

    for derived in &metric.derived_measures {
        for measure in derived.measure_refs() {
            if !measures.contains(&measure) {
                return Err(CompileError::MeasureNotFound {
                    name: measure.to_string(),
                    context: format!("derived measure '{}' of {}", derived.name, context),
                    suggestion: closest_name(measure, measures.iter().copied(), threshold),
                });
            }
        }
        match derived.order_dimension() {
            Some(dim) if !dimensions.contains(&dim) => {
                return Err(CompileError::InvalidDerivation {
                    name: derived.name.clone(),
                    message: format!(
                        "order_dimension '{}' is not a dimension{}",
                        dim,
                        hint(dim, &dimensions)
                    ),
                })
            }
            None if derived.requires_order() => {
                return Err(CompileError::InvalidDerivation {
                    name: derived.name.clone(),
                    message: "window derivation requires an order_dimension".to_string(),
                })
            }
            _ => {}
        }
        for dim in derived.partition_by() {
            if !dimensions.contains(&dim.as_str()) {
                return Err(CompileError::InvalidDerivation {
                    name: derived.name.clone(),
                    message: format!(
                        "partition_by '{}' is not a dimension{}",
                        dim,
                        hint(dim, &dimensions)
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Component expressions of the categories that carry SQL, with their names
pub fn expression_texts(metric: &SemanticMetric) -> Vec<(ComponentCategory, &str, &str)> {
    let mut texts = Vec::new();
    for m in &metric.measures {
        texts.push((ComponentCategory::Measures, m.name.as_str(), m.query.as_str()));
    }
    for d in &metric.dimensions {
        texts.push((ComponentCategory::Dimensions, d.name.as_str(), d.query.as_str()));
    }
    for f in &metric.filters {
        if let Some(text) = f.referenced_text() {
            texts.push((ComponentCategory::Filters, f.name.as_str(), text));
        }
    }
    texts
}

/// Every `table.column` qualifier must name the base table or a joined table
pub fn check_table_references(metric: &SemanticMetric, context: &str) -> CompileResult<()> {
    let tables = metric.effective_tables();
    for (category, name, text) in expression_texts(metric) {
        for reference in extract_column_references(text) {
            if !tables.contains(&reference.table.to_ascii_lowercase()) {
                return Err(CompileError::InvalidJoinDimension {
                    category,
                    name: name.to_string(),
                    context: context.to_string(),
                    message: format!(
                        "references '{}' but table '{}' is not joined",
                        reference, reference.table
                    ),
                    suggestion: None,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "integrity_test.rs"]
mod tests;

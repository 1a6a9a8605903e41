//! Variant override stages
//!
//! Each stage is a plain transform over the metric's per-category component
//! lists, applied in a fixed order: inclusion, exclusion, replacement,
//! addition, then scalar overrides.

use crate::error::{CompileError, CompileResult};
use crate::integrity::{check_compatibility, check_variant_names};
use crate::variant::CompileOptions;
use mx_core::{
    closest_name, ComponentCategory, ComponentDefinitions, ComponentNameLists,
    ComponentSelection, MetricVariant, Named, SemanticMetric, VariantOverrides,
};

/// Apply one variant on top of an already materialized source metric
pub fn apply_variant(
    source: SemanticMetric,
    variant: &MetricVariant,
    options: &CompileOptions,
) -> CompileResult<SemanticMetric> {
    check_compatibility(&source, variant)?;
    check_variant_names(&source, variant, options.suggestion_threshold)?;

    let mut metric = source;
    if let Some(selection) = &variant.inclusion {
        apply_inclusion(&mut metric, selection);
    }
    apply_exclusion(&mut metric, &variant.overrides.exclude);
    apply_replacements(
        &mut metric,
        &variant.overrides.replace,
        &format!("variant '{}' overrides.replace", variant.id),
        options.suggestion_threshold,
    )?;
    apply_additions(&mut metric, &variant.overrides.add, variant.id.as_str())?;
    apply_scalars(&mut metric, &variant.overrides);

    metric.id = variant.id.clone();
    metric.name = variant.name.clone();
    if variant.description.is_some() {
        metric.description = variant.description.clone();
    }
    log::debug!("Applied variant '{}' over '{}'", variant.id, variant.source_metric_id);
    Ok(metric)
}

fn retain_listed<T: Named>(items: &mut Vec<T>, keep: Option<&[String]>) {
    if let Some(keep) = keep {
        items.retain(|item| keep.iter().any(|k| k == item.name()));
    }
}

/// Keep only whitelisted components; categories without a list are untouched
pub fn apply_inclusion(metric: &mut SemanticMetric, selection: &ComponentSelection) {
    use ComponentCategory::*;
    retain_listed(&mut metric.measures, selection.get(Measures));
    retain_listed(&mut metric.dimensions, selection.get(Dimensions));
    retain_listed(&mut metric.filters, selection.get(Filters));
    retain_listed(&mut metric.joins, selection.get(Joins));
    retain_listed(&mut metric.parameters, selection.get(Parameters));
    retain_listed(&mut metric.derived_measures, selection.get(DerivedMeasures));
}

fn remove_listed<T: Named>(items: &mut Vec<T>, drop: &[String]) {
    items.retain(|item| !drop.iter().any(|d| d == item.name()));
}

/// Remove components by name
pub fn apply_exclusion(metric: &mut SemanticMetric, exclude: &ComponentNameLists) {
    use ComponentCategory::*;
    remove_listed(&mut metric.measures, exclude.get(Measures));
    remove_listed(&mut metric.dimensions, exclude.get(Dimensions));
    remove_listed(&mut metric.filters, exclude.get(Filters));
    remove_listed(&mut metric.joins, exclude.get(Joins));
    remove_listed(&mut metric.parameters, exclude.get(Parameters));
    remove_listed(&mut metric.derived_measures, exclude.get(DerivedMeasures));
}

fn replace_in<T: Named + Clone>(
    items: &mut [T],
    replacements: &[T],
    category: ComponentCategory,
    context: &str,
    threshold: f64,
) -> CompileResult<()> {
    for replacement in replacements {
        match items.iter().position(|i| i.name() == replacement.name()) {
            Some(pos) => items[pos] = replacement.clone(),
            None => {
                return Err(CompileError::not_found(
                    category,
                    replacement.name(),
                    context.to_string(),
                    closest_name(replacement.name(), items.iter().map(Named::name), threshold),
                ))
            }
        }
    }
    Ok(())
}

/// Substitute components in place, keeping their position
pub fn apply_replacements(
    metric: &mut SemanticMetric,
    replace: &ComponentDefinitions,
    context: &str,
    threshold: f64,
) -> CompileResult<()> {
    use ComponentCategory::*;
    replace_in(&mut metric.measures, &replace.measures, Measures, context, threshold)?;
    replace_in(&mut metric.dimensions, &replace.dimensions, Dimensions, context, threshold)?;
    replace_in(&mut metric.filters, &replace.filters, Filters, context, threshold)?;
    replace_in(&mut metric.joins, &replace.joins, Joins, context, threshold)?;
    replace_in(&mut metric.parameters, &replace.parameters, Parameters, context, threshold)?;
    replace_in(
        &mut metric.derived_measures,
        &replace.derived_measures,
        DerivedMeasures,
        context,
        threshold,
    )
}

fn add_to<T: Named + Clone>(
    items: &mut Vec<T>,
    additions: &[T],
    category: ComponentCategory,
    variant_id: &str,
) -> CompileResult<()> {
    for addition in additions {
        if items.iter().any(|i| i.name() == addition.name()) {
            return Err(CompileError::InvalidDerivation {
                name: addition.name().to_string(),
                message: format!(
                    "variant '{}' adds {} '{}' which already exists; use overrides.replace",
                    variant_id,
                    category.singular(),
                    addition.name()
                ),
            });
        }
        items.push(addition.clone());
    }
    Ok(())
}

/// Append components; a name collision is an error
pub fn apply_additions(
    metric: &mut SemanticMetric,
    add: &ComponentDefinitions,
    variant_id: &str,
) -> CompileResult<()> {
    use ComponentCategory::*;
    add_to(&mut metric.measures, &add.measures, Measures, variant_id)?;
    add_to(&mut metric.dimensions, &add.dimensions, Dimensions, variant_id)?;
    add_to(&mut metric.filters, &add.filters, Filters, variant_id)?;
    add_to(&mut metric.joins, &add.joins, Joins, variant_id)?;
    add_to(&mut metric.parameters, &add.parameters, Parameters, variant_id)?;
    add_to(&mut metric.derived_measures, &add.derived_measures, DerivedMeasures, variant_id)
}

/// Scalar overrides (`table_name`, `limit`, `grouped`, `ordered`)
pub fn apply_scalars(metric: &mut SemanticMetric, overrides: &VariantOverrides) {
    if let Some(table) = &overrides.table_name {
        metric.table_name = Some(table.clone());
    }
    if let Some(limit) = overrides.limit {
        metric.limit = Some(limit);
    }
    if let Some(grouped) = overrides.grouped {
        metric.grouped = grouped;
    }
    if let Some(ordered) = overrides.ordered {
        metric.ordered = ordered;
    }
}

//! Automatic fixes proposed by doctor stages
//!
//! A fix edits either a standalone metric or a variant. Fixes found on a
//! variant's materialized metric are written back as variant overrides.

use mx_core::{
    ComponentCategory, DataModelId, DerivedMeasure, EnvironmentId, MetricId, MetricVariant,
    SemanticJoin, SemanticMetric,
};
use serde::Serialize;

/// Source field a variant may pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinnedField {
    /// `environment_id`
    EnvironmentId,
    /// `data_model_id`
    DataModelId,
}

impl PinnedField {
    /// Parse the field name carried by a compatibility error
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "environment_id" => Some(PinnedField::EnvironmentId),
            "data_model_id" => Some(PinnedField::DataModelId),
            _ => None,
        }
    }
}

/// A single automatic fix
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "fix", rename_all = "snake_case")]
pub enum Fix {
    /// Bind the metric to a base table
    SetTableName { table_name: String },
    /// Rebind the metric to a data model
    SetDataModel { data_model_id: String },
    /// Point a derived measure at an existing measure
    RenameMeasureRef {
        derived: String,
        from: String,
        to: String,
    },
    /// Give a window derivation its ordering dimension
    SetOrderDimension { derived: String, dimension: String },
    /// Replace a derivation's partition list
    SetPartitionBy {
        derived: String,
        partition_by: Vec<String>,
    },
    /// Declare joins the expressions need
    AddJoins { joins: Vec<SemanticJoin> },
    /// Point a variant at an existing source
    SetVariantSource { source_metric_id: String },
    /// Align (or clear) a variant's environment or data model pin
    SetVariantPin {
        field: PinnedField,
        value: Option<String>,
    },
    /// Rename a component referenced by a variant's inclusion or overrides
    RenameVariantReference {
        category: ComponentCategory,
        from: String,
        to: String,
    },
}

fn derived_mut<'a>(items: &'a mut [DerivedMeasure], name: &str) -> Option<&'a mut DerivedMeasure> {
    items.iter_mut().find(|d| d.name == name)
}

fn edit_derived(derived: &mut DerivedMeasure, fix: &Fix) {
    match fix {
        Fix::RenameMeasureRef { from, to, .. } => derived.rename_measure_ref(from, to),
        Fix::SetOrderDimension { dimension, .. } => derived.set_order_dimension(dimension),
        Fix::SetPartitionBy { partition_by, .. } => derived.set_partition_by(partition_by.clone()),
        _ => {}
    }
}

fn rename_in(names: &mut [String], from: &str, to: &str) -> bool {
    let mut changed = false;
    for name in names.iter_mut().filter(|n| n.as_str() == from) {
        *name = to.to_string();
        changed = true;
    }
    changed
}

impl Fix {
    /// Derived measure the fix edits, if any
    fn derived_target(&self) -> Option<&str> {
        match self {
            Fix::RenameMeasureRef { derived, .. }
            | Fix::SetOrderDimension { derived, .. }
            | Fix::SetPartitionBy { derived, .. } => Some(derived),
            _ => None,
        }
    }

    /// One-line description for the diagnosis output
    pub fn describe(&self) -> String {
        match self {
            Fix::SetTableName { table_name } => format!("Set table_name to '{}'", table_name),
            Fix::SetDataModel { data_model_id } => {
                format!("Bind the metric to data model '{}'", data_model_id)
            }
            Fix::RenameMeasureRef { derived, from, to } => format!(
                "Derived measure '{}': reference measure '{}' instead of '{}'",
                derived, to, from
            ),
            Fix::SetOrderDimension { derived, dimension } => format!(
                "Derived measure '{}': order by dimension '{}'",
                derived, dimension
            ),
            Fix::SetPartitionBy {
                derived,
                partition_by,
            } => {
                if partition_by.is_empty() {
                    format!("Derived measure '{}': remove partition_by", derived)
                } else {
                    format!(
                        "Derived measure '{}': partition by [{}]",
                        derived,
                        partition_by.join(", ")
                    )
                }
            }
            Fix::AddJoins { joins } => format!(
                "Add join(s): {}",
                joins
                    .iter()
                    .map(|j| j.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Fix::SetVariantSource { source_metric_id } => {
                format!("Set source_metric_id to '{}'", source_metric_id)
            }
            Fix::SetVariantPin { field, value } => {
                let field = match field {
                    PinnedField::EnvironmentId => "environment_id",
                    PinnedField::DataModelId => "data_model_id",
                };
                match value {
                    Some(v) => format!("Set {} to '{}' to match the source", field, v),
                    None => format!("Remove {} (the source does not set it)", field),
                }
            }
            Fix::RenameVariantReference { category, from, to } => format!(
                "Rename {} '{}' to '{}' in the variant",
                category.singular(),
                from,
                to
            ),
        }
    }

    /// Apply to a standalone metric; `false` when the fix does not apply
    pub fn apply_to_metric(&self, metric: &mut SemanticMetric) -> bool {
        match self {
            Fix::SetTableName { table_name } => {
                metric.table_name = Some(table_name.clone());
                true
            }
            Fix::SetDataModel { data_model_id } => {
                metric.data_model_id = Some(DataModelId::new(data_model_id.as_str()));
                true
            }
            Fix::RenameMeasureRef { derived, .. }
            | Fix::SetOrderDimension { derived, .. }
            | Fix::SetPartitionBy { derived, .. } => {
                match derived_mut(&mut metric.derived_measures, derived) {
                    Some(target) => {
                        edit_derived(target, self);
                        true
                    }
                    None => false,
                }
            }
            Fix::AddJoins { joins } => {
                let mut added = false;
                for join in joins {
                    if !metric.joins.iter().any(|j| j.name == join.name) {
                        metric.joins.push(join.clone());
                        added = true;
                    }
                }
                added
            }
            Fix::SetVariantSource { .. }
            | Fix::SetVariantPin { .. }
            | Fix::RenameVariantReference { .. } => false,
        }
    }

    /// Apply to a variant whose materialized form is `resolved` (unknown
    /// when the variant does not compile); `false` when the fix cannot be
    /// expressed as a variant edit
    pub fn apply_to_variant(
        &self,
        variant: &mut MetricVariant,
        resolved: Option<&SemanticMetric>,
    ) -> bool {
        match self {
            Fix::SetTableName { table_name } => {
                variant.overrides.table_name = Some(table_name.clone());
                true
            }
            // the data model belongs to the root metric
            Fix::SetDataModel { .. } => false,
            Fix::RenameMeasureRef { .. } | Fix::SetOrderDimension { .. } | Fix::SetPartitionBy { .. } => {
                let Some(name) = self.derived_target() else {
                    return false;
                };
                if let Some(target) = derived_mut(&mut variant.overrides.add.derived_measures, name) {
                    edit_derived(target, self);
                    return true;
                }
                if let Some(target) = derived_mut(&mut variant.overrides.replace.derived_measures, name) {
                    edit_derived(target, self);
                    return true;
                }
                let Some(inherited) =
                    resolved.and_then(|r| r.derived_measures.iter().find(|d| d.name == name))
                else {
                    return false;
                };
                let mut replacement = inherited.clone();
                edit_derived(&mut replacement, self);
                variant.overrides.replace.derived_measures.push(replacement);
                true
            }
            Fix::AddJoins { joins } => {
                let mut added = false;
                for join in joins {
                    let known = resolved.is_some_and(|r| r.joins.iter().any(|j| j.name == join.name))
                        || variant.overrides.add.joins.iter().any(|j| j.name == join.name);
                    if !known {
                        variant.overrides.add.joins.push(join.clone());
                        added = true;
                    }
                }
                added
            }
            Fix::SetVariantSource { source_metric_id } => {
                variant.source_metric_id = MetricId::new(source_metric_id.as_str());
                true
            }
            Fix::SetVariantPin { field, value } => {
                match field {
                    PinnedField::EnvironmentId => {
                        variant.environment_id = value.as_deref().map(EnvironmentId::new)
                    }
                    PinnedField::DataModelId => {
                        variant.data_model_id = value.as_deref().map(DataModelId::new)
                    }
                }
                true
            }
            Fix::RenameVariantReference { category, from, to } => {
                let mut changed = false;
                if let Some(list) = variant.inclusion.as_mut().and_then(|s| s.get_mut(*category)) {
                    changed |= rename_in(list, from, to);
                }
                changed |= rename_in(variant.overrides.exclude.get_mut(*category), from, to);
                changed |= rename_replaced(&mut variant.overrides.replace, *category, from, to);
                changed
            }
        }
    }
}

fn rename_replaced(
    defs: &mut mx_core::ComponentDefinitions,
    category: ComponentCategory,
    from: &str,
    to: &str,
) -> bool {
    fn rename<T>(items: &mut [T], name: impl Fn(&mut T) -> &mut String, from: &str, to: &str) -> bool {
        let mut changed = false;
        for item in items.iter_mut() {
            let slot = name(item);
            if slot.as_str() == from {
                *slot = to.to_string();
                changed = true;
            }
        }
        changed
    }
    match category {
        ComponentCategory::Measures => rename(&mut defs.measures, |m| &mut m.name, from, to),
        ComponentCategory::Dimensions => rename(&mut defs.dimensions, |d| &mut d.name, from, to),
        ComponentCategory::Filters => rename(&mut defs.filters, |f| &mut f.name, from, to),
        ComponentCategory::Joins => rename(&mut defs.joins, |j| &mut j.name, from, to),
        ComponentCategory::Parameters => rename(&mut defs.parameters, |p| &mut p.name, from, to),
        ComponentCategory::DerivedMeasures => {
            rename(&mut defs.derived_measures, |d| &mut d.name, from, to)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const METRIC: &str = r#"
id: sales
name: Sales
table_name: orders
measures:
  - name: revenue
    type: sum
    query: orders.amount
  - name: cost
    type: sum
    query: orders.cost
dimensions:
  - name: month
    type: time
    query: orders.created_at
    grain: month
derived_measures:
  - name: margin
    type: ratio
    numerator: revenu
    denominator: cost
"#;

    fn metric() -> SemanticMetric {
        SemanticMetric::from_yaml(METRIC, Path::new("m.yml")).unwrap()
    }

    #[test]
    fn test_rename_on_metric() {
        let mut m = metric();
        let fix = Fix::RenameMeasureRef {
            derived: "margin".into(),
            from: "revenu".into(),
            to: "revenue".into(),
        };
        assert!(fix.apply_to_metric(&mut m));
        assert_eq!(m.derived_measures[0].measure_refs(), vec!["revenue", "cost"]);
    }

    #[test]
    fn test_inherited_derived_fix_becomes_replace_override() {
        let resolved = metric();
        let mut variant = MetricVariant::new("sales_v", "sales");
        let fix = Fix::RenameMeasureRef {
            derived: "margin".into(),
            from: "revenu".into(),
            to: "revenue".into(),
        };
        assert!(fix.apply_to_variant(&mut variant, Some(&resolved)));
        let replaced = &variant.overrides.replace.derived_measures;
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].measure_refs(), vec!["revenue", "cost"]);

        // a second fix on the same derivation edits the replacement in place
        let fix = Fix::RenameMeasureRef {
            derived: "margin".into(),
            from: "cost".into(),
            to: "revenue".into(),
        };
        assert!(fix.apply_to_variant(&mut variant, Some(&resolved)));
        assert_eq!(variant.overrides.replace.derived_measures.len(), 1);
    }

    #[test]
    fn test_added_derived_is_edited_in_place() {
        let mut resolved = metric();
        resolved.derived_measures.clear();
        let mut variant = MetricVariant::new("v", "sales");
        variant.overrides.add.derived_measures = metric().derived_measures;
        let fix = Fix::SetPartitionBy {
            derived: "margin".into(),
            partition_by: vec![],
        };
        assert!(fix.apply_to_variant(&mut variant, Some(&resolved)));
        assert!(variant.overrides.replace.derived_measures.is_empty());
    }

    #[test]
    fn test_variant_only_fixes() {
        let mut m = metric();
        let fix = Fix::SetVariantSource {
            source_metric_id: "sales".into(),
        };
        assert!(!fix.apply_to_metric(&mut m));
        assert!(!Fix::SetDataModel {
            data_model_id: "dm".into()
        }
        .apply_to_variant(&mut MetricVariant::new("v", "s"), Some(&m)));

        let mut variant = MetricVariant::new("v", "sale");
        variant.overrides.exclude.measures = vec!["revenu".into()];
        let rename = Fix::RenameVariantReference {
            category: ComponentCategory::Measures,
            from: "revenu".into(),
            to: "revenue".into(),
        };
        assert!(rename.apply_to_variant(&mut variant, Some(&m)));
        assert_eq!(variant.overrides.exclude.measures, vec!["revenue"]);
        assert!(fix.apply_to_variant(&mut variant, Some(&m)));
        assert_eq!(variant.source_metric_id, "sales");

        let pin = Fix::SetVariantPin {
            field: PinnedField::DataModelId,
            value: None,
        };
        variant.data_model_id = Some(DataModelId::new("dm_old"));
        assert!(pin.apply_to_variant(&mut variant, Some(&m)));
        assert!(variant.data_model_id.is_none());
    }

    #[test]
    fn test_describe_is_json_tagged() {
        let fix = Fix::SetTableName {
            table_name: "orders".into(),
        };
        let json = serde_json::to_value(&fix).unwrap();
        assert_eq!(json["fix"], "set_table_name");
        assert_eq!(fix.describe(), "Set table_name to 'orders'");
    }
}

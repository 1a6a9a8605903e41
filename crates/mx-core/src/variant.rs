//! Metric variants: a metric defined as a delta over another metric or variant

use crate::component::{ComponentDefinitions, ComponentNameLists, ComponentSelection};
use crate::error::{CoreError, CoreResult};
use crate::ids::{DataModelId, EnvironmentId, MetricId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Delta applied on top of the source metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantOverrides {
    /// Components removed by name
    #[serde(default, skip_serializing_if = "ComponentNameLists::is_empty")]
    pub exclude: ComponentNameLists,
    /// Components appended
    #[serde(default, skip_serializing_if = "ComponentDefinitions::is_empty")]
    pub add: ComponentDefinitions,
    /// Components substituted in place (matched by name)
    #[serde(default, skip_serializing_if = "ComponentDefinitions::is_empty")]
    pub replace: ComponentDefinitions,
    /// Base table override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Row limit override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// GROUP BY toggle override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouped: Option<bool>,
    /// ORDER BY toggle override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,
}

/// A metric variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricVariant {
    /// Unique id (shared namespace with metrics)
    pub id: MetricId,
    /// Display name
    pub name: String,
    /// Metric or variant this variant derives from (lookup only)
    pub source_metric_id: MetricId,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Environment the variant expects its source to live in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<EnvironmentId>,
    /// Data model the variant expects its source to be bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_model_id: Option<DataModelId>,
    /// Whitelist applied before overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion: Option<ComponentSelection>,
    /// Overrides applied after inclusion
    #[serde(default)]
    pub overrides: VariantOverrides,
}

impl MetricVariant {
    /// Variant with no inclusion and no overrides
    pub fn new(id: &str, source_metric_id: &str) -> Self {
        Self {
            id: MetricId::new(id),
            name: id.to_string(),
            source_metric_id: MetricId::new(source_metric_id),
            description: None,
            environment_id: None,
            data_model_id: None,
            inclusion: None,
            overrides: VariantOverrides::default(),
        }
    }

    /// Parse a variant from YAML (or JSON) content
    pub fn from_yaml(content: &str, path: &Path) -> CoreResult<Self> {
        let variant: MetricVariant =
            serde_yaml::from_str(content).map_err(|e| CoreError::DefinitionInvalid {
                kind: "variant".to_string(),
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if variant.id == variant.source_metric_id {
            return Err(CoreError::DefinitionInvalid {
                kind: "variant".to_string(),
                path: path.display().to_string(),
                message: format!("variant '{}' names itself as its source", variant.id),
            });
        }
        Ok(variant)
    }

    /// Parse a variant from a JSON document
    pub fn from_json(content: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentCategory;

    #[test]
    fn test_parse_variant() {
        let yaml = r#"
id: sales_emea
name: Sales EMEA
source_metric_id: sales
inclusion:
  measures: [revenue, orders]
overrides:
  exclude:
    dimensions: [region]
  add:
    measures:
      - name: avg_amount
        type: avg
        query: amount
  replace:
    filters:
      - name: region
        query: orders.region = 'EMEA'
  limit: 10
  ordered: true
"#;
        let variant = MetricVariant::from_yaml(yaml, Path::new("v.yml")).unwrap();
        assert_eq!(variant.source_metric_id, "sales");
        assert_eq!(
            variant
                .inclusion
                .as_ref()
                .and_then(|i| i.get(ComponentCategory::Measures))
                .map(|m| m.len()),
            Some(2)
        );
        assert_eq!(variant.overrides.exclude.dimensions, vec!["region"]);
        assert_eq!(variant.overrides.add.measures[0].name, "avg_amount");
        assert_eq!(variant.overrides.replace.filters.len(), 1);
        assert_eq!(variant.overrides.limit, Some(10));
        assert_eq!(variant.overrides.grouped, None);
        assert_eq!(variant.overrides.ordered, Some(true));
    }

    #[test]
    fn test_self_reference_rejected_at_load() {
        let yaml = "id: loop\nname: Loop\nsource_metric_id: loop\n";
        assert!(MetricVariant::from_yaml(yaml, Path::new("v.yml")).is_err());
    }

    #[test]
    fn test_round_trips_through_json() {
        let variant = MetricVariant::new("v", "m");
        let json = serde_json::to_string(&variant).unwrap();
        assert_eq!(MetricVariant::from_json(&json).unwrap(), variant);
    }
}

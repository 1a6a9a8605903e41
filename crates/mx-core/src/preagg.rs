//! Pre-aggregation (rollup) specifications and their build lifecycle

use crate::error::{CoreError, CoreResult};
use crate::ids::MetricId;
use crate::metric::{MeasureType, SemanticFilter, TimeGrain};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A dimension column stored in a rollup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupDimension {
    /// Column name in the rollup table (matches the metric's dimension name)
    pub name: String,
    /// Source expression the column was built from
    pub query: String,
    /// Stored truncation grain for time dimensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grain: Option<TimeGrain>,
}

/// A measure column stored in a rollup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupMeasure {
    /// Column name in the rollup table (matches the metric's measure name)
    pub name: String,
    /// Aggregation the column holds
    #[serde(rename = "type")]
    pub measure_type: MeasureType,
}

/// Time partitioning of a rollup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Rollup dimension the table is partitioned by
    pub dimension: String,
    /// Partition grain
    pub grain: TimeGrain,
}

/// When a rollup is rebuilt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Only on explicit request
    #[default]
    Manual,
    /// Every `every_secs` seconds
    Interval {
        /// Refresh period in seconds
        every_secs: u64,
    },
    /// On a cron schedule
    Cron {
        /// Cron expression
        expression: String,
    },
}

/// Physical storage of a rollup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Physical table
    #[default]
    Table,
    /// Materialized view maintained by the database
    MaterializedView,
    /// Table maintained outside Metrix
    External,
}

/// How a rollup is (re)built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// Rebuild everything
    #[default]
    Full,
    /// Rebuild only recent partitions
    Incremental,
}

/// Build status of a rollup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreAggregationStatus {
    /// Defined, never built
    #[default]
    Pending,
    /// Build in progress
    Building,
    /// Built and queryable
    Completed,
    /// Last build failed
    Failed,
}

impl PreAggregationStatus {
    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: PreAggregationStatus) -> bool {
        use PreAggregationStatus::*;
        matches!(
            (self, next),
            (Pending, Building)
                | (Building, Completed)
                | (Building, Failed)
                | (Completed, Building)
                | (Failed, Building)
        )
    }
}

impl std::fmt::Display for PreAggregationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PreAggregationStatus::Pending => "pending",
            PreAggregationStatus::Building => "building",
            PreAggregationStatus::Completed => "completed",
            PreAggregationStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn new_spec_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A rollup definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreAggregationSpec {
    /// Spec id (generated when absent)
    #[serde(default = "new_spec_id")]
    pub id: String,
    /// Metric the rollup pre-aggregates
    pub metric_id: MetricId,
    /// Physical table or view holding the rollup
    pub table_name: String,
    /// Stored dimension columns
    #[serde(default)]
    pub dimensions: Vec<RollupDimension>,
    /// Stored measure columns
    #[serde(default)]
    pub measures: Vec<RollupMeasure>,
    /// Filters applied when the rollup was built
    #[serde(default)]
    pub filters: Vec<SemanticFilter>,
    /// Time partitioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<PartitionSpec>,
    /// Refresh schedule
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
    /// Storage mode
    #[serde(default)]
    pub storage_mode: StorageMode,
    /// Build strategy
    #[serde(default)]
    pub build_strategy: BuildStrategy,
    /// Current build status
    #[serde(default)]
    pub status: PreAggregationStatus,
    /// When the last successful build finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl PreAggregationSpec {
    /// Parse a spec from YAML (or JSON) content
    pub fn from_yaml(content: &str, path: &Path) -> CoreResult<Self> {
        let spec: PreAggregationSpec =
            serde_yaml::from_str(content).map_err(|e| CoreError::DefinitionInvalid {
                kind: "pre_aggregation".to_string(),
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if let Some(partition) = &spec.partition {
            if spec.dimension(&partition.dimension).is_none() {
                return Err(CoreError::DefinitionInvalid {
                    kind: "pre_aggregation".to_string(),
                    path: path.display().to_string(),
                    message: format!(
                        "partition dimension '{}' is not a rollup dimension",
                        partition.dimension
                    ),
                });
            }
        }
        Ok(spec)
    }

    /// Look up a stored dimension by name
    pub fn dimension(&self, name: &str) -> Option<&RollupDimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Look up a stored measure by name
    pub fn measure(&self, name: &str) -> Option<&RollupMeasure> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// Whether the rollup may serve queries
    pub fn is_queryable(&self) -> bool {
        self.status == PreAggregationStatus::Completed
    }

    /// Move to `next`, stamping `last_refreshed_at` on completion
    pub fn transition(&mut self, next: PreAggregationStatus, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                spec_id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        if next == PreAggregationStatus::Completed {
            self.last_refreshed_at = Some(now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
metric_id: sales
table_name: rollups.sales_daily
dimensions:
  - name: day
    query: orders.created_at
    grain: day
  - name: region
    query: orders.region
measures:
  - name: revenue
    type: sum
partition:
  dimension: day
  grain: day
refresh_policy:
  type: interval
  every_secs: 3600
"#;

    #[test]
    fn test_parse_spec_defaults() {
        let spec = PreAggregationSpec::from_yaml(SPEC, Path::new("p.yml")).unwrap();
        assert!(!spec.id.is_empty());
        assert_eq!(spec.status, PreAggregationStatus::Pending);
        assert_eq!(spec.storage_mode, StorageMode::Table);
        assert_eq!(spec.build_strategy, BuildStrategy::Full);
        assert_eq!(spec.refresh_policy, RefreshPolicy::Interval { every_secs: 3600 });
        assert_eq!(spec.dimension("day").and_then(|d| d.grain), Some(TimeGrain::Day));
        assert!(spec.measure("revenue").is_some());
        assert!(!spec.is_queryable());
    }

    #[test]
    fn test_partition_must_name_dimension() {
        let bad = SPEC.replace("dimension: day", "dimension: hour");
        assert!(PreAggregationSpec::from_yaml(&bad, Path::new("p.yml")).is_err());
    }

    #[test]
    fn test_status_lifecycle() {
        let mut spec = PreAggregationSpec::from_yaml(SPEC, Path::new("p.yml")).unwrap();
        let now = Utc::now();

        assert!(spec.transition(PreAggregationStatus::Completed, now).is_err());
        spec.transition(PreAggregationStatus::Building, now).unwrap();
        spec.transition(PreAggregationStatus::Completed, now).unwrap();
        assert!(spec.is_queryable());
        assert_eq!(spec.last_refreshed_at, Some(now));

        spec.transition(PreAggregationStatus::Building, now).unwrap();
        spec.transition(PreAggregationStatus::Failed, now).unwrap();
        let err = spec
            .transition(PreAggregationStatus::Pending, now)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));
    }
}

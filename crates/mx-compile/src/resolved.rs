//! The output of compilation

use mx_core::{MetricId, SemanticMetric};
use serde::Serialize;
use std::ops::Deref;

/// A fully materialized metric plus the chain it was resolved through.
///
/// Immutable once built; resolving the same inputs again yields an equal value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMetric {
    metric: SemanticMetric,
    lineage: Vec<MetricId>,
}

impl ResolvedMetric {
    pub(crate) fn new(metric: SemanticMetric, lineage: Vec<MetricId>) -> Self {
        Self { metric, lineage }
    }

    /// The materialized metric
    pub fn metric(&self) -> &SemanticMetric {
        &self.metric
    }

    /// Consume into the materialized metric
    pub fn into_metric(self) -> SemanticMetric {
        self.metric
    }

    /// Ids from the root metric to the requested definition
    pub fn lineage(&self) -> &[MetricId] {
        &self.lineage
    }

    /// Root metric the chain starts from
    pub fn root_id(&self) -> &MetricId {
        self.lineage.first().unwrap_or(&self.metric.id)
    }

    /// Whether at least one variant was applied
    pub fn is_variant(&self) -> bool {
        self.lineage.len() > 1
    }

    /// Number of variants applied
    pub fn depth(&self) -> usize {
        self.lineage.len().saturating_sub(1)
    }

    /// Hash of the materialized definition (cache key input)
    pub fn definition_hash(&self) -> String {
        self.metric.definition_hash()
    }
}

impl Deref for ResolvedMetric {
    type Target = SemanticMetric;

    fn deref(&self) -> &SemanticMetric {
        &self.metric
    }
}

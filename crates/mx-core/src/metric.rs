//! Semantic metric definitions
//!
//! A [`SemanticMetric`] is a declarative bundle of measures, dimensions,
//! filters, joins, and parameters over a logical table. Expressions are
//! user-provided SQL fragments; table-qualified column references
//! (`orders.amount`) tie them to the base table or one of its joins.

use crate::checksum::compute_checksum;
use crate::component::{ComponentCategory, Named};
use crate::error::{CoreError, CoreResult};
use crate::format::OutputFormat;
use crate::ids::{DataModelId, EnvironmentId, MetricId};
use crate::serde_helpers::default_true;
use crate::sql_utils::table_base_name;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Aggregation applied by a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureType {
    /// Sum aggregation
    Sum,
    /// Average aggregation
    Avg,
    /// Count aggregation
    Count,
    /// Count distinct values
    CountDistinct,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl MeasureType {
    /// Whether partial aggregates of this type can be re-aggregated
    /// (a rollup's daily SUM can become a monthly SUM; a daily AVG cannot).
    pub fn is_additive(&self) -> bool {
        matches!(
            self,
            MeasureType::Sum | MeasureType::Count | MeasureType::Min | MeasureType::Max
        )
    }

    /// Aggregate used when re-aggregating a pre-aggregated column
    pub fn rollup_function(&self) -> Option<&'static str> {
        match self {
            MeasureType::Sum | MeasureType::Count => Some("SUM"),
            MeasureType::Min => Some("MIN"),
            MeasureType::Max => Some("MAX"),
            MeasureType::Avg | MeasureType::CountDistinct => None,
        }
    }
}

impl std::fmt::Display for MeasureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MeasureType::Sum => "sum",
            MeasureType::Avg => "avg",
            MeasureType::Count => "count",
            MeasureType::CountDistinct => "count_distinct",
            MeasureType::Min => "min",
            MeasureType::Max => "max",
        };
        f.write_str(s)
    }
}

/// An aggregated value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMeasure {
    /// Measure name (output alias)
    pub name: String,
    /// Aggregation function
    #[serde(rename = "type")]
    pub measure_type: MeasureType,
    /// Expression to aggregate
    pub query: String,
    /// Output formats
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formatting: Vec<OutputFormat>,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Value type of a dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    /// Text values
    #[default]
    String,
    /// Date/timestamp values
    Time,
    /// Numeric values
    Number,
    /// Boolean values
    Boolean,
}

/// Time granularity, ordered from finest to coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGrain {
    /// Hour
    Hour,
    /// Day
    Day,
    /// Week
    Week,
    /// Month
    Month,
    /// Quarter
    Quarter,
    /// Year
    Year,
}

impl TimeGrain {
    /// Lowercase grain keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGrain::Hour => "hour",
            TimeGrain::Day => "day",
            TimeGrain::Week => "week",
            TimeGrain::Month => "month",
            TimeGrain::Quarter => "quarter",
            TimeGrain::Year => "year",
        }
    }

    /// Whether rows at `self` grain can be rolled up from rows at `stored` grain.
    ///
    /// Weeks straddle month/quarter/year boundaries, so a weekly rollup only
    /// serves weekly requests.
    pub fn derivable_from(&self, stored: TimeGrain) -> bool {
        if *self == stored {
            return true;
        }
        if stored == TimeGrain::Week {
            return false;
        }
        if *self == TimeGrain::Week {
            return stored <= TimeGrain::Day;
        }
        *self > stored
    }
}

impl std::fmt::Display for TimeGrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimeGrain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(TimeGrain::Hour),
            "day" => Ok(TimeGrain::Day),
            "week" => Ok(TimeGrain::Week),
            "month" => Ok(TimeGrain::Month),
            "quarter" => Ok(TimeGrain::Quarter),
            "year" => Ok(TimeGrain::Year),
            other => Err(format!("unknown time grain '{}'", other)),
        }
    }
}

/// A grouping attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticDimension {
    /// Dimension name (output alias)
    pub name: String,
    /// Dimension expression
    pub query: String,
    /// Value type
    #[serde(rename = "type", default)]
    pub dimension_type: DimensionType,
    /// Truncation grain for time dimensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grain: Option<TimeGrain>,
    /// Output formats
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formatting: Vec<OutputFormat>,
}

impl SemanticDimension {
    /// Whether this is a time dimension
    pub fn is_time(&self) -> bool {
        self.dimension_type == DimensionType::Time
    }
}

/// Operator of a structured filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    NotIn,
    /// `BETWEEN a AND b`
    Between,
    /// `LIKE`
    Like,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl FilterOperator {
    /// Number of values the operator expects (`None` = one or more)
    pub fn arity(&self) -> Option<usize> {
        match self {
            FilterOperator::IsNull | FilterOperator::IsNotNull => Some(0),
            FilterOperator::Between => Some(2),
            FilterOperator::In | FilterOperator::NotIn => None,
            _ => Some(1),
        }
    }
}

/// A boolean restriction, either free-form or structured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticFilter {
    /// Filter name
    pub name: String,
    /// Free-form boolean SQL expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Column of a structured filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Operator of a structured filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FilterOperator>,
    /// Operand values of a structured filter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

impl SemanticFilter {
    /// Free-form filter
    pub fn expression(name: &str, query: &str) -> Self {
        Self {
            name: name.to_string(),
            query: Some(query.to_string()),
            column: None,
            operator: None,
            values: Vec::new(),
        }
    }

    /// Structured filter
    pub fn structured(name: &str, column: &str, operator: FilterOperator, values: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            query: None,
            column: Some(column.to_string()),
            operator: Some(operator),
            values,
        }
    }

    /// Whether this filter uses the structured operator form
    pub fn is_structured(&self) -> bool {
        self.query.is_none() && self.column.is_some()
    }

    /// Text that references columns (query or structured column)
    pub fn referenced_text(&self) -> Option<&str> {
        self.query.as_deref().or(self.column.as_deref())
    }
}

/// SQL join type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    /// INNER JOIN
    Inner,
    /// LEFT JOIN
    #[default]
    Left,
    /// RIGHT JOIN
    Right,
    /// FULL OUTER JOIN
    Full,
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        };
        f.write_str(s)
    }
}

/// One equality condition of a join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCondition {
    /// Column on the left table
    pub left_column: String,
    /// Column on the right table
    pub right_column: String,
}

/// A join between two tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticJoin {
    /// Join name
    pub name: String,
    /// Join type
    #[serde(default)]
    pub join_type: JoinType,
    /// Table already present in the FROM clause
    pub left_table: String,
    /// Table being joined in
    pub right_table: String,
    /// Equality conditions, conjoined
    #[serde(default)]
    pub conditions: Vec<JoinCondition>,
}

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// ISO-8601 date (or datetime)
    Date,
    /// Integer or decimal
    Number,
    /// Text
    String,
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterType::Date => "date",
            ParameterType::Number => "number",
            ParameterType::String => "string",
        };
        f.write_str(s)
    }
}

/// A `{{name}}` placeholder declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticParameter {
    /// Placeholder name
    pub name: String,
    /// Declared type used for coercion
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    /// Whether a value must be bound when no default exists
    #[serde(default = "default_true")]
    pub required: bool,
    /// Value used when none is bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Computation performed by a derived measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DerivationKind {
    /// numerator / denominator
    Ratio {
        /// Measure name of the numerator
        numerator: String,
        /// Measure name of the denominator
        denominator: String,
    },
    /// Cumulative sum along `order_dimension`
    RunningTotal {
        /// Measure being accumulated
        measure: String,
        /// Dimension defining the accumulation order
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_dimension: Option<String>,
        /// Dimensions that restart the accumulation
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        partition_by: Vec<String>,
    },
    /// Share of the (partitioned) total
    PercentOfTotal {
        /// Measure being compared to its total
        measure: String,
        /// Dimensions defining each total
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        partition_by: Vec<String>,
    },
    /// Change versus `offset` rows earlier along `order_dimension`
    PeriodOverPeriod {
        /// Measure being compared
        measure: String,
        /// Dimension defining period order
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_dimension: Option<String>,
        /// Dimensions that restart the comparison
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        partition_by: Vec<String>,
        /// Number of periods back
        #[serde(default = "default_offset")]
        offset: u32,
    },
}

fn default_offset() -> u32 {
    1
}

/// A measure computed from other (aggregated) measures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMeasure {
    /// Output alias
    pub name: String,
    /// Computation
    #[serde(flatten)]
    pub kind: DerivationKind,
    /// Output formats
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formatting: Vec<OutputFormat>,
}

impl DerivedMeasure {
    /// Names of the measures this derivation reads
    pub fn measure_refs(&self) -> Vec<&str> {
        match &self.kind {
            DerivationKind::Ratio {
                numerator,
                denominator,
            } => vec![numerator.as_str(), denominator.as_str()],
            DerivationKind::RunningTotal { measure, .. }
            | DerivationKind::PercentOfTotal { measure, .. }
            | DerivationKind::PeriodOverPeriod { measure, .. } => vec![measure.as_str()],
        }
    }

    /// Ordering dimension for window derivations
    pub fn order_dimension(&self) -> Option<&str> {
        match &self.kind {
            DerivationKind::RunningTotal {
                order_dimension, ..
            }
            | DerivationKind::PeriodOverPeriod {
                order_dimension, ..
            } => order_dimension.as_deref(),
            _ => None,
        }
    }

    /// Partition dimensions for window derivations
    pub fn partition_by(&self) -> &[String] {
        match &self.kind {
            DerivationKind::RunningTotal { partition_by, .. }
            | DerivationKind::PercentOfTotal { partition_by, .. }
            | DerivationKind::PeriodOverPeriod { partition_by, .. } => partition_by,
            DerivationKind::Ratio { .. } => &[],
        }
    }

    /// Whether the derivation needs an ordering dimension
    pub fn requires_order(&self) -> bool {
        matches!(
            self.kind,
            DerivationKind::RunningTotal { .. } | DerivationKind::PeriodOverPeriod { .. }
        )
    }

    /// Rename every reference to measure `from` as `to`
    pub fn rename_measure_ref(&mut self, from: &str, to: &str) {
        let swap = |s: &mut String| {
            if s == from {
                *s = to.to_string();
            }
        };
        match &mut self.kind {
            DerivationKind::Ratio {
                numerator,
                denominator,
            } => {
                swap(numerator);
                swap(denominator);
            }
            DerivationKind::RunningTotal { measure, .. }
            | DerivationKind::PercentOfTotal { measure, .. }
            | DerivationKind::PeriodOverPeriod { measure, .. } => swap(measure),
        }
    }

    /// Set the ordering dimension of a window derivation
    pub fn set_order_dimension(&mut self, dimension: &str) {
        match &mut self.kind {
            DerivationKind::RunningTotal {
                order_dimension, ..
            }
            | DerivationKind::PeriodOverPeriod {
                order_dimension, ..
            } => *order_dimension = Some(dimension.to_string()),
            _ => {}
        }
    }

    /// Replace the partition list of a window derivation
    pub fn set_partition_by(&mut self, dims: Vec<String>) {
        match &mut self.kind {
            DerivationKind::RunningTotal { partition_by, .. }
            | DerivationKind::PercentOfTotal { partition_by, .. }
            | DerivationKind::PeriodOverPeriod { partition_by, .. } => *partition_by = dims,
            DerivationKind::Ratio { .. } => {}
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

/// What an ORDER BY entry points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTarget<'a> {
    /// A measure, dimension, or derived measure by semantic name
    Reference(&'a str),
    /// A raw column expression
    Column(&'a str),
    /// 1-based select-list position
    Position(usize),
}

/// One ORDER BY entry; exactly one of `reference`, `column`, `position` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Semantic name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Raw column expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// 1-based position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Direction
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderItem {
    /// Order by semantic reference
    pub fn by_reference(name: &str, direction: SortDirection) -> Self {
        Self {
            reference: Some(name.to_string()),
            column: None,
            position: None,
            direction,
        }
    }

    /// Resolved target, `None` when zero or several targets are set
    pub fn target(&self) -> Option<OrderTarget<'_>> {
        match (&self.reference, &self.column, self.position) {
            (Some(r), None, None) => Some(OrderTarget::Reference(r)),
            (None, Some(c), None) => Some(OrderTarget::Column(c)),
            (None, None, Some(p)) => Some(OrderTarget::Position(p)),
            _ => None,
        }
    }
}

/// A semantic metric definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMetric {
    /// Unique id (shared namespace with variants)
    pub id: MetricId,
    /// Display name
    pub name: String,
    /// Definition version; bumping it changes [`definition_hash`](Self::definition_hash)
    #[serde(default = "default_version")]
    pub version: u32,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<EnvironmentId>,
    /// Bound data model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_model_id: Option<DataModelId>,
    /// Base table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Base subquery, used when `table_name` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Measures
    #[serde(default)]
    pub measures: Vec<SemanticMeasure>,
    /// Dimensions
    #[serde(default)]
    pub dimensions: Vec<SemanticDimension>,
    /// Filters
    #[serde(default)]
    pub filters: Vec<SemanticFilter>,
    /// Joins, in declaration order
    #[serde(default)]
    pub joins: Vec<SemanticJoin>,
    /// Parameter declarations
    #[serde(default)]
    pub parameters: Vec<SemanticParameter>,
    /// Derived measures
    #[serde(default)]
    pub derived_measures: Vec<DerivedMeasure>,
    /// ORDER BY entries, applied when `ordered`
    #[serde(default)]
    pub order: Vec<OrderItem>,
    /// Row limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Emit GROUP BY for dimensions
    #[serde(default = "default_true")]
    pub grouped: bool,
    /// Emit ORDER BY
    #[serde(default)]
    pub ordered: bool,
}

fn default_version() -> u32 {
    1
}

/// Alias used for the base relation when the metric is defined by a subquery
pub const BASE_QUERY_ALIAS: &str = "base_query";

impl SemanticMetric {
    /// Minimal metric over a table
    pub fn new(id: &str, table_name: &str) -> Self {
        Self {
            id: MetricId::new(id),
            name: id.to_string(),
            version: default_version(),
            description: None,
            environment_id: None,
            data_model_id: None,
            table_name: Some(table_name.to_string()),
            query: None,
            measures: Vec::new(),
            dimensions: Vec::new(),
            filters: Vec::new(),
            joins: Vec::new(),
            parameters: Vec::new(),
            derived_measures: Vec::new(),
            order: Vec::new(),
            limit: None,
            grouped: true,
            ordered: false,
        }
    }

    /// Parse a metric from YAML (or JSON) content
    pub fn from_yaml(content: &str, path: &Path) -> CoreResult<Self> {
        let metric: SemanticMetric =
            serde_yaml::from_str(content).map_err(|e| CoreError::DefinitionInvalid {
                kind: "metric".to_string(),
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        metric.check_shape(path)?;
        Ok(metric)
    }

    /// Parse a metric from a JSON document
    pub fn from_json(content: &str) -> CoreResult<Self> {
        let metric: SemanticMetric = serde_json::from_str(content)?;
        metric.check_shape(Path::new("<json>"))?;
        Ok(metric)
    }

    /// Load-time shape checks; semantic validation lives in the compiler
    fn check_shape(&self, path: &Path) -> CoreResult<()> {
        let invalid = |message: String| CoreError::DefinitionInvalid {
            kind: "metric".to_string(),
            path: path.display().to_string(),
            message,
        };
        if self.name.trim().is_empty() {
            return Err(invalid(format!("metric '{}' has an empty name", self.id)));
        }
        for category in ComponentCategory::ALL {
            let names = self.component_names(category);
            for (idx, name) in names.iter().enumerate() {
                if name.trim().is_empty() {
                    return Err(invalid(format!("{} #{} has an empty name", category.singular(), idx + 1)));
                }
            }
        }
        Ok(())
    }

    /// Stable SHA-256 over the canonical JSON form of the definition
    pub fn definition_hash(&self) -> String {
        // Struct fields serialize in declaration order, so the text is
        // canonical for a given definition file.
        let canonical = serde_json::to_string(self).unwrap_or_default();
        compute_checksum(&canonical)
    }

    /// Name of the base relation used to qualify columns
    pub fn base_relation(&self) -> Option<&str> {
        match (&self.table_name, &self.query) {
            (Some(table), _) => Some(table.as_str()),
            (None, Some(_)) => Some(BASE_QUERY_ALIAS),
            (None, None) => None,
        }
    }

    /// Base table plus every table brought in by a join (lowercased base names)
    pub fn effective_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        let mut push = |t: &str| {
            let base = table_base_name(t).to_ascii_lowercase();
            if !tables.contains(&base) {
                tables.push(base);
            }
        };
        if let Some(base) = self.base_relation() {
            push(base);
        }
        for join in &self.joins {
            push(&join.left_table);
            push(&join.right_table);
        }
        tables
    }

    /// Component names of one category, in declaration order
    pub fn component_names(&self, category: ComponentCategory) -> Vec<&str> {
        fn names<T: Named>(items: &[T]) -> Vec<&str> {
            items.iter().map(Named::name).collect()
        }
        match category {
            ComponentCategory::Measures => names(&self.measures),
            ComponentCategory::Dimensions => names(&self.dimensions),
            ComponentCategory::Filters => names(&self.filters),
            ComponentCategory::Joins => names(&self.joins),
            ComponentCategory::Parameters => names(&self.parameters),
            ComponentCategory::DerivedMeasures => names(&self.derived_measures),
        }
    }

    /// Look up a measure by name
    pub fn measure(&self, name: &str) -> Option<&SemanticMeasure> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// Look up a dimension by name
    pub fn dimension(&self, name: &str) -> Option<&SemanticDimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Look up a parameter declaration by name
    pub fn parameter(&self, name: &str) -> Option<&SemanticParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names usable in ORDER BY references (dimensions, measures, derived measures)
    pub fn output_names(&self) -> Vec<&str> {
        self.dimensions
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.measures.iter().map(|m| m.name.as_str()))
            .chain(self.derived_measures.iter().map(|d| d.name.as_str()))
            .collect()
    }

    /// Whether the metric has at least one measure, dimension, or filter
    pub fn has_content(&self) -> bool {
        !(self.measures.is_empty() && self.dimensions.is_empty() && self.filters.is_empty())
    }
}

impl Named for SemanticMeasure {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for SemanticDimension {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for SemanticFilter {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for SemanticJoin {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for SemanticParameter {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for DerivedMeasure {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "metric_test.rs"]
mod tests;

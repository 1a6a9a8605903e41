//! mx-core - Core library for Metrix
//!
//! This crate provides the semantic metric vocabulary (measures, dimensions,
//! filters, joins, parameters), metric variants, pre-aggregation specs,
//! schema metadata snapshots, project configuration, and the metric store
//! traits shared by every other Metrix crate.

pub mod cancel;
pub mod checksum;
pub mod component;
pub mod config;
pub mod error;
pub mod format;
pub mod ids;
pub mod metric;
mod newtype_string;
pub mod preagg;
pub mod schema;
pub(crate) mod serde_helpers;
pub mod sql_utils;
pub mod store;
pub mod suggest;
pub mod variant;

pub use cancel::CancelToken;
pub use checksum::compute_checksum;
pub use component::{
    ComponentCategory, ComponentDefinitions, ComponentNameLists, ComponentSelection, Named,
};
pub use config::{CacheConfig, CompilerConfig, Config, Dialect, ExecutionConfig};
pub use error::{CoreError, CoreResult};
pub use format::{FormatMode, FormatType, OutputFormat};
pub use ids::{DataModelId, EnvironmentId, MetricId};
pub use metric::{
    DerivationKind, DerivedMeasure, DimensionType, FilterOperator, JoinCondition, JoinType,
    MeasureType, OrderItem, OrderTarget, ParameterType, SemanticDimension, SemanticFilter,
    SemanticJoin, SemanticMeasure, SemanticMetric, SemanticParameter, SortDirection, TimeGrain,
};
pub use preagg::{
    BuildStrategy, PartitionSpec, PreAggregationSpec, PreAggregationStatus, RefreshPolicy,
    RollupDimension, RollupMeasure, StorageMode,
};
pub use schema::{ColumnInfo, ForeignKey, ForeignKeyRef, SchemaMetadata};
pub use store::{discover_definitions, Definitions, InMemoryStore, MetricSource, MetricStore};
pub use suggest::closest_name;
pub use variant::{MetricVariant, VariantOverrides};

//! mx-compile - Metric compiler for Metrix
//!
//! Resolves metric variants into fully materialized metrics (chain walk with
//! cycle and depth guards, inclusion, overrides, referential integrity) and
//! infers joins that a metric's expressions need but do not declare.

pub mod error;
pub mod inflect;
pub mod integrity;
pub mod joins;
pub mod overrides;
pub mod resolved;
pub mod variant;

pub use error::{CompileError, CompileResult};
pub use integrity::validate_resolved;
pub use joins::{find_missing_joins, JoinInferenceReport, JoinStrategy, JoinSuggestion};
pub use resolved::ResolvedMetric;
pub use variant::{compile_metric, CompileOptions, VariantCompiler};

//! mx-engine - Metric execution engine for Metrix
//!
//! Ties the compiler, SQL generator, and connectors together: rollup
//! routing, result caching with single-flight computation, post-query
//! formatting, and the diagnostic pipeline behind `mx doctor`.

pub mod cache;
pub mod doctor;
pub mod engine;
pub mod error;
pub mod executor;
pub mod postformat;
pub mod preagg;

pub use cache::{CacheBackend, CacheCoordinator, CacheEntry, CacheKeyInputs, InMemoryCache};
pub use doctor::{
    DiagnoseResponse, Diagnosis, Doctor, DoctorContext, Finding, Fix, Severity, Stage, Suggestion,
};
pub use engine::{EngineOptions, ExecuteRequest, MetricEngine, MetricResult};
pub use error::{EngineError, EngineResult};
pub use executor::QueryExecutor;
pub use postformat::{apply_post_query, has_post_query_formats};
pub use preagg::{route, InMemoryCatalog, PreAggregationCatalog, RollupRewrite};

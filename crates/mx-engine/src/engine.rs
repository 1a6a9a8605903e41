//! Metric engine: compile, generate, execute, and diagnose by metric id

use crate::cache::{CacheBackend, CacheCoordinator, CacheKeyInputs};
use crate::doctor::{DiagnoseResponse, Doctor, DoctorContext};
use crate::error::{EngineError, EngineResult};
use crate::executor::QueryExecutor;
use crate::postformat::apply_post_query;
use crate::preagg::{route, InMemoryCatalog, PreAggregationCatalog};
use mx_compile::{
    find_missing_joins, CompileOptions, JoinInferenceReport, ResolvedMetric, VariantCompiler,
};
use mx_core::{
    closest_name, discover_definitions, CancelToken, Config, Dialect, InMemoryStore,
    MetricSource, MetricStore, SchemaMetadata, SemanticMetric,
};
use mx_db::{introspect_schema, Connector, DuckDbConnector, Row, SchemaIntrospector};
use mx_sql::{generate_sql, ParameterValues, SqlStatement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Engine settings, usually taken from the project config
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Dialect used when a caller does not pick one
    pub dialect: Dialect,
    /// Variant compiler settings
    pub compile: CompileOptions,
    /// Whether results are cached
    pub cache_enabled: bool,
    /// TTL for cached results
    pub default_ttl: Duration,
    /// Connector timeout
    pub timeout: Duration,
    /// Part of every cache key
    pub data_model_version: String,
    /// Data model the doctor expects metrics to be bound to
    pub data_model_id: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            compile: CompileOptions::default(),
            cache_enabled: true,
            default_ttl: Duration::from_secs(300),
            timeout: Duration::from_secs(30),
            data_model_version: "1".to_string(),
            data_model_id: None,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            dialect: config.dialect,
            compile: CompileOptions::from(&config.compiler),
            cache_enabled: config.cache.enabled,
            default_ttl: Duration::from_secs(config.cache.default_ttl_secs),
            timeout: Duration::from_secs(config.execution.timeout_secs),
            data_model_version: config.data_model_version.clone(),
            data_model_id: config.data_model_id.clone(),
        }
    }
}

/// One execution request
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    /// Metric or variant id
    pub metric_id: String,
    /// Parameter values by name
    pub parameters: ParameterValues,
    /// Consumer context (dashboard, user, API client); part of the cache key
    pub consumer: Option<String>,
    /// Skip the cache for this request
    pub bypass_cache: bool,
    /// TTL override for the cached result
    pub ttl: Option<Duration>,
}

impl ExecuteRequest {
    /// Request for `metric_id` with no parameters
    pub fn new(metric_id: impl Into<String>) -> Self {
        Self {
            metric_id: metric_id.into(),
            ..Default::default()
        }
    }

    /// Set one parameter value
    pub fn with_parameter(mut self, name: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    /// Set the consumer context
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = Some(consumer.into());
        self
    }

    /// Skip the cache
    pub fn without_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

/// Result of [`MetricEngine::execute_metric`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Result rows, post-query formats applied
    pub rows: Vec<Row>,
    /// SQL that produced the rows
    pub sql: String,
    /// Wall time of this call
    pub execution_time_ms: u64,
    /// No computation ran for this call
    pub cache_hit: bool,
    /// Number of rows
    pub row_count: usize,
    /// Rollup that answered the query, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup: Option<String>,
}

/// The cached part of a result
#[derive(Debug, Serialize, Deserialize)]
struct CachedRows {
    rows: Vec<Row>,
    sql: String,
    rollup: Option<String>,
}

/// Compiles, routes, caches, executes, and diagnoses metrics from one store
pub struct MetricEngine {
    store: Arc<dyn MetricStore>,
    catalog: Arc<dyn PreAggregationCatalog>,
    executor: QueryExecutor,
    cache: Option<CacheCoordinator>,
    introspector: Option<Arc<dyn SchemaIntrospector>>,
    schema: RwLock<Option<Arc<SchemaMetadata>>>,
    doctor: Doctor,
    options: EngineOptions,
}

impl MetricEngine {
    /// Engine over the given collaborators, with an in-memory cache when enabled
    pub fn new(
        store: Arc<dyn MetricStore>,
        catalog: Arc<dyn PreAggregationCatalog>,
        connector: Arc<dyn Connector>,
        options: EngineOptions,
    ) -> Self {
        let cache = options
            .cache_enabled
            .then(|| CacheCoordinator::in_memory(options.default_ttl));
        Self {
            store,
            catalog,
            executor: QueryExecutor::new(connector, options.timeout),
            cache,
            introspector: None,
            schema: RwLock::new(None),
            doctor: Doctor::with_defaults(),
            options,
        }
    }

    /// Load a project directory: definitions, rollups, and its DuckDB database
    pub fn from_project(root: &Path, config: &Config) -> EngineResult<Self> {
        let defs = discover_definitions(&config.metric_paths_absolute(root))?;
        log::debug!(
            "Loaded {} metric(s), {} variant(s), {} rollup(s)",
            defs.metrics.len(),
            defs.variants.len(),
            defs.pre_aggregations.len()
        );
        let store = InMemoryStore::from_definitions(&defs)?;
        let catalog = InMemoryCatalog::new(defs.pre_aggregations);
        let db = Arc::new(
            DuckDbConnector::new(&config.database_path(root))
                .map_err(|e| EngineError::from_db(e, "", &BTreeMap::new()))?,
        );
        let engine = Self::new(
            Arc::new(store),
            Arc::new(catalog),
            db.clone(),
            EngineOptions::from(config),
        );
        Ok(engine.with_introspector(db))
    }

    /// Replace the cache backend
    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(CacheCoordinator::new(backend, self.options.default_ttl));
        self
    }

    /// Source of schema metadata for join inference and the doctor
    pub fn with_introspector(mut self, introspector: Arc<dyn SchemaIntrospector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Replace the diagnostic pipeline
    pub fn with_doctor(mut self, doctor: Doctor) -> Self {
        self.doctor = doctor;
        self
    }

    /// Engine settings
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The definition store
    pub fn store(&self) -> &dyn MetricStore {
        self.store.as_ref()
    }

    /// The cache, when enabled
    pub fn cache(&self) -> Option<&CacheCoordinator> {
        self.cache.as_ref()
    }

    /// Every stored definition, sorted by id
    pub fn definitions(&self) -> Vec<MetricSource> {
        self.store
            .metric_ids()
            .iter()
            .filter_map(|id| self.store.fetch(id.as_str()))
            .collect()
    }

    /// Resolve and validate a metric or variant
    pub fn compile(&self, id: &str, cancel: &CancelToken) -> EngineResult<ResolvedMetric> {
        let compiler = VariantCompiler::new(self.store.as_ref(), self.options.compile.clone());
        Ok(compiler.compile_id(id, cancel)?)
    }

    /// Compile and render SQL, in `dialect` or the configured default
    pub fn generate_sql(
        &self,
        id: &str,
        params: &ParameterValues,
        dialect: Option<Dialect>,
        cancel: &CancelToken,
    ) -> EngineResult<SqlStatement> {
        let resolved = self.compile(id, cancel)?;
        let dialect = dialect.unwrap_or(self.options.dialect);
        Ok(generate_sql(resolved.metric(), params, dialect, cancel)?)
    }

    /// Compile, route, and run a metric, serving from the cache when possible
    pub async fn execute_metric(&self, request: &ExecuteRequest) -> EngineResult<MetricResult> {
        let started = Instant::now();
        let cancel = CancelToken::with_timeout(self.options.timeout);
        let resolved = self.compile(&request.metric_id, &cancel)?;
        let metric = resolved.metric();

        let compute = || async {
            let cached = self.run(metric, &request.parameters, &cancel).await?;
            serde_json::to_value(cached).map_err(|e| EngineError::Cache(e.to_string()))
        };

        let (value, cache_hit) = match (&self.cache, request.bypass_cache) {
            (Some(cache), false) => {
                let inputs =
                    CacheKeyInputs::new(&resolved.definition_hash(), &self.options.data_model_version)
                        .with_parameters(request.parameters.clone())
                        .with_consumer(request.consumer.clone());
                cache.get_or_compute(&inputs, request.ttl, compute).await?
            }
            _ => (compute().await?, false),
        };

        let cached: CachedRows =
            serde_json::from_value(value).map_err(|e| EngineError::Cache(e.to_string()))?;
        let elapsed = started.elapsed().as_millis() as u64;
        log::debug!(
            "'{}' returned {} row(s) in {}ms (cache_hit={})",
            request.metric_id,
            cached.rows.len(),
            elapsed,
            cache_hit
        );
        Ok(MetricResult {
            row_count: cached.rows.len(),
            rows: cached.rows,
            sql: cached.sql,
            execution_time_ms: elapsed,
            cache_hit,
            rollup: cached.rollup,
        })
    }

    /// Route to a rollup or generate raw SQL, execute, and format
    async fn run(
        &self,
        metric: &SemanticMetric,
        params: &ParameterValues,
        cancel: &CancelToken,
    ) -> EngineResult<CachedRows> {
        let specs = self.catalog.specs_for(&metric.id);
        let (statement, rollup) = match route(metric, params, &specs, self.options.dialect) {
            Some(rewrite) => {
                log::debug!(
                    "'{}' answered by rollup '{}' ({})",
                    metric.id,
                    rewrite.spec_id,
                    rewrite.table_name
                );
                (rewrite.statement, Some(rewrite.spec_id))
            }
            None => (generate_sql(metric, params, self.options.dialect, cancel)?, None),
        };

        let mut rows = self.executor.execute(&statement).await?;
        apply_post_query(metric, &mut rows)?;
        Ok(CachedRows {
            rows,
            sql: statement.sql,
            rollup,
        })
    }

    /// Drop every cached result of a metric's current definition
    pub async fn invalidate_metric(&self, id: &str) -> EngineResult<usize> {
        let Some(cache) = &self.cache else {
            return Ok(0);
        };
        let resolved = self.compile(id, &CancelToken::new())?;
        Ok(cache.invalidate_metric(&resolved.definition_hash()).await)
    }

    /// Drop every cached result
    pub async fn flush_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.flush().await;
        }
    }

    /// Use `schema` instead of introspecting the data source
    pub fn set_schema(&self, schema: SchemaMetadata) {
        if let Ok(mut slot) = self.schema.write() {
            *slot = Some(Arc::new(schema));
        }
    }

    /// Re-read schema metadata from the introspector
    pub async fn load_schema(&self) -> EngineResult<Arc<SchemaMetadata>> {
        let schema = match &self.introspector {
            Some(introspector) => introspect_schema(introspector.as_ref())
                .await
                .map_err(|e| EngineError::from_db(e, "", &BTreeMap::new()))?,
            None => SchemaMetadata::new(),
        };
        let schema = Arc::new(schema);
        if let Ok(mut slot) = self.schema.write() {
            *slot = Some(Arc::clone(&schema));
        }
        Ok(schema)
    }

    /// Cached schema metadata, loaded on first use. Load failures are logged.
    pub async fn schema(&self) -> Option<Arc<SchemaMetadata>> {
        let cached = self.schema.read().ok().and_then(|slot| slot.clone());
        if cached.is_some() {
            return cached;
        }
        self.introspector.as_ref()?;
        match self.load_schema().await {
            Ok(schema) => Some(schema),
            Err(e) => {
                log::warn!("Schema introspection failed: {}", e);
                None
            }
        }
    }

    /// Suggest joins for tables a metric references but does not join
    pub async fn infer_joins(&self, id: &str) -> EngineResult<JoinInferenceReport> {
        let compiler =
            VariantCompiler::new(self.store.as_ref(), self.options.compile.clone().lenient());
        let resolved = compiler.compile_id(id, &CancelToken::new())?;
        let schema = match self.schema().await {
            Some(schema) => schema,
            None => Arc::new(SchemaMetadata::new()),
        };
        Ok(find_missing_joins(resolved.metric(), &schema))
    }

    /// Run the diagnostic pipeline. Never fails; problems are in the response.
    pub async fn diagnose(&self, id: &str) -> DiagnoseResponse {
        let Some(source) = self.store.fetch(id) else {
            let ids = self.store.metric_ids();
            let suggestion = closest_name(
                id,
                ids.iter().map(|i| i.as_str()),
                self.options.compile.suggestion_threshold,
            );
            return DiagnoseResponse::unknown(id, suggestion.as_deref());
        };

        let schema = self.schema().await;
        let options = self.options.compile.clone().lenient();
        let ctx = DoctorContext {
            options: &options,
            dialect: self.options.dialect,
            schema: schema.as_deref(),
            executor: Some(&self.executor),
            expected_data_model: self.options.data_model_id.as_deref(),
        };
        self.doctor.diagnose(&source, self.store.as_ref(), &ctx).await
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;

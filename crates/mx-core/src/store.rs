//! Metric store: lookup of metrics and variants by id
//!
//! Persistence is external. [`InMemoryStore`] is the reference adapter and
//! [`discover_definitions`] loads a read-only project directory into one.

use crate::error::{CoreError, CoreResult};
use crate::ids::MetricId;
use crate::metric::SemanticMetric;
use crate::preagg::PreAggregationSpec;
use crate::variant::MetricVariant;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Either kind of definition addressable by a metric id
#[derive(Debug, Clone, PartialEq)]
pub enum MetricSource {
    /// A standalone metric
    Metric(SemanticMetric),
    /// A variant of another metric or variant
    Variant(MetricVariant),
}

impl MetricSource {
    /// Id of the definition
    pub fn id(&self) -> &MetricId {
        match self {
            MetricSource::Metric(m) => &m.id,
            MetricSource::Variant(v) => &v.id,
        }
    }

    /// Display name of the definition
    pub fn name(&self) -> &str {
        match self {
            MetricSource::Metric(m) => &m.name,
            MetricSource::Variant(v) => &v.name,
        }
    }

    /// `"metric"` or `"variant"`
    pub fn kind(&self) -> &'static str {
        match self {
            MetricSource::Metric(_) => "metric",
            MetricSource::Variant(_) => "variant",
        }
    }
}

/// Read access to stored definitions
pub trait MetricStore: Send + Sync {
    /// Fetch a standalone metric
    fn get_metric(&self, id: &str) -> Option<SemanticMetric>;

    /// Fetch a variant
    fn get_variant(&self, id: &str) -> Option<MetricVariant>;

    /// Every known id (metrics and variants), sorted
    fn metric_ids(&self) -> Vec<MetricId>;

    /// Fetch whichever kind of definition owns `id`, metrics first
    fn fetch(&self, id: &str) -> Option<MetricSource> {
        self.get_metric(id)
            .map(MetricSource::Metric)
            .or_else(|| self.get_variant(id).map(MetricSource::Variant))
    }
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    metrics: RwLock<BTreeMap<MetricId, SemanticMetric>>,
    variants: RwLock<BTreeMap<MetricId, MetricVariant>>,
}

impl InMemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn check_free(&self, id: &MetricId) -> CoreResult<()> {
        let taken = self
            .metrics
            .read()
            .map(|m| m.contains_key(id))
            .unwrap_or(false)
            || self
                .variants
                .read()
                .map(|v| v.contains_key(id))
                .unwrap_or(false);
        if taken {
            return Err(CoreError::DuplicateDefinition {
                id: id.to_string(),
                path1: "<store>".to_string(),
                path2: "<insert>".to_string(),
            });
        }
        Ok(())
    }

    /// Insert a metric; ids are unique across metrics and variants
    pub fn insert_metric(&self, metric: SemanticMetric) -> CoreResult<()> {
        self.check_free(&metric.id)?;
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.insert(metric.id.clone(), metric);
        }
        Ok(())
    }

    /// Insert a variant; ids are unique across metrics and variants
    pub fn insert_variant(&self, variant: MetricVariant) -> CoreResult<()> {
        self.check_free(&variant.id)?;
        if let Ok(mut variants) = self.variants.write() {
            variants.insert(variant.id.clone(), variant);
        }
        Ok(())
    }

    /// Replace (or insert) a metric
    pub fn upsert_metric(&self, metric: SemanticMetric) {
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.insert(metric.id.clone(), metric);
        }
    }

    /// Build a store from loaded definitions
    pub fn from_definitions(defs: &Definitions) -> CoreResult<Self> {
        let store = Self::new();
        for metric in &defs.metrics {
            store.insert_metric(metric.clone())?;
        }
        for variant in &defs.variants {
            store.insert_variant(variant.clone())?;
        }
        Ok(store)
    }
}

impl MetricStore for InMemoryStore {
    fn get_metric(&self, id: &str) -> Option<SemanticMetric> {
        self.metrics.read().ok()?.get(id).cloned()
    }

    fn get_variant(&self, id: &str) -> Option<MetricVariant> {
        self.variants.read().ok()?.get(id).cloned()
    }

    fn metric_ids(&self) -> Vec<MetricId> {
        let mut ids: Vec<MetricId> = Vec::new();
        if let Ok(metrics) = self.metrics.read() {
            ids.extend(metrics.keys().cloned());
        }
        if let Ok(variants) = self.variants.read() {
            ids.extend(variants.keys().cloned());
        }
        ids.sort();
        ids
    }
}

/// Document kind recognised by the directory loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DefinitionKind {
    Metric,
    Variant,
    PreAggregation,
}

/// Minimal YAML probe to check the `kind` field without full deserialization
#[derive(Deserialize)]
struct DefinitionKindProbe {
    #[serde(default)]
    kind: Option<DefinitionKind>,
}

/// Everything loaded from a project's metric directories
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    /// Standalone metrics
    pub metrics: Vec<SemanticMetric>,
    /// Variants
    pub variants: Vec<MetricVariant>,
    /// Rollup specs
    pub pre_aggregations: Vec<PreAggregationSpec>,
}

/// Discover definitions from a list of directories
///
/// Files are `.yml`, `.yaml`, or `.json` documents carrying a `kind` of
/// `metric`, `variant`, or `pre_aggregation`; other files are skipped.
/// Returns an error if an id is defined twice or a document of a known kind
/// fails to parse.
pub fn discover_definitions(paths: &[PathBuf]) -> CoreResult<Definitions> {
    let mut defs = Definitions::default();
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();

    for dir in paths {
        if !dir.is_dir() {
            log::debug!("Skipping missing metric path {}", dir.display());
            continue;
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| CoreError::IoWithPath {
                path: dir.display().to_string(),
                source: e,
            })?
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext == "yml" || ext == "yaml" || ext == "json")
            })
            .collect();
        files.sort();

        for file_path in files {
            load_file(&file_path, &mut defs, &mut seen)?;
        }
    }

    Ok(defs)
}

fn load_file(
    file_path: &Path,
    defs: &mut Definitions,
    seen: &mut BTreeMap<String, PathBuf>,
) -> CoreResult<()> {
    let content = std::fs::read_to_string(file_path).map_err(|e| CoreError::IoWithPath {
        path: file_path.display().to_string(),
        source: e,
    })?;

    // Probe the kind field before full parse
    let kind = match serde_yaml::from_str::<DefinitionKindProbe>(&content) {
        Ok(DefinitionKindProbe { kind: Some(kind) }) => kind,
        _ => {
            log::debug!("Skipping {}: no recognised kind", file_path.display());
            return Ok(());
        }
    };

    let id = match kind {
        DefinitionKind::Metric => {
            let metric = SemanticMetric::from_yaml(&content, file_path)?;
            let id = metric.id.to_string();
            defs.metrics.push(metric);
            id
        }
        DefinitionKind::Variant => {
            let variant = MetricVariant::from_yaml(&content, file_path)?;
            let id = variant.id.to_string();
            defs.variants.push(variant);
            id
        }
        DefinitionKind::PreAggregation => {
            let spec = PreAggregationSpec::from_yaml(&content, file_path)?;
            let id = format!("pre_aggregation:{}", spec.id);
            defs.pre_aggregations.push(spec);
            id
        }
    };

    if let Some(prev) = seen.get(&id) {
        return Err(CoreError::DuplicateDefinition {
            id,
            path1: prev.display().to_string(),
            path2: file_path.display().to_string(),
        });
    }
    seen.insert(id, file_path.to_path_buf());
    Ok(())
}

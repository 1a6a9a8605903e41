//! Variant compiler
//!
//! Walks `variant -> source_metric_id` links down to a root metric, then
//! applies each variant's overrides innermost first.

use crate::error::{CompileError, CompileResult};
use crate::integrity::validate_resolved;
use crate::overrides::apply_variant;
use crate::resolved::ResolvedMetric;
use mx_core::{
    closest_name, CancelToken, CompilerConfig, MetricId, MetricSource, MetricStore,
    MetricVariant, SemanticMetric,
};

/// Compiler settings
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Longest allowed variant chain (number of variants)
    pub max_depth: usize,
    /// Minimum similarity for closest-name suggestions
    pub suggestion_threshold: f64,
    /// Reject `table.column` references outside the join graph
    pub strict_references: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions::from(&CompilerConfig::default())
    }
}

impl From<&CompilerConfig> for CompileOptions {
    fn from(config: &CompilerConfig) -> Self {
        Self {
            max_depth: config.max_variant_depth,
            suggestion_threshold: config.suggestion_threshold,
            strict_references: config.strict_references,
        }
    }
}

impl CompileOptions {
    /// Same options with table reference checks turned off
    pub fn lenient(mut self) -> Self {
        self.strict_references = false;
        self
    }
}

fn check_cancel(cancel: &CancelToken) -> CompileResult<()> {
    if cancel.is_cancelled() {
        return Err(CompileError::Cancelled);
    }
    Ok(())
}

/// Compile a standalone metric (integrity checks only)
pub fn compile_metric(
    metric: &SemanticMetric,
    options: &CompileOptions,
    cancel: &CancelToken,
) -> CompileResult<ResolvedMetric> {
    check_cancel(cancel)?;
    validate_resolved(metric, options)?;
    Ok(ResolvedMetric::new(metric.clone(), vec![metric.id.clone()]))
}

/// Resolves variants against a metric store
pub struct VariantCompiler<'a> {
    store: &'a dyn MetricStore,
    options: CompileOptions,
}

impl<'a> VariantCompiler<'a> {
    /// Create a compiler over `store`
    pub fn new(store: &'a dyn MetricStore, options: CompileOptions) -> Self {
        Self { store, options }
    }

    /// Options in use
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    fn source_not_found(&self, id: &str, referenced_by: &str) -> CompileError {
        let known = self.store.metric_ids();
        CompileError::SourceNotFound {
            id: id.to_string(),
            referenced_by: referenced_by.to_string(),
            suggestion: closest_name(
                id,
                known.iter().map(|k| k.as_str()),
                self.options.suggestion_threshold,
            ),
        }
    }

    /// Compile whichever definition owns `id`
    pub fn compile_id(&self, id: &str, cancel: &CancelToken) -> CompileResult<ResolvedMetric> {
        match self.store.fetch(id) {
            Some(MetricSource::Metric(metric)) => compile_metric(&metric, &self.options, cancel),
            Some(MetricSource::Variant(variant)) => self.compile(&variant, cancel),
            None => Err(self.source_not_found(id, "request")),
        }
    }

    /// Compile a variant into a materialized metric
    pub fn compile(
        &self,
        variant: &MetricVariant,
        cancel: &CancelToken,
    ) -> CompileResult<ResolvedMetric> {
        let resolved = self.materialize(variant, cancel)?;
        check_cancel(cancel)?;
        validate_resolved(resolved.metric(), &self.options)?;
        Ok(resolved)
    }

    /// Resolve the chain and apply overrides without the integrity pass
    pub fn materialize(
        &self,
        variant: &MetricVariant,
        cancel: &CancelToken,
    ) -> CompileResult<ResolvedMetric> {
        let (root, chain) = self.resolve_chain(variant, cancel)?;

        let mut lineage = vec![root.id.clone()];
        let mut metric = root;
        for link in chain.iter().rev() {
            check_cancel(cancel)?;
            metric = apply_variant(metric, link, &self.options)?;
            lineage.push(link.id.clone());
        }
        Ok(ResolvedMetric::new(metric, lineage))
    }

    /// Walk source links to the root metric.
    ///
    /// Returns the root and the variants visited, outermost first. At every
    /// hop the cycle check runs before the depth check.
    pub fn resolve_chain(
        &self,
        variant: &MetricVariant,
        cancel: &CancelToken,
    ) -> CompileResult<(SemanticMetric, Vec<MetricVariant>)> {
        let max = self.options.max_depth;
        let mut visited: Vec<MetricId> = vec![variant.id.clone()];
        let mut chain: Vec<MetricVariant> = vec![variant.clone()];
        let path = |visited: &[MetricId], next: &MetricId| {
            visited
                .iter()
                .chain(std::iter::once(next))
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
        };

        if chain.len() > max {
            return Err(CompileError::MaxDepthExceeded {
                depth: chain.len(),
                max,
                chain: visited.iter().map(|id| id.to_string()).collect(),
            });
        }

        let mut next = variant.source_metric_id.clone();
        loop {
            check_cancel(cancel)?;
            if visited.contains(&next) {
                return Err(CompileError::CircularReference {
                    chain: path(&visited, &next),
                });
            }
            let referenced_by = visited.last().map(|id| id.to_string()).unwrap_or_default();
            match self.store.fetch(next.as_str()) {
                None => return Err(self.source_not_found(next.as_str(), &referenced_by)),
                Some(MetricSource::Metric(metric)) => {
                    log::debug!(
                        "Resolved '{}' through {} variant(s) to metric '{}'",
                        variant.id,
                        chain.len(),
                        metric.id
                    );
                    return Ok((metric, chain));
                }
                Some(MetricSource::Variant(source)) => {
                    if chain.len() + 1 > max {
                        return Err(CompileError::MaxDepthExceeded {
                            depth: chain.len() + 1,
                            max,
                            chain: path(&visited, &next),
                        });
                    }
                    visited.push(source.id.clone());
                    next = source.source_metric_id.clone();
                    chain.push(source);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "variant_test.rs"]
mod tests;

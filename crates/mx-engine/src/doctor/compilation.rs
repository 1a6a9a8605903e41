//! Stage 0: variant resolution
//!
//! Resolves the chain and applies overrides without the final integrity
//! pass (later stages cover that). Fixable errors are fixed on a working
//! copy and resolution is retried, so later stages see the repaired metric.

use super::fix::{Fix, PinnedField};
use super::Finding;
use mx_compile::{CompileError, CompileOptions, VariantCompiler};
use mx_core::{CancelToken, ComponentCategory, MetricStore, MetricVariant, SemanticMetric};

pub(super) const STAGE: &str = "compilation";

/// Bound on fix-and-retry rounds
const MAX_ROUNDS: usize = 8;

pub(super) struct CompilationOutcome {
    pub findings: Vec<Finding>,
    pub materialized: Option<SemanticMetric>,
}

/// Fix for a resolution error raised on `variant` itself
fn fix_for(err: &CompileError, variant: &MetricVariant) -> Option<Fix> {
    let own_context = format!("variant '{}' ", variant.id);
    match err {
        CompileError::IncompatibleSource {
            variant: offender,
            field,
            source_value,
            ..
        } if offender.as_str() == variant.id.as_str() => Some(Fix::SetVariantPin {
            field: PinnedField::from_name(field)?,
            value: source_value.clone(),
        }),
        CompileError::SourceNotFound {
            referenced_by,
            suggestion: Some(suggestion),
            ..
        } if referenced_by.as_str() == variant.id.as_str() => Some(Fix::SetVariantSource {
            source_metric_id: suggestion.clone(),
        }),
        CompileError::MeasureNotFound {
            name,
            context,
            suggestion: Some(suggestion),
        } if context.starts_with(&own_context) => Some(Fix::RenameVariantReference {
            category: ComponentCategory::Measures,
            from: name.clone(),
            to: suggestion.clone(),
        }),
        CompileError::InvalidJoinDimension {
            category,
            name,
            context,
            suggestion: Some(suggestion),
            ..
        }
        | CompileError::ReferenceNotFound {
            category,
            name,
            context,
            suggestion: Some(suggestion),
        } if context.starts_with(&own_context) => Some(Fix::RenameVariantReference {
            category: *category,
            from: name.clone(),
            to: suggestion.clone(),
        }),
        _ => None,
    }
}

fn code_for(err: &CompileError) -> &'static str {
    match err {
        CompileError::CircularReference { .. } => "DR001",
        CompileError::MaxDepthExceeded { .. } => "DR002",
        CompileError::IncompatibleSource { .. } => "DR003",
        CompileError::SourceNotFound { .. } => "DR004",
        CompileError::MeasureNotFound { .. }
        | CompileError::InvalidJoinDimension { .. }
        | CompileError::ReferenceNotFound { .. } => "DR005",
        CompileError::InvalidDerivation { .. } => "DR006",
        CompileError::Cancelled => "DR007",
    }
}

/// Resolve `variant`, fixing and retrying while the errors are fixable
pub(super) fn compile_variant(
    variant: &MetricVariant,
    store: &dyn MetricStore,
    options: &CompileOptions,
) -> CompilationOutcome {
    let compiler = VariantCompiler::new(store, options.clone());
    let cancel = CancelToken::new();
    let mut working = variant.clone();
    let mut findings = Vec::new();

    for _ in 0..MAX_ROUNDS {
        match compiler.materialize(&working, &cancel) {
            Ok(resolved) => {
                log::debug!(
                    "Variant '{}' resolves through {}",
                    variant.id,
                    resolved
                        .lineage()
                        .iter()
                        .map(|id| id.as_str())
                        .collect::<Vec<_>>()
                        .join(" -> ")
                );
                return CompilationOutcome {
                    findings,
                    materialized: Some(resolved.into_metric()),
                };
            }
            Err(err) => {
                let fix = fix_for(&err, &working);
                let finding = Finding::error(STAGE, code_for(&err), err.to_string())
                    .with_fix(fix.clone());
                findings.push(finding);
                match fix {
                    Some(fix) if fix.apply_to_variant(&mut working, None) => continue,
                    _ => break,
                }
            }
        }
    }

    CompilationOutcome {
        findings,
        materialized: None,
    }
}

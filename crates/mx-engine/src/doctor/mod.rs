//! Diagnostic pipeline for metric and variant definitions
//!
//! Stages run in a fixed order and never short-circuit: Structure,
//! Semantics, Derivations, Joins, Execution. Variants first go through a
//! compilation stage that resolves them (fixing what it can) and hands the
//! materialized metric to the other stages. A stage that panics is reported
//! as a finding; diagnosis itself never fails.

mod compilation;
mod derivations;
pub mod fix;
mod execution;
mod joins;
mod semantics;
mod structure;

pub use fix::{Fix, PinnedField};

use crate::executor::QueryExecutor;
use async_trait::async_trait;
use futures::FutureExt;
use mx_compile::CompileOptions;
use mx_core::{Dialect, MetricSource, MetricStore, MetricVariant, SchemaMetadata, SemanticMetric};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;

/// Finding severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, no action required
    Info,
    /// Worth reviewing; the metric still runs
    Warning,
    /// The metric is broken
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A problem reported by a stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Finding code (e.g. "DR301")
    pub code: String,
    /// Severity level
    pub severity: Severity,
    /// Stage that produced the finding
    pub stage: String,
    /// Human-readable message
    pub message: String,
    /// Component the finding is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Automatic fix, when one is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Fix>,
}

impl Finding {
    fn new(stage: &str, code: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity,
            stage: stage.to_string(),
            message: message.into(),
            component: None,
            fix: None,
        }
    }

    /// Error finding
    pub fn error(stage: &str, code: &str, message: impl Into<String>) -> Self {
        Self::new(stage, code, Severity::Error, message)
    }

    /// Warning finding
    pub fn warning(stage: &str, code: &str, message: impl Into<String>) -> Self {
        Self::new(stage, code, Severity::Warning, message)
    }

    /// Informational finding
    pub fn info(stage: &str, code: &str, message: impl Into<String>) -> Self {
        Self::new(stage, code, Severity::Info, message)
    }

    /// Attach the component name
    pub fn with_component(mut self, component: &str) -> Self {
        self.component = Some(component.to_string());
        self
    }

    /// Attach an automatic fix
    pub fn with_fix(mut self, fix: Option<Fix>) -> Self {
        self.fix = fix;
        self
    }

    /// Whether this finding makes the definition unhealthy
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Read-only inputs shared by every stage
pub struct DoctorContext<'a> {
    /// Compiler settings (strictness, suggestion threshold)
    pub options: &'a CompileOptions,
    /// Dialect generated for syntax checks
    pub dialect: Dialect,
    /// Schema snapshot, when one is loaded
    pub schema: Option<&'a SchemaMetadata>,
    /// Connector used for dry runs
    pub executor: Option<&'a QueryExecutor>,
    /// Data model metrics are expected to be bound to
    pub expected_data_model: Option<&'a str>,
}

/// A diagnostic stage over a (materialized) metric
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name
    fn name(&self) -> &'static str;
    /// Human-readable description
    fn description(&self) -> &'static str;
    /// Inspect `metric`, returning every finding
    async fn run(&self, metric: &SemanticMetric, ctx: &DoctorContext<'_>) -> Vec<Finding>;
}

/// A fix proposal with the entity it produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// What the fix does
    pub description: String,
    /// The metric or variant with this fix and every earlier one applied
    pub fixed_entity_json: Value,
}

/// Explanation plus fix proposals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    /// One line per finding, preceded by a summary
    pub explanation: String,
    /// Fix proposals in stage order
    pub suggestions: Vec<Suggestion>,
}

/// Output of [`Doctor::diagnose`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnoseResponse {
    /// No error-level findings
    pub healthy: bool,
    /// Explanation and suggestions
    pub diagnosis: Diagnosis,
    /// Structured findings behind the explanation
    #[serde(skip)]
    pub findings: Vec<Finding>,
}

impl DiagnoseResponse {
    /// Response for an id that names no definition
    pub fn unknown(id: &str, suggestion: Option<&str>) -> Self {
        let hint = suggestion
            .map(|s| format!(" (did you mean '{}'?)", s))
            .unwrap_or_default();
        let finding = Finding::error(
            compilation::STAGE,
            "DR004",
            format!("no metric or variant named '{}'{}", id, hint),
        );
        Self {
            healthy: false,
            diagnosis: Diagnosis {
                explanation: format!("Found 1 error(s) and 0 warning(s) in '{}'.\n[{}] {} {}: {}", id, finding.code, finding.stage, finding.severity, finding.message),
                suggestions: Vec::new(),
            },
            findings: vec![finding],
        }
    }
}

/// Runs the stage pipeline
pub struct Doctor {
    stages: Vec<Box<dyn Stage>>,
}

impl Default for Doctor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Entity being fixed, with a running copy that accumulates fixes
///
/// Variant-only fixes leave the materialized copy untouched; compilation
/// fixes are already reflected in it.
enum Target {
    Metric(SemanticMetric),
    Variant {
        variant: MetricVariant,
        materialized: Option<SemanticMetric>,
    },
}

impl Target {
    fn apply(&mut self, fix: &Fix) -> Option<Suggestion> {
        match self {
            Target::Metric(metric) => {
                if !fix.apply_to_metric(metric) {
                    return None;
                }
                Some(Suggestion {
                    description: fix.describe(),
                    fixed_entity_json: serde_json::to_value(&*metric).unwrap_or(Value::Null),
                })
            }
            Target::Variant {
                variant,
                materialized,
            } => {
                if fix.apply_to_variant(variant, materialized.as_ref()) {
                    if let Some(m) = materialized.as_mut() {
                        fix.apply_to_metric(m);
                    }
                    return Some(Suggestion {
                        description: fix.describe(),
                        fixed_entity_json: serde_json::to_value(&*variant).unwrap_or(Value::Null),
                    });
                }
                let m = materialized.as_mut()?;
                if !fix.apply_to_metric(m) {
                    return None;
                }
                Some(Suggestion {
                    description: format!("{} (on the materialized metric)", fix.describe()),
                    fixed_entity_json: serde_json::to_value(&*m).unwrap_or(Value::Null),
                })
            }
        }
    }
}

impl Doctor {
    /// Pipeline with every built-in stage, in order
    pub fn with_defaults() -> Self {
        Self {
            stages: vec![
                Box::new(structure::StructureStage),
                Box::new(semantics::SemanticsStage),
                Box::new(derivations::DerivationsStage),
                Box::new(joins::JoinsStage),
                Box::new(execution::ExecutionStage),
            ],
        }
    }

    /// Append a stage after the built-in ones
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Stage names, in run order (the variant compilation stage runs first)
    pub fn stage_names(&self) -> Vec<&'static str> {
        std::iter::once(compilation::STAGE)
            .chain(self.stages.iter().map(|s| s.name()))
            .collect()
    }

    async fn run_stages(&self, metric: &SemanticMetric, ctx: &DoctorContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for stage in &self.stages {
            match AssertUnwindSafe(stage.run(metric, ctx)).catch_unwind().await {
                Ok(found) => {
                    log::debug!(
                        "Doctor stage '{}' reported {} finding(s) for '{}'",
                        stage.name(),
                        found.len(),
                        metric.id
                    );
                    findings.extend(found);
                }
                Err(payload) => {
                    log::warn!("Doctor stage '{}' panicked on '{}'", stage.name(), metric.id);
                    findings.push(Finding::error(
                        stage.name(),
                        "DR000",
                        format!("stage panicked: {}", panic_message(payload.as_ref())),
                    ));
                }
            }
        }
        findings
    }

    /// Diagnose a metric or variant
    pub async fn diagnose(
        &self,
        source: &MetricSource,
        store: &dyn MetricStore,
        ctx: &DoctorContext<'_>,
    ) -> DiagnoseResponse {
        let mut findings = Vec::new();
        let mut target = match source {
            MetricSource::Metric(metric) => {
                findings.extend(self.run_stages(metric, ctx).await);
                Target::Metric(metric.clone())
            }
            MetricSource::Variant(variant) => {
                let compiled = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    compilation::compile_variant(variant, store, ctx.options)
                }));
                match compiled {
                    Ok(outcome) => {
                        findings.extend(outcome.findings);
                        match &outcome.materialized {
                            Some(metric) => findings.extend(self.run_stages(metric, ctx).await),
                            None => findings.push(Finding::info(
                                compilation::STAGE,
                                "DR009",
                                "later stages skipped because the variant does not resolve",
                            )),
                        }
                        Target::Variant {
                            variant: variant.clone(),
                            materialized: outcome.materialized,
                        }
                    }
                    Err(payload) => {
                        findings.push(Finding::error(
                            compilation::STAGE,
                            "DR000",
                            format!("stage panicked: {}", panic_message(payload.as_ref())),
                        ));
                        Target::Variant {
                            variant: variant.clone(),
                            materialized: None,
                        }
                    }
                }
            }
        };

        let mut applied: Vec<&Fix> = Vec::new();
        let mut suggestions = Vec::new();
        for fix in findings.iter().filter_map(|f| f.fix.as_ref()) {
            if applied.contains(&fix) {
                continue;
            }
            applied.push(fix);
            if let Some(suggestion) = target.apply(fix) {
                suggestions.push(suggestion);
            }
        }

        let healthy = !findings.iter().any(Finding::is_error);
        DiagnoseResponse {
            healthy,
            diagnosis: Diagnosis {
                explanation: explain(source, &findings),
                suggestions,
            },
            findings,
        }
    }
}

fn explain(source: &MetricSource, findings: &[Finding]) -> String {
    let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();
    let warnings = findings.iter().filter(|f| f.severity == Severity::Warning).count();
    let subject = format!("{} '{}'", source.kind(), source.id());

    let mut lines = Vec::with_capacity(findings.len() + 1);
    if errors == 0 && warnings == 0 {
        lines.push(format!("No problems found in {}.", subject));
    } else {
        lines.push(format!(
            "Found {} error(s) and {} warning(s) in {}.",
            errors, warnings, subject
        ));
    }
    for f in findings {
        lines.push(format!("[{}] {} {}: {}", f.code, f.stage, f.severity, f.message));
    }
    lines.join("\n")
}

#[cfg(test)]
#[path = "doctor_test.rs"]
mod tests;

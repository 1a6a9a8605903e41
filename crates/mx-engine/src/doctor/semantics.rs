//! Stage 2: parameters, time grains, ordering, and data model binding

use super::fix::Fix;
use super::{DoctorContext, Finding, Stage};
use async_trait::async_trait;
use mx_core::{OrderTarget, SemanticMetric};
use mx_sql::params::metric_placeholders;
use mx_sql::{bind_parameters, dialect_for, sample_parameters};

const STAGE: &str = "semantics";

pub(super) struct SemanticsStage;

#[async_trait]
impl Stage for SemanticsStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn description(&self) -> &'static str {
        "Parameter declarations, time grains, ordering, and data model binding"
    }

    async fn run(&self, metric: &SemanticMetric, ctx: &DoctorContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        // Parameters
        let dialect = dialect_for(ctx.dialect);
        if let Err(err) = bind_parameters(metric, &sample_parameters(metric), dialect.as_ref()) {
            findings.push(Finding::error(STAGE, "DR201", err.to_string()));
        }
        let used = metric_placeholders(metric);
        for param in &metric.parameters {
            if !used.contains(&param.name) {
                findings.push(
                    Finding::warning(
                        STAGE,
                        "DR202",
                        format!("parameter '{}' is declared but never used", param.name),
                    )
                    .with_component(&param.name),
                );
            }
        }

        // Time grains
        for dim in &metric.dimensions {
            match (dim.is_time(), dim.grain) {
                (false, Some(grain)) => findings.push(
                    Finding::error(
                        STAGE,
                        "DR203",
                        format!(
                            "dimension '{}' has grain '{}' but is not a time dimension",
                            dim.name, grain
                        ),
                    )
                    .with_component(&dim.name),
                ),
                (true, None) => findings.push(
                    Finding::info(
                        STAGE,
                        "DR204",
                        format!("time dimension '{}' has no grain and groups raw timestamps", dim.name),
                    )
                    .with_component(&dim.name),
                ),
                _ => {}
            }
        }

        // Ordering
        if metric.ordered {
            let outputs = metric.output_names();
            for (idx, item) in metric.order.iter().enumerate() {
                let problem = match item.target() {
                    None => Some("must set exactly one of reference, column, or position".to_string()),
                    Some(OrderTarget::Reference(name)) if !outputs.contains(&name) => {
                        Some(format!("references unknown output '{}'", name))
                    }
                    Some(OrderTarget::Position(pos)) if pos == 0 || pos > outputs.len() => Some(
                        format!("position {} is outside 1..={}", pos, outputs.len()),
                    ),
                    _ => None,
                };
                if let Some(problem) = problem {
                    findings.push(Finding::error(
                        STAGE,
                        "DR205",
                        format!("order entry #{} {}", idx + 1, problem),
                    ));
                }
            }
        } else if !metric.order.is_empty() {
            findings.push(Finding::info(
                STAGE,
                "DR206",
                "order entries are ignored because ordered is false",
            ));
        }

        // Data model
        if let Some(expected) = ctx.expected_data_model {
            let bound = metric.data_model_id.as_ref().map(|id| id.as_str());
            if bound != Some(expected) {
                let message = match bound {
                    Some(bound) => format!(
                        "metric is bound to data model '{}' but the project uses '{}'",
                        bound, expected
                    ),
                    None => format!("metric is not bound to data model '{}'", expected),
                };
                findings.push(Finding::error(STAGE, "DR207", message).with_fix(Some(
                    Fix::SetDataModel {
                        data_model_id: expected.to_string(),
                    },
                )));
            }
        }

        findings
    }
}

//! Stage 5: compile, generate, syntax-check, and dry-run

use super::{DoctorContext, Finding, Stage};
use async_trait::async_trait;
use mx_compile::compile_metric;
use mx_core::{CancelToken, SemanticMetric};
use mx_sql::{dialect_for, generate_sql, sample_parameters, validate_syntax};

const STAGE: &str = "execution";

pub(super) struct ExecutionStage;

#[async_trait]
impl Stage for ExecutionStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn description(&self) -> &'static str {
        "Strict compilation, SQL generation with sample parameters, syntax check, and dry run"
    }

    async fn run(&self, metric: &SemanticMetric, ctx: &DoctorContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let cancel = CancelToken::new();

        if let Err(err) = compile_metric(metric, ctx.options, &cancel) {
            findings.push(Finding::error(STAGE, "DR501", err.to_string()));
        }

        let params = sample_parameters(metric);
        let statement = match generate_sql(metric, &params, ctx.dialect, &cancel) {
            Ok(statement) => statement,
            Err(err) => {
                findings.push(Finding::error(STAGE, "DR502", err.to_string()));
                return findings;
            }
        };

        let dialect = dialect_for(ctx.dialect);
        if let Err(err) = validate_syntax(&statement.sql, dialect.as_ref()) {
            findings.push(Finding::error(
                STAGE,
                "DR503",
                format!("generated SQL does not parse: {}", err),
            ));
            return findings;
        }

        match ctx.executor {
            Some(executor) => {
                if let Err(err) = executor.dry_run(&statement.sql).await {
                    findings.push(Finding::error(STAGE, "DR504", format!("dry run failed: {}", err)));
                }
            }
            None => findings.push(Finding::info(
                STAGE,
                "DR505",
                "no connector configured, so the dry run was skipped",
            )),
        }

        findings
    }
}

//! Stage 1: required fields, content, and duplicate names

use super::fix::Fix;
use super::{DoctorContext, Finding, Stage};
use async_trait::async_trait;
use mx_compile::joins::referenced_tables;
use mx_core::{closest_name, ComponentCategory, SemanticMetric};

const STAGE: &str = "structure";

pub(super) struct StructureStage;

/// First referenced table the schema knows about
fn table_from_schema(metric: &SemanticMetric, ctx: &DoctorContext<'_>) -> Option<Fix> {
    let schema = ctx.schema?;
    referenced_tables(metric)
        .into_iter()
        .find(|t| schema.has_table(t))
        .map(|table_name| Fix::SetTableName { table_name })
}

#[async_trait]
impl Stage for StructureStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn description(&self) -> &'static str {
        "Required fields, non-empty content, and unique component names"
    }

    async fn run(&self, metric: &SemanticMetric, ctx: &DoctorContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();

        if metric.name.trim().is_empty() {
            findings.push(Finding::error(STAGE, "DR101", "metric has an empty name"));
        }

        match (&metric.table_name, &metric.query) {
            (None, None) => findings.push(
                Finding::error(STAGE, "DR102", "metric has neither table_name nor query")
                    .with_fix(table_from_schema(metric, ctx)),
            ),
            (Some(table), query) => {
                if let Some(schema) = ctx.schema {
                    if !schema.has_table(table) {
                        let known = schema.table_names();
                        let fix = closest_name(table, known.iter().copied(), ctx.options.suggestion_threshold)
                            .map(|table_name| Fix::SetTableName { table_name })
                            .or_else(|| table_from_schema(metric, ctx));
                        findings.push(
                            Finding::error(
                                STAGE,
                                "DR103",
                                format!("table '{}' does not exist in the schema", table),
                            )
                            .with_fix(fix),
                        );
                    }
                }
                if query.is_some() {
                    findings.push(Finding::warning(
                        STAGE,
                        "DR104",
                        "both table_name and query are set; query is ignored",
                    ));
                }
            }
            (None, Some(query)) if query.trim().is_empty() => {
                findings.push(Finding::error(STAGE, "DR102", "metric query is empty"));
            }
            (None, Some(_)) => {}
        }

        if !metric.has_content() {
            findings.push(Finding::error(
                STAGE,
                "DR105",
                "metric needs at least one measure, dimension, or filter",
            ));
        }

        for category in ComponentCategory::ALL {
            let names = metric.component_names(category);
            let mut reported: Vec<&str> = Vec::new();
            for (idx, name) in names.iter().enumerate() {
                if names[..idx].contains(name) && !reported.contains(name) {
                    reported.push(*name);
                    findings.push(
                        Finding::error(
                            STAGE,
                            "DR106",
                            format!("duplicate {} name '{}'", category.singular(), name),
                        )
                        .with_component(name),
                    );
                }
            }
        }

        let expressions = metric
            .measures
            .iter()
            .map(|m| ("measure", m.name.as_str(), m.query.as_str()))
            .chain(
                metric
                    .dimensions
                    .iter()
                    .map(|d| ("dimension", d.name.as_str(), d.query.as_str())),
            );
        for (kind, name, query) in expressions {
            if query.trim().is_empty() {
                findings.push(
                    Finding::error(STAGE, "DR107", format!("{} '{}' has an empty query", kind, name))
                        .with_component(name),
                );
            }
        }

        findings
    }
}

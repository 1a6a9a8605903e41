//! Stage 4: join attachment, join conditions, and missing joins

use super::fix::Fix;
use super::{DoctorContext, Finding, Stage};
use async_trait::async_trait;
use mx_compile::find_missing_joins;
use mx_compile::joins::{reachable_tables, referenced_tables};
use mx_core::sql_utils::{same_table, table_base_name};
use mx_core::{Dialect, JoinType, SemanticMetric};

const STAGE: &str = "joins";

pub(super) struct JoinsStage;

#[async_trait]
impl Stage for JoinsStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn description(&self) -> &'static str {
        "Join attachment, join conditions, and joins the expressions need"
    }

    async fn run(&self, metric: &SemanticMetric, ctx: &DoctorContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let Some(base) = metric.base_relation() else {
            return findings;
        };

        let mut attached: Vec<String> = vec![table_base_name(base).to_ascii_lowercase()];
        for join in &metric.joins {
            let touches = attached
                .iter()
                .any(|t| same_table(t, &join.left_table) || same_table(t, &join.right_table));
            if touches {
                for table in [&join.left_table, &join.right_table] {
                    let name = table_base_name(table).to_ascii_lowercase();
                    if !attached.contains(&name) {
                        attached.push(name);
                    }
                }
            } else {
                findings.push(
                    Finding::error(
                        STAGE,
                        "DR401",
                        format!(
                            "join '{}' connects '{}' and '{}', neither of which is joined to '{}'",
                            join.name, join.left_table, join.right_table, base
                        ),
                    )
                    .with_component(&join.name),
                );
            }

            if join.conditions.is_empty() {
                findings.push(
                    Finding::error(STAGE, "DR402", format!("join '{}' has no conditions", join.name))
                        .with_component(&join.name),
                );
            }
            if let Some(schema) = ctx.schema {
                for cond in &join.conditions {
                    let sides = [
                        (&join.left_table, &cond.left_column),
                        (&join.right_table, &cond.right_column),
                    ];
                    for (table, column) in sides {
                        if schema.has_table(table) && !schema.has_column(table, column) {
                            findings.push(
                                Finding::warning(
                                    STAGE,
                                    "DR403",
                                    format!(
                                        "join '{}' uses '{}.{}', which is not in the schema",
                                        join.name, table, column
                                    ),
                                )
                                .with_component(&join.name),
                            );
                        }
                    }
                }
            }
            if join.join_type == JoinType::Full && ctx.dialect == Dialect::MySql {
                findings.push(
                    Finding::error(
                        STAGE,
                        "DR406",
                        format!("join '{}' is a FULL join, which MySQL does not support", join.name),
                    )
                    .with_component(&join.name),
                );
            }
        }

        match ctx.schema {
            Some(schema) => {
                let report = find_missing_joins(metric, schema);
                if !report.suggestions.is_empty() {
                    let explained: Vec<String> =
                        report.suggestions.iter().map(|s| s.explanation.clone()).collect();
                    findings.push(
                        Finding::error(
                            STAGE,
                            "DR404",
                            format!("expressions reference unjoined tables: {}", explained.join("; ")),
                        )
                        .with_fix(Some(Fix::AddJoins {
                            joins: report.joins(),
                        })),
                    );
                }
                for table in &report.unresolved {
                    findings.push(Finding::error(
                        STAGE,
                        "DR405",
                        format!("table '{}' is referenced but no join to it could be inferred", table),
                    ));
                }
            }
            None => {
                let reachable = reachable_tables(metric);
                let missing: Vec<String> = referenced_tables(metric)
                    .into_iter()
                    .filter(|t| !reachable.contains(t))
                    .collect();
                if !missing.is_empty() {
                    findings.push(Finding::error(
                        STAGE,
                        "DR404",
                        format!("expressions reference unjoined tables: {}", missing.join(", ")),
                    ));
                    findings.push(Finding::info(
                        STAGE,
                        "DR407",
                        "no schema metadata loaded, so joins could not be inferred",
                    ));
                }
            }
        }

        findings
    }
}

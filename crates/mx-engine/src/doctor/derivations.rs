//! Stage 3: derived measures

use super::fix::Fix;
use super::{DoctorContext, Finding, Stage};
use async_trait::async_trait;
use mx_core::{closest_name, ComponentCategory, DerivationKind, SemanticMetric};

const STAGE: &str = "derivations";

pub(super) struct DerivationsStage;

/// Ordering dimension to propose: the first time dimension, else the first dimension
fn default_order_dimension(metric: &SemanticMetric) -> Option<&str> {
    metric
        .dimensions
        .iter()
        .find(|d| d.is_time())
        .or_else(|| metric.dimensions.first())
        .map(|d| d.name.as_str())
}

#[async_trait]
impl Stage for DerivationsStage {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn description(&self) -> &'static str {
        "Measure references, ordering, and partitioning of derived measures"
    }

    async fn run(&self, metric: &SemanticMetric, ctx: &DoctorContext<'_>) -> Vec<Finding> {
        let threshold = ctx.options.suggestion_threshold;
        let measures = metric.component_names(ComponentCategory::Measures);
        let dimensions = metric.component_names(ComponentCategory::Dimensions);
        let mut findings = Vec::new();

        for derived in &metric.derived_measures {
            let name = derived.name.as_str();

            if measures.contains(&name) || dimensions.contains(&name) {
                findings.push(
                    Finding::error(
                        STAGE,
                        "DR306",
                        format!("derived measure '{}' shadows a measure or dimension", name),
                    )
                    .with_component(name),
                );
            }

            for measure in derived.measure_refs() {
                if !measures.contains(&measure) {
                    let fix = closest_name(measure, measures.iter().copied(), threshold).map(|to| {
                        Fix::RenameMeasureRef {
                            derived: name.to_string(),
                            from: measure.to_string(),
                            to,
                        }
                    });
                    findings.push(
                        Finding::error(
                            STAGE,
                            "DR301",
                            format!("derived measure '{}' references unknown measure '{}'", name, measure),
                        )
                        .with_component(name)
                        .with_fix(fix),
                    );
                }
            }

            if let DerivationKind::Ratio {
                numerator,
                denominator,
            } = &derived.kind
            {
                if numerator == denominator {
                    findings.push(
                        Finding::warning(
                            STAGE,
                            "DR307",
                            format!("ratio '{}' divides '{}' by itself", name, numerator),
                        )
                        .with_component(name),
                    );
                }
            }

            let order = derived.order_dimension();
            match order {
                None if derived.requires_order() => {
                    let fix = default_order_dimension(metric).map(|dimension| Fix::SetOrderDimension {
                        derived: name.to_string(),
                        dimension: dimension.to_string(),
                    });
                    findings.push(
                        Finding::error(
                            STAGE,
                            "DR302",
                            format!("window derivation '{}' has no order_dimension", name),
                        )
                        .with_component(name)
                        .with_fix(fix),
                    );
                }
                Some(dim) if !dimensions.contains(&dim) => {
                    let fix = closest_name(dim, dimensions.iter().copied(), threshold)
                        .or_else(|| default_order_dimension(metric).map(str::to_string))
                        .map(|dimension| Fix::SetOrderDimension {
                            derived: name.to_string(),
                            dimension,
                        });
                    findings.push(
                        Finding::error(
                            STAGE,
                            "DR303",
                            format!("order_dimension '{}' of '{}' is not a dimension", dim, name),
                        )
                        .with_component(name)
                        .with_fix(fix),
                    );
                }
                _ => {}
            }

            let partition = derived.partition_by();
            let unknown: Vec<&String> = partition
                .iter()
                .filter(|p| !dimensions.contains(&p.as_str()))
                .collect();
            let shadows_order = order.is_some_and(|o| partition.iter().any(|p| p == o));
            if !unknown.is_empty() || shadows_order {
                let mut corrected: Vec<String> = Vec::new();
                for p in partition {
                    let replacement = if dimensions.contains(&p.as_str()) {
                        Some(p.clone())
                    } else {
                        closest_name(p, dimensions.iter().copied(), threshold)
                    };
                    if let Some(r) = replacement {
                        if Some(r.as_str()) != order && !corrected.contains(&r) {
                            corrected.push(r);
                        }
                    }
                }
                let fix = Some(Fix::SetPartitionBy {
                    derived: name.to_string(),
                    partition_by: corrected,
                });
                let finding = if unknown.is_empty() {
                    Finding::warning(
                        STAGE,
                        "DR305",
                        format!(
                            "'{}' partitions by its own order_dimension, so every window holds one row",
                            name
                        ),
                    )
                } else {
                    Finding::error(
                        STAGE,
                        "DR304",
                        format!(
                            "partition_by of '{}' names unknown dimension(s): {}",
                            name,
                            unknown
                                .iter()
                                .map(|s| s.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                    )
                };
                findings.push(finding.with_component(name).with_fix(fix));
            }
        }

        findings
    }
}

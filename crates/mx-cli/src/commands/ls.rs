//! List command implementation

use anyhow::Result;
use chrono::{DateTime, Utc};
use mx_core::MetricSource;
use serde::Serialize;

use crate::cli::{GlobalArgs, LsArgs, OutputFormat};
use crate::commands::common;
use crate::context::ProjectContext;

/// Definition information for display
#[derive(Debug, Serialize)]
struct DefinitionInfo {
    id: String,
    kind: &'static str,
    name: String,
    /// Base table of a metric, source id of a variant
    source: String,
    measures: usize,
    dimensions: usize,
}

impl From<&MetricSource> for DefinitionInfo {
    fn from(source: &MetricSource) -> Self {
        let (from, measures, dimensions) = match source {
            MetricSource::Metric(m) => (
                m.base_relation().unwrap_or("-").to_string(),
                m.measures.len() + m.derived_measures.len(),
                m.dimensions.len(),
            ),
            MetricSource::Variant(v) => (
                v.source_metric_id.to_string(),
                v.overrides.add.measures.len() + v.overrides.add.derived_measures.len(),
                v.overrides.add.dimensions.len(),
            ),
        };
        Self {
            id: source.id().to_string(),
            kind: source.kind(),
            name: source.name().to_string(),
            source: from,
            measures,
            dimensions,
        }
    }
}

/// List results for JSON output
#[derive(Debug, Serialize)]
struct ListResults {
    timestamp: DateTime<Utc>,
    definition_count: usize,
    definitions: Vec<DefinitionInfo>,
}

/// Execute the ls command
pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let definitions: Vec<DefinitionInfo> = ctx
        .engine
        .definitions()
        .iter()
        .map(DefinitionInfo::from)
        .collect();

    match args.output {
        OutputFormat::Json => common::print_json(&ListResults {
            timestamp: Utc::now(),
            definition_count: definitions.len(),
            definitions,
        })?,
        OutputFormat::Table => {
            if definitions.is_empty() {
                println!("No metrics found in project.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = definitions
                .iter()
                .map(|d| {
                    vec![
                        d.id.clone(),
                        d.kind.to_string(),
                        d.source.clone(),
                        d.name.clone(),
                    ]
                })
                .collect();
            common::print_table(&["ID", "KIND", "SOURCE", "NAME"], &rows);
            println!();
            println!("{} definitions found", definitions.len());
        }
    }

    Ok(())
}

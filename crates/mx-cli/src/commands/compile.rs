//! Compile command implementation

use anyhow::Result;
use mx_core::{CancelToken, ComponentCategory, SemanticMetric};
use serde::Serialize;

use crate::cli::{CompileArgs, GlobalArgs, OutputFormat};
use crate::commands::common;
use crate::context::ProjectContext;

/// Compile result for JSON output
#[derive(Debug, Serialize)]
struct CompileOutput<'a> {
    id: &'a str,
    lineage: Vec<String>,
    definition_hash: String,
    metric: &'a SemanticMetric,
}

/// Execute the compile command
pub async fn execute(args: &CompileArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let resolved = ctx.engine.compile(&args.id, &CancelToken::new())?;
    let lineage: Vec<String> = resolved.lineage().iter().map(|id| id.to_string()).collect();
    ctx.verbose(&format!("Resolved through {} variant(s)", resolved.depth()));

    match args.output {
        OutputFormat::Json => common::print_json(&CompileOutput {
            id: &args.id,
            lineage,
            definition_hash: resolved.definition_hash(),
            metric: resolved.metric(),
        })?,
        OutputFormat::Table => {
            let metric = resolved.metric();
            println!("Metric: {} ({})", metric.id, metric.name);
            println!("Lineage: {}", lineage.join(" -> "));
            if let Some(base) = metric.base_relation() {
                println!("Base: {}", base);
            }
            if let Some(model) = &metric.data_model_id {
                println!("Data model: {}", model);
            }
            println!("Definition hash: {}", resolved.definition_hash());
            println!();

            let rows: Vec<Vec<String>> = ComponentCategory::ALL
                .iter()
                .flat_map(|&category| {
                    metric
                        .component_names(category)
                        .into_iter()
                        .map(move |name| vec![category.singular().to_string(), name.to_string()])
                })
                .collect();
            common::print_table(&["COMPONENT", "NAME"], &rows);
        }
    }

    Ok(())
}

//! Run command implementation

use anyhow::Result;
use mx_engine::{ExecuteRequest, MetricResult};

use crate::cli::{GlobalArgs, OutputFormat, RunArgs};
use crate::commands::common;
use crate::context::ProjectContext;

/// Execute the run command
pub async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let request = ExecuteRequest {
        metric_id: args.id.clone(),
        parameters: common::parse_params(&args.params)?,
        consumer: args.consumer.clone(),
        bypass_cache: args.no_cache,
        ttl: None,
    };

    let result = ctx.engine.execute_metric(&request).await?;
    ctx.verbose(&format!("SQL:\n{}", result.sql));
    if let Some(rollup) = &result.rollup {
        ctx.verbose(&format!("Answered by rollup '{}'", rollup));
    }

    match args.output {
        OutputFormat::Json => common::print_json(&result)?,
        OutputFormat::Table => print_rows(&result),
    }

    Ok(())
}

/// Print result rows with a summary line
fn print_rows(result: &MetricResult) {
    let headers: Vec<&str> = result
        .rows
        .first()
        .map(|row| row.keys().map(String::as_str).collect())
        .unwrap_or_default();

    if !headers.is_empty() {
        let rows: Vec<Vec<String>> = result
            .rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|h| row.get(*h).map(common::cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        common::print_table(&headers, &rows);
        println!();
    }

    let source = match (&result.rollup, result.cache_hit) {
        (_, true) => " (cached)".to_string(),
        (Some(rollup), false) => format!(" (rollup {})", rollup),
        (None, false) => String::new(),
    };
    println!(
        "{} row(s) in {}ms{}",
        result.row_count, result.execution_time_ms, source
    );
}

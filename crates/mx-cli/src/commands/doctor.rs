//! Doctor command implementation

use anyhow::Result;

use crate::cli::{DoctorArgs, GlobalArgs, OutputFormat};
use crate::commands::common::{self, ExitCode};
use crate::context::ProjectContext;

/// Execute the doctor command
///
/// Exits with status 1 when the definition is unhealthy.
pub async fn execute(args: &DoctorArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let response = ctx.engine.diagnose(&args.id).await;
    ctx.verbose(&format!(
        "{} finding(s), {} suggestion(s)",
        response.findings.len(),
        response.diagnosis.suggestions.len()
    ));

    match args.output {
        OutputFormat::Json => common::print_json(&response)?,
        OutputFormat::Table => {
            println!("{}", response.diagnosis.explanation);
            for (idx, suggestion) in response.diagnosis.suggestions.iter().enumerate() {
                if idx == 0 {
                    println!();
                    println!("Suggested fixes (each includes the ones above it):");
                }
                println!("  {}. {}", idx + 1, suggestion.description);
            }
            if global.verbose {
                if let Some(last) = response.diagnosis.suggestions.last() {
                    println!();
                    println!("Fixed definition:");
                    common::print_json(&last.fixed_entity_json)?;
                }
            }
        }
    }

    if !response.healthy {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

//! SQL command implementation

use anyhow::{Context, Result};
use mx_core::{CancelToken, Dialect};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cli::{GlobalArgs, OutputFormat, SqlArgs};
use crate::commands::common;
use crate::context::ProjectContext;

/// Rendered SQL for JSON output
#[derive(Debug, Serialize)]
struct SqlOutput<'a> {
    id: &'a str,
    dialect: Dialect,
    sql: &'a str,
    /// Parameter name to the SQL literal substituted for it
    parameters: &'a BTreeMap<String, String>,
}

/// Execute the sql command
pub async fn execute(args: &SqlArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let dialect = args
        .dialect
        .as_deref()
        .map(str::parse::<Dialect>)
        .transpose()
        .context("Invalid SQL dialect")?;
    let params = common::parse_params(&args.params)?;

    let statement = ctx
        .engine
        .generate_sql(&args.id, &params, dialect, &CancelToken::new())?;

    match args.output {
        OutputFormat::Json => common::print_json(&SqlOutput {
            id: &args.id,
            dialect: statement.dialect,
            sql: &statement.sql,
            parameters: &statement.parameters,
        })?,
        OutputFormat::Table => {
            for (name, literal) in &statement.parameters {
                ctx.verbose(&format!("{} = {}", name, literal));
            }
            println!("{}", statement.sql);
        }
    }

    Ok(())
}

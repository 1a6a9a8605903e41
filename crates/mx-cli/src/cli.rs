//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Metrix - compile, render, run, and diagnose semantic metrics
#[derive(Parser, Debug)]
#[command(name = "mx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List metrics and variants
    Ls(LsArgs),

    /// Resolve a metric or variant into its materialized definition
    Compile(CompileArgs),

    /// Render SQL for a metric or variant
    Sql(SqlArgs),

    /// Execute a metric or variant against the database
    Run(RunArgs),

    /// Diagnose a metric or variant and suggest fixes
    Doctor(DoctorArgs),
}

/// Output formats shared by every command
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output
    Table,
    /// JSON output
    Json,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the compile command
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Metric or variant id
    pub id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the sql command
#[derive(Args, Debug)]
pub struct SqlArgs {
    /// Metric or variant id
    pub id: String,

    /// Override SQL dialect (postgres, mysql, bigquery, duckdb, snowflake)
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Parameter value as name=value (repeatable)
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Metric or variant id
    pub id: String,

    /// Parameter value as name=value (repeatable)
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Skip the result cache
    #[arg(long)]
    pub no_cache: bool,

    /// Consumer context (dashboard, user, API client) for the cache key
    #[arg(long)]
    pub consumer: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the doctor command
#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Metric or variant id
    pub id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

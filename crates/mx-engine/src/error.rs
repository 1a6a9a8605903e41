//! Error types for mx-engine

use mx_compile::CompileError;
use mx_core::CoreError;
use mx_db::DbError;
use mx_sql::SqlError;
use std::collections::BTreeMap;
use thiserror::Error;

fn format_parameters(parameters: &BTreeMap<String, String>) -> String {
    if parameters.is_empty() {
        return String::new();
    }
    let items: Vec<String> = parameters
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!(" [parameters: {}]", items.join(", "))
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Variant resolution or integrity failure
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Parameter binding or SQL generation failure
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// Configuration or definition loading failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// X001: The data source could not be reached or did not answer in time
    #[error("[X001] Data source connection failed: {message}")]
    DataSourceConnection { message: String },

    /// X002: The data source rejected or failed the query
    #[error("[X002] Query execution failed: {message}\n  SQL: {sql}{}", format_parameters(.parameters))]
    QueryExecution {
        message: String,
        sql: String,
        parameters: BTreeMap<String, String>,
    },

    /// X003: Cache backend failure
    #[error("[X003] Cache error: {0}")]
    Cache(String),

    /// X004: Another request computing the same cache key failed
    #[error("[X004] Shared computation failed: {0}")]
    SharedComputation(String),

    /// X005: A post-query format could not be applied
    #[error("[X005] Format '{format}' on '{field}' failed: {message}")]
    Format {
        field: String,
        format: String,
        message: String,
    },
}

/// Result type alias for EngineError
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Wrap a connector error with the SQL and parameters that caused it
    pub fn from_db(err: DbError, sql: &str, parameters: &BTreeMap<String, String>) -> Self {
        if err.is_connection() {
            EngineError::DataSourceConnection {
                message: err.to_string(),
            }
        } else {
            EngineError::QueryExecution {
                message: err.to_string(),
                sql: sql.to_string(),
                parameters: parameters.clone(),
            }
        }
    }
}

//! Error types for mx-sql

use thiserror::Error;

/// SQL parsing and generation errors
#[derive(Error, Debug)]
pub enum SqlError {
    /// SQL parse error (S001)
    #[error("[S001] SQL parse error at line {line}, column {column}: {message}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    /// Empty SQL (S002)
    #[error("[S002] SQL is empty")]
    EmptySql,

    /// Parameter missing, undeclared, or of the wrong type (S003)
    #[error("[S003] Parameter '{parameter}' is invalid: {message}")]
    ParameterValidation { parameter: String, message: String },

    /// Metric cannot be turned into SQL (S004)
    #[error("[S004] SQL generation failed for '{metric}': {message}")]
    Generation { metric: String, message: String },

    /// Generation was cancelled (S005)
    #[error("[S005] SQL generation cancelled")]
    Cancelled,
}

impl SqlError {
    pub(crate) fn generation(metric: &str, message: impl Into<String>) -> Self {
        SqlError::Generation {
            metric: metric.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn parameter(parameter: &str, message: impl Into<String>) -> Self {
        SqlError::ParameterValidation {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;

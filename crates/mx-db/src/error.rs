//! Error types for mx-db

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Mutex poisoned (D004)
    #[error("[D004] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Internal error (D005)
    #[error("[D005] Internal database error: {0}")]
    Internal(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Whether the failure is about reaching the database rather than the SQL
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::ConnectionError(_) | DbError::MutexPoisoned(_))
    }
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error has no structured variants for catalog errors, so
        // classify by message with narrow patterns.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}

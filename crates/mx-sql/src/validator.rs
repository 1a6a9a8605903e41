//! Syntax checks for generated SQL

use crate::dialect::SqlDialect;
use crate::error::{SqlError, SqlResult};

/// Parse `sql` with the dialect's parser; at least one statement is required
pub fn validate_syntax(sql: &str, dialect: &dyn SqlDialect) -> SqlResult<()> {
    if sql.trim().is_empty() {
        return Err(SqlError::EmptySql);
    }
    let statements = dialect.parse(sql)?;
    if statements.is_empty() {
        return Err(SqlError::EmptySql);
    }
    Ok(())
}

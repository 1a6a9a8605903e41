//! SQL dialect abstraction

use mx_core::{Dialect as DialectKind, TimeGrain};
use sqlparser::ast::Statement;
use sqlparser::dialect::{
    BigQueryDialect as SqlParserBigQuery, Dialect, DuckDbDialect as SqlParserDuckDb,
    MySqlDialect as SqlParserMySql, PostgreSqlDialect as SqlParserPostgres,
    SnowflakeDialect as SqlParserSnowflake,
};
use sqlparser::parser::Parser;

use crate::error::{SqlError, SqlResult};
use mx_core::sql_utils::escape_sql_string;

/// Logical types accepted by `cast` formats
pub const LOGICAL_TYPES: [&str; 6] = ["string", "integer", "number", "date", "timestamp", "boolean"];

/// Trait for SQL dialect implementations
pub trait SqlDialect: Send + Sync {
    /// Get the underlying sqlparser dialect
    fn parser_dialect(&self) -> &dyn Dialect;

    /// Parse SQL into AST statements
    fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        Parser::parse_sql(self.parser_dialect(), sql).map_err(|e| {
            let msg = e.to_string();
            let (line, column) = parse_location_from_error(&msg);
            SqlError::ParseError {
                message: msg,
                line,
                column,
            }
        })
    }

    /// Dialect this implementation generates
    fn kind(&self) -> DialectKind;

    /// Get the dialect name
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Quote an identifier for this dialect
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote each dot-separated part of a possibly qualified name
    fn quote_qualified(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote_ident(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Truncate a date/timestamp expression to `grain`
    fn date_trunc(&self, expr: &str, grain: TimeGrain) -> String {
        format!("DATE_TRUNC('{}', {})", grain.as_str(), expr)
    }

    /// Physical type for a logical type name (see [`LOGICAL_TYPES`])
    fn type_name(&self, logical: &str) -> Option<&'static str>;

    /// `CAST(expr AS type)` for a logical type name
    fn cast(&self, expr: &str, logical: &str) -> Option<String> {
        self.type_name(logical)
            .map(|ty| format!("CAST({} AS {})", expr, ty))
    }

    /// Single-quoted string literal
    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", escape_sql_string(value))
    }

    /// Date literal for an ISO `YYYY-MM-DD` string
    fn date_literal(&self, iso_date: &str) -> String {
        format!("DATE {}", self.string_literal(iso_date))
    }

    /// Whether `FULL [OUTER] JOIN` is supported
    fn supports_full_join(&self) -> bool {
        true
    }
}

/// Parse line and column from sqlparser error message.
///
/// sqlparser's `ParserError` is a simple string wrapper with no structured
/// location data, so we extract "Line: N, Column: M" from the error message text.
fn parse_location_from_error(msg: &str) -> (usize, usize) {
    let Some(line_idx) = msg.find("Line: ") else {
        return (0, 0);
    };
    let line_start = line_idx + 6;
    let Some(comma_idx) = msg[line_start..].find(',') else {
        return (0, 0);
    };
    let Ok(line) = msg[line_start..line_start + comma_idx]
        .trim()
        .parse::<usize>()
    else {
        return (0, 0);
    };
    let Some(col_idx) = msg.find("Column: ") else {
        return (0, 0);
    };
    let col_start = col_idx + 8;
    let col_end = msg[col_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| col_start + i)
        .unwrap_or(msg.len());
    let Ok(column) = msg[col_start..col_end].trim().parse::<usize>() else {
        return (0, 0);
    };
    (line, column)
}

/// Build the implementation for a configured dialect
pub fn dialect_for(kind: DialectKind) -> Box<dyn SqlDialect> {
    match kind {
        DialectKind::Postgres => Box::new(PostgresDialect::new()),
        DialectKind::MySql => Box::new(MySqlDialect::new()),
        DialectKind::BigQuery => Box::new(BigQueryDialect::new()),
        DialectKind::DuckDb => Box::new(DuckDbDialect::new()),
        DialectKind::Snowflake => Box::new(SnowflakeDialect::new()),
    }
}

/// PostgreSQL dialect
pub struct PostgresDialect {
    dialect: SqlParserPostgres,
}

impl PostgresDialect {
    /// Create a new PostgreSQL dialect
    pub fn new() -> Self {
        Self {
            dialect: SqlParserPostgres {},
        }
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for PostgresDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn type_name(&self, logical: &str) -> Option<&'static str> {
        match logical {
            "string" => Some("TEXT"),
            "integer" => Some("BIGINT"),
            "number" => Some("DOUBLE PRECISION"),
            "date" => Some("DATE"),
            "timestamp" => Some("TIMESTAMP"),
            "boolean" => Some("BOOLEAN"),
            _ => None,
        }
    }
}

/// MySQL dialect
pub struct MySqlDialect {
    dialect: SqlParserMySql,
}

impl MySqlDialect {
    /// Create a new MySQL dialect
    pub fn new() -> Self {
        Self {
            dialect: SqlParserMySql {},
        }
    }
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for MySqlDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    // Backslash is an escape character unless NO_BACKSLASH_ESCAPES is set
    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    // MySQL has no DATE_TRUNC; every grain yields a DATE or DATETIME
    fn date_trunc(&self, expr: &str, grain: TimeGrain) -> String {
        match grain {
            TimeGrain::Hour => format!(
                "STR_TO_DATE(DATE_FORMAT({}, '%Y-%m-%d %H:00:00'), '%Y-%m-%d %H:%i:%s')",
                expr
            ),
            TimeGrain::Day => format!("DATE({})", expr),
            TimeGrain::Week => format!("DATE_SUB(DATE({0}), INTERVAL WEEKDAY({0}) DAY)", expr),
            TimeGrain::Month => format!(
                "STR_TO_DATE(DATE_FORMAT({}, '%Y-%m-01'), '%Y-%m-%d')",
                expr
            ),
            TimeGrain::Quarter => format!(
                "MAKEDATE(YEAR({0}), 1) + INTERVAL (QUARTER({0}) - 1) QUARTER",
                expr
            ),
            TimeGrain::Year => format!(
                "STR_TO_DATE(DATE_FORMAT({}, '%Y-01-01'), '%Y-%m-%d')",
                expr
            ),
        }
    }

    fn type_name(&self, logical: &str) -> Option<&'static str> {
        match logical {
            "string" => Some("CHAR"),
            "integer" | "boolean" => Some("SIGNED"),
            "number" => Some("DOUBLE"),
            "date" => Some("DATE"),
            "timestamp" => Some("DATETIME"),
            _ => None,
        }
    }

    fn supports_full_join(&self) -> bool {
        false
    }
}

/// Google BigQuery dialect
pub struct BigQueryDialect {
    dialect: SqlParserBigQuery,
}

impl BigQueryDialect {
    /// Create a new BigQuery dialect
    pub fn new() -> Self {
        Self {
            dialect: SqlParserBigQuery {},
        }
    }
}

impl Default for BigQueryDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for BigQueryDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn kind(&self) -> DialectKind {
        DialectKind::BigQuery
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "\\`"))
    }

    // BigQuery rejects '' doubling; quotes and backslashes are backslash-escaped
    fn string_literal(&self, value: &str) -> String {
        format!(
            "'{}'",
            value
                .replace('\\', "\\\\")
                .replace('\'', "\\'")
                .replace('\n', "\\n")
        )
    }

    fn date_trunc(&self, expr: &str, grain: TimeGrain) -> String {
        match grain {
            TimeGrain::Hour => format!("TIMESTAMP_TRUNC({}, HOUR)", expr),
            other => format!("DATE_TRUNC({}, {})", expr, other.as_str().to_ascii_uppercase()),
        }
    }

    fn type_name(&self, logical: &str) -> Option<&'static str> {
        match logical {
            "string" => Some("STRING"),
            "integer" => Some("INT64"),
            "number" => Some("FLOAT64"),
            "date" => Some("DATE"),
            "timestamp" => Some("TIMESTAMP"),
            "boolean" => Some("BOOL"),
            _ => None,
        }
    }
}

/// DuckDB SQL dialect
pub struct DuckDbDialect {
    dialect: SqlParserDuckDb,
}

impl DuckDbDialect {
    /// Create a new DuckDB dialect
    pub fn new() -> Self {
        Self {
            dialect: SqlParserDuckDb {},
        }
    }
}

impl Default for DuckDbDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for DuckDbDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn kind(&self) -> DialectKind {
        DialectKind::DuckDb
    }

    fn type_name(&self, logical: &str) -> Option<&'static str> {
        match logical {
            "string" => Some("VARCHAR"),
            "integer" => Some("BIGINT"),
            "number" => Some("DOUBLE"),
            "date" => Some("DATE"),
            "timestamp" => Some("TIMESTAMP"),
            "boolean" => Some("BOOLEAN"),
            _ => None,
        }
    }
}

/// Snowflake SQL dialect
pub struct SnowflakeDialect {
    dialect: SqlParserSnowflake,
}

impl SnowflakeDialect {
    /// Create a new Snowflake dialect
    pub fn new() -> Self {
        Self {
            dialect: SqlParserSnowflake {},
        }
    }
}

impl Default for SnowflakeDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for SnowflakeDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Snowflake
    }

    // Backslash escape sequences are recognized in single-quoted strings
    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn type_name(&self, logical: &str) -> Option<&'static str> {
        match logical {
            "string" => Some("VARCHAR"),
            "integer" => Some("NUMBER"),
            "number" => Some("FLOAT"),
            "date" => Some("DATE"),
            "timestamp" => Some("TIMESTAMP_NTZ"),
            "boolean" => Some("BOOLEAN"),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "dialect_test.rs"]
mod tests;

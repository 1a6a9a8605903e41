//! mx-sql - SQL layer for Metrix
//!
//! This crate turns resolved semantic metrics into dialect-specific SQL:
//! typed parameter binding, in-query formatting, time-grain truncation, and
//! derived-measure window wrapping. It also uses sqlparser-rs to inspect
//! metric expressions (table-qualified column references) and to
//! syntax-check generated statements.

pub mod dialect;
pub mod error;
pub mod format;
pub mod generator;
pub mod params;
pub mod references;
pub mod validator;

pub use dialect::{
    dialect_for, BigQueryDialect, DuckDbDialect, MySqlDialect, PostgresDialect, SnowflakeDialect,
    SqlDialect,
};
pub use error::{SqlError, SqlResult};
pub use generator::{generate_sql, SqlGenerator, SqlStatement};
pub use params::{bind_parameters, sample_parameters, BoundParameters, ParameterValues};
pub use references::{extract_column_references, extract_columns, ColumnReference};
pub use validator::validate_syntax;

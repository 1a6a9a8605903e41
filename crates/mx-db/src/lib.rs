//! mx-db - Database abstraction layer for Metrix
//!
//! This crate provides the `Connector` and `SchemaIntrospector` traits the
//! engine executes through, and their DuckDB implementation.

pub mod duckdb;
pub mod error;
pub(crate) mod rows;
pub mod traits;

pub use duckdb::DuckDbConnector;
pub use error::{DbError, DbResult};
pub use traits::{introspect_schema, Connector, Row, SchemaIntrospector};

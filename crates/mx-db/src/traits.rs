//! Connector and schema introspection traits

use crate::error::DbResult;
use async_trait::async_trait;
use mx_core::{ColumnInfo, ForeignKey, SchemaMetadata};

/// One result row, keyed by column name in select order
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Executes SQL against a data source
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Run a query and return every row
    async fn query(&self, sql: &str) -> DbResult<Vec<Row>>;

    /// Validate a query without running it (`EXPLAIN`)
    async fn dry_run(&self, sql: &str) -> DbResult<()>;

    /// Execute statements that return no rows
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}

/// Reads table, column, and foreign key metadata
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Table names (unqualified for the default schema)
    async fn get_tables(&self) -> DbResult<Vec<String>>;

    /// Columns of one table, in ordinal order
    async fn get_columns(&self, table: &str) -> DbResult<Vec<ColumnInfo>>;

    /// Every declared foreign key
    async fn get_foreign_keys(&self) -> DbResult<Vec<ForeignKey>>;
}

/// Snapshot every table, column, and foreign key into [`SchemaMetadata`]
pub async fn introspect_schema(introspector: &dyn SchemaIntrospector) -> DbResult<SchemaMetadata> {
    let mut schema = SchemaMetadata::new();
    for table in introspector.get_tables().await? {
        let columns = introspector.get_columns(&table).await?;
        schema.add_table(&table, columns);
    }
    for fk in introspector.get_foreign_keys().await? {
        schema.add_foreign_key(fk);
    }
    log::debug!(
        "Introspected {} tables, {} foreign keys",
        schema.table_names().len(),
        schema.foreign_keys().len()
    );
    Ok(schema)
}

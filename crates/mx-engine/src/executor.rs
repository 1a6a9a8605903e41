//! Connector execution with a timeout

use crate::error::{EngineError, EngineResult};
use mx_db::{Connector, Row};
use mx_sql::SqlStatement;
use std::sync::Arc;
use std::time::Duration;

/// Runs generated statements against a connector
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl QueryExecutor {
    /// Executor with a per-statement timeout
    pub fn new(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// The connector in use
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Per-statement timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a statement and return its rows.
    ///
    /// A timeout is reported as a connection failure.
    pub async fn execute(&self, statement: &SqlStatement) -> EngineResult<Vec<Row>> {
        log::debug!("Executing on {}:\n{}", self.connector.db_type(), statement.sql);
        match tokio::time::timeout(self.timeout, self.connector.query(&statement.sql)).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => Err(EngineError::from_db(e, &statement.sql, &statement.parameters)),
            Err(_) => {
                log::warn!(
                    "Query timed out after {}ms on {}",
                    self.timeout.as_millis(),
                    self.connector.db_type()
                );
                Err(EngineError::DataSourceConnection {
                    message: format!("query timed out after {}ms", self.timeout.as_millis()),
                })
            }
        }
    }

    /// Ask the data source to plan `sql` without running it
    pub async fn dry_run(&self, sql: &str) -> EngineResult<()> {
        match tokio::time::timeout(self.timeout, self.connector.dry_run(sql)).await {
            Ok(result) => result.map_err(|e| EngineError::from_db(e, sql, &Default::default())),
            Err(_) => Err(EngineError::DataSourceConnection {
                message: format!("dry run timed out after {}ms", self.timeout.as_millis()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mx_core::Dialect;
    use mx_db::{DbError, DbResult, DuckDbConnector};
    use std::collections::BTreeMap;

    fn statement(sql: &str) -> SqlStatement {
        SqlStatement {
            sql: sql.to_string(),
            dialect: Dialect::DuckDb,
            parameters: BTreeMap::new(),
        }
    }

    struct SlowConnector;

    #[async_trait]
    impl Connector for SlowConnector {
        async fn query(&self, _sql: &str) -> DbResult<Vec<Row>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        async fn dry_run(&self, _sql: &str) -> DbResult<()> {
            Err(DbError::ConnectionError("offline".into()))
        }
        async fn execute_batch(&self, _sql: &str) -> DbResult<()> {
            Ok(())
        }
        fn db_type(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_execute_rows() {
        let db = Arc::new(DuckDbConnector::in_memory().unwrap());
        let executor = QueryExecutor::new(db, Duration::from_secs(5));
        let rows = executor
            .execute(&statement("SELECT 1 AS one"))
            .await
            .unwrap();
        assert_eq!(rows[0]["one"], 1);
    }

    #[tokio::test]
    async fn test_timeout_is_connection_error() {
        let executor = QueryExecutor::new(Arc::new(SlowConnector), Duration::from_millis(20));
        let err = executor.execute(&statement("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, EngineError::DataSourceConnection { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_query_errors_carry_sql() {
        let db = Arc::new(DuckDbConnector::in_memory().unwrap());
        let executor = QueryExecutor::new(db, Duration::from_secs(5));
        let err = executor
            .execute(&statement("SELECT * FROM nowhere"))
            .await
            .unwrap_err();
        match err {
            EngineError::QueryExecution { sql, .. } => assert_eq!(sql, "SELECT * FROM nowhere"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_dry_run_connection_error() {
        let executor = QueryExecutor::new(Arc::new(SlowConnector), Duration::from_secs(1));
        assert!(matches!(
            executor.dry_run("SELECT 1").await,
            Err(EngineError::DataSourceConnection { .. })
        ));
    }
}

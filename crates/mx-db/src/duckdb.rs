//! DuckDB connector implementation

use crate::error::{DbError, DbResult};
use crate::rows::value_to_json;
use crate::traits::{Connector, Row, SchemaIntrospector};
use async_trait::async_trait;
use duckdb::Connection;
use mx_core::{ColumnInfo, ForeignKey};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

fn primary_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)PRIMARY\s+KEY\s*\(([^)]*)\)").expect("valid regex"))
}

fn foreign_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)FOREIGN\s+KEY\s*\(([^)]*)\)\s*REFERENCES\s+([^\s(]+)\s*\(([^)]*)\)")
            .expect("valid regex")
    })
}

/// DuckDB connector
///
/// Statements run on tokio's blocking pool; the connection is shared behind
/// a mutex so one statement executes at a time.
pub struct DuckDbConnector {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbConnector {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DbResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| DbError::Internal(format!("blocking task failed: {e}")))?
    }
}

/// Execute a query and collect rows as JSON objects.
///
/// DuckDB panics on `stmt.column_count()` before execution, so rows are
/// collected via `query_map` first and column names read afterwards.
fn query_sync(conn: &Connection, sql: &str) -> DbResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let values: Vec<Vec<Value>> = stmt
        .query_map([], |row| {
            let col_count = row.as_ref().column_count();
            (0..col_count)
                .map(|i| row.get_ref(i).map(value_to_json))
                .collect()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let column_count = stmt.column_count();
    let names: Vec<String> = (0..column_count)
        .map(|i| stmt.column_name(i).map_or("?".to_string(), |v| v.to_string()))
        .collect();

    Ok(values
        .into_iter()
        .map(|cells| names.iter().cloned().zip(cells).collect())
        .collect())
}

fn text(row: &Row, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// `main` tables are reported unqualified, others as `schema.table`
fn display_table(schema: &str, table: &str) -> String {
    if schema == "main" {
        table.to_string()
    } else {
        format!("{}.{}", schema, table)
    }
}

fn split_qualified(name: &str) -> (String, String) {
    match name.rsplit_once('.') {
        Some((schema, table)) => (schema.to_string(), table.to_string()),
        None => ("main".to_string(), name.to_string()),
    }
}

fn constraints_sync(conn: &Connection) -> DbResult<Vec<Row>> {
    query_sync(
        conn,
        "SELECT schema_name, table_name, constraint_type, constraint_text \
         FROM duckdb_constraints() \
         WHERE constraint_type IN ('PRIMARY KEY', 'FOREIGN KEY') \
         ORDER BY schema_name, table_name, constraint_index",
    )
}

#[async_trait]
impl Connector for DuckDbConnector {
    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        let sql = sql.to_string();
        self.with_conn(move |conn| query_sync(conn, &sql)).await
    }

    async fn dry_run(&self, sql: &str) -> DbResult<()> {
        let sql = format!("EXPLAIN {}", sql);
        self.with_conn(move |conn| query_sync(conn, &sql).map(|_| ()))
            .await
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let sql = sql.to_string();
        self.with_conn(move |conn| Ok(conn.execute_batch(&sql)?))
            .await
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[async_trait]
impl SchemaIntrospector for DuckDbConnector {
    async fn get_tables(&self) -> DbResult<Vec<String>> {
        let rows = self
            .query(
                "SELECT table_schema, table_name FROM information_schema.tables \
                 WHERE table_schema NOT IN ('information_schema', 'pg_catalog') \
                 ORDER BY table_schema, table_name",
            )
            .await?;
        Ok(rows
            .iter()
            .map(|r| display_table(&text(r, "table_schema"), &text(r, "table_name")))
            .collect())
    }

    async fn get_columns(&self, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let (schema, name) = split_qualified(table);
        let table = table.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
                 WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
            )?;
            let mut columns: Vec<ColumnInfo> = stmt
                .query_map([&schema, &name], |row| {
                    let column: String = row.get(0)?;
                    let data_type: String = row.get(1)?;
                    let nullable: String = row.get(2)?;
                    let mut info = ColumnInfo::new(&column, &data_type);
                    info.nullable = nullable.eq_ignore_ascii_case("YES");
                    Ok(info)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            if columns.is_empty() {
                return Err(DbError::TableNotFound(table));
            }

            for row in constraints_sync(conn)? {
                if text(&row, "schema_name") != schema || text(&row, "table_name") != name {
                    continue;
                }
                let constraint = text(&row, "constraint_text");
                if let Some(caps) = primary_key_re().captures(&constraint) {
                    for key in split_columns(&caps[1]) {
                        if let Some(col) = columns.iter_mut().find(|c| c.name == key) {
                            col.primary_key = true;
                            col.nullable = false;
                        }
                    }
                }
            }
            Ok(columns)
        })
        .await
    }

    async fn get_foreign_keys(&self) -> DbResult<Vec<ForeignKey>> {
        let rows = self.with_conn(constraints_sync).await?;
        let mut fks = Vec::new();
        for row in rows {
            let constraint = text(&row, "constraint_text");
            let Some(caps) = foreign_key_re().captures(&constraint) else {
                continue;
            };
            let table = display_table(&text(&row, "schema_name"), &text(&row, "table_name"));
            let ref_table = caps[2].trim_matches('"').to_string();
            for (column, ref_column) in split_columns(&caps[1])
                .into_iter()
                .zip(split_columns(&caps[3]))
            {
                let fk = ForeignKey {
                    table: table.clone(),
                    column,
                    ref_table: ref_table.clone(),
                    ref_column,
                };
                if !fks.contains(&fk) {
                    fks.push(fk);
                }
            }
        }
        Ok(fks)
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;

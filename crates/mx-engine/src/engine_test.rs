use super::*;
use mx_core::{MetricVariant, PreAggregationSpec};
use serde_json::json;

const SALES: &str = r#"
id: sales
name: Sales
table_name: orders
measures:
  - name: revenue
    type: sum
    query: orders.amount
dimensions:
  - name: month
    type: time
    query: orders.created_at
    grain: month
  - name: region
    query: orders.region
filters:
  - name: since
    query: orders.created_at >= {{ start_date }}
parameters:
  - name: start_date
    type: date
    required: false
    default: "2000-01-01"
"#;

const DAILY: &str = r#"
id: sales_daily
metric_id: sales
table_name: rollups.sales_daily
status: completed
dimensions:
  - name: day
    query: orders.created_at
    grain: day
  - name: region
    query: orders.region
measures:
  - name: revenue
    type: sum
"#;

async fn connector() -> Arc<DuckDbConnector> {
    let db = DuckDbConnector::in_memory().unwrap();
    db.execute_batch(
        "CREATE TABLE orders (id INTEGER, region VARCHAR, amount DOUBLE, created_at DATE);
         INSERT INTO orders VALUES
           (1, 'emea', 10.0, DATE '2024-01-05'),
           (2, 'emea', 20.0, DATE '2024-01-20'),
           (3, 'amer', 5.0, DATE '2024-02-03');",
    )
    .await
    .unwrap();
    Arc::new(db)
}

fn sales() -> SemanticMetric {
    SemanticMetric::from_yaml(SALES, Path::new("sales.yml")).unwrap()
}

async fn engine_with(specs: Vec<PreAggregationSpec>) -> MetricEngine {
    let store = InMemoryStore::new();
    store.insert_metric(sales()).unwrap();
    let mut variant = MetricVariant::new("sales_emea", "sales");
    variant.overrides.exclude.dimensions.push("month".to_string());
    store.insert_variant(variant).unwrap();
    MetricEngine::new(
        Arc::new(store),
        Arc::new(InMemoryCatalog::new(specs)),
        connector().await,
        EngineOptions::default(),
    )
}

async fn engine() -> MetricEngine {
    engine_with(vec![]).await
}

fn revenue_for(result: &MetricResult, region: &str) -> f64 {
    result
        .rows
        .iter()
        .find(|r| r["region"] == region)
        .and_then(|r| r["revenue"].as_f64())
        .unwrap()
}

#[tokio::test]
async fn test_execute_then_cache_hit() {
    let engine = engine().await;
    let request = ExecuteRequest::new("sales");

    let first = engine.execute_metric(&request).await.unwrap();
    assert!(!first.cache_hit);
    assert_eq!(first.row_count, 2);
    assert_eq!(revenue_for(&first, "emea"), 30.0);
    assert_eq!(revenue_for(&first, "amer"), 5.0);
    assert!(first.rollup.is_none());
    assert!(first.sql.contains("SUM("), "{}", first.sql);

    let second = engine.execute_metric(&request).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.rows, first.rows);
    assert_eq!(second.sql, first.sql);
}

#[tokio::test]
async fn test_cache_key_inputs_separate_results() {
    let engine = engine().await;
    engine
        .execute_metric(&ExecuteRequest::new("sales"))
        .await
        .unwrap();

    let other_consumer = ExecuteRequest::new("sales").with_consumer("dashboard-7");
    assert!(!engine.execute_metric(&other_consumer).await.unwrap().cache_hit);

    let filtered = ExecuteRequest::new("sales").with_parameter("start_date", json!("2024-02-01"));
    let result = engine.execute_metric(&filtered).await.unwrap();
    assert!(!result.cache_hit);
    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0]["region"], "amer");

    let bypass = ExecuteRequest::new("sales").without_cache();
    assert!(!engine.execute_metric(&bypass).await.unwrap().cache_hit);
}

#[tokio::test]
async fn test_cache_disabled() {
    let store = InMemoryStore::new();
    store.insert_metric(sales()).unwrap();
    let options = EngineOptions {
        cache_enabled: false,
        ..EngineOptions::default()
    };
    let engine = MetricEngine::new(
        Arc::new(store),
        Arc::new(InMemoryCatalog::default()),
        connector().await,
        options,
    );
    assert!(engine.cache().is_none());
    let request = ExecuteRequest::new("sales");
    engine.execute_metric(&request).await.unwrap();
    assert!(!engine.execute_metric(&request).await.unwrap().cache_hit);
    assert_eq!(engine.invalidate_metric("sales").await.unwrap(), 0);
}

#[tokio::test]
async fn test_invalidate_metric() {
    let engine = engine().await;
    let request = ExecuteRequest::new("sales");
    engine.execute_metric(&request).await.unwrap();
    engine
        .execute_metric(&request.clone().with_consumer("api"))
        .await
        .unwrap();

    assert_eq!(engine.invalidate_metric("sales").await.unwrap(), 2);
    assert!(!engine.execute_metric(&request).await.unwrap().cache_hit);

    engine.flush_cache().await;
    assert!(!engine.execute_metric(&request).await.unwrap().cache_hit);
}

#[tokio::test]
async fn test_variant_executes() {
    let engine = engine().await;
    let result = engine
        .execute_metric(&ExecuteRequest::new("sales_emea"))
        .await
        .unwrap();
    assert_eq!(result.row_count, 2);
    assert!(result.rows.iter().all(|r| !r.contains_key("month")));
    assert_eq!(revenue_for(&result, "emea"), 30.0);
}

#[tokio::test]
async fn test_completed_rollup_answers_query() {
    let spec = PreAggregationSpec::from_yaml(DAILY, Path::new("daily.yml")).unwrap();
    let engine = engine_with(vec![spec]).await;
    // Distinct totals prove the rows came from the rollup table
    engine
        .executor
        .connector()
        .execute_batch(
            "CREATE SCHEMA rollups;
             CREATE TABLE rollups.sales_daily (day DATE, region VARCHAR, revenue DOUBLE);
             INSERT INTO rollups.sales_daily VALUES
               (DATE '2024-01-05', 'emea', 100.0),
               (DATE '2024-01-06', 'emea', 200.0);",
        )
        .await
        .unwrap();

    let result = engine
        .execute_metric(&ExecuteRequest::new("sales").without_cache())
        .await
        .unwrap();
    assert_eq!(result.rollup.as_deref(), Some("sales_daily"));
    assert!(result.sql.contains("sales_daily"), "{}", result.sql);
    assert_eq!(result.row_count, 1);
    assert_eq!(revenue_for(&result, "emea"), 300.0);
}

#[tokio::test]
async fn test_dimension_named_like_its_column_groups_by_truncated_value() {
    let metric = SemanticMetric::from_yaml(
        "id: by_month\nname: By month\ntable_name: orders\nmeasures:\n  - name: revenue\n    type: sum\n    query: amount\ndimensions:\n  - name: created_at\n    type: time\n    query: created_at\n    grain: month\n",
        Path::new("by_month.yml"),
    )
    .unwrap();
    let store = InMemoryStore::new();
    store.insert_metric(metric).unwrap();
    let engine = MetricEngine::new(
        Arc::new(store),
        Arc::new(InMemoryCatalog::default()),
        connector().await,
        EngineOptions::default(),
    );

    let result = engine
        .execute_metric(&ExecuteRequest::new("by_month"))
        .await
        .unwrap();
    // Two January orders collapse into one row
    assert_eq!(result.row_count, 2, "{}", result.sql);
    let january = result
        .rows
        .iter()
        .find(|r| {
            r["created_at"]
                .as_str()
                .is_some_and(|d| d.starts_with("2024-01-01"))
        })
        .unwrap();
    assert_eq!(january["revenue"], json!(30.0));
}

#[tokio::test]
async fn test_generate_sql_dialect_override() {
    let engine = engine().await;
    let cancel = CancelToken::new();
    let duck = engine
        .generate_sql("sales", &ParameterValues::new(), None, &cancel)
        .unwrap();
    assert_eq!(duck.dialect, Dialect::DuckDb);

    let mysql = engine
        .generate_sql("sales", &ParameterValues::new(), Some(Dialect::MySql), &cancel)
        .unwrap();
    assert_eq!(mysql.dialect, Dialect::MySql);
    assert!(mysql.sql.contains('`'), "{}", mysql.sql);
}

#[tokio::test]
async fn test_unknown_metric() {
    let engine = engine().await;
    let err = engine
        .execute_metric(&ExecuteRequest::new("sale"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Compile(_)), "{err}");

    let response = engine.diagnose("sale").await;
    assert!(!response.healthy);
    assert!(
        response.diagnosis.explanation.contains("did you mean 'sales'"),
        "{}",
        response.diagnosis.explanation
    );
}

#[tokio::test]
async fn test_diagnose_uses_loaded_schema() {
    let db = connector().await;
    let store = InMemoryStore::new();
    let mut broken = sales();
    broken.table_name = Some("order".to_string());
    store.insert_metric(broken).unwrap();
    let engine = MetricEngine::new(
        Arc::new(store),
        Arc::new(InMemoryCatalog::default()),
        db.clone(),
        EngineOptions::default(),
    )
    .with_introspector(db);

    let response = engine.diagnose("sales").await;
    assert!(!response.healthy);
    let fix = response
        .diagnosis
        .suggestions
        .iter()
        .find(|s| s.description.contains("table_name"))
        .unwrap();
    assert_eq!(fix.fixed_entity_json["table_name"], "orders");
    assert!(engine.schema().await.unwrap().has_table("orders"));
}

#[tokio::test]
async fn test_healthy_diagnosis() {
    let engine = engine().await;
    let response = engine.diagnose("sales").await;
    assert!(response.healthy, "{}", response.diagnosis.explanation);
}

#[test]
fn test_options_from_config() {
    let config: Config = serde_yaml::from_str(
        "name: shop\ndialect: postgres\ncache:\n  enabled: false\n  default_ttl_secs: 60\nexecution:\n  timeout_secs: 5\ndata_model_version: \"7\"\ndata_model_id: dm1\n",
    )
    .unwrap();
    let options = EngineOptions::from(&config);
    assert_eq!(options.dialect, Dialect::Postgres);
    assert!(!options.cache_enabled);
    assert_eq!(options.default_ttl, Duration::from_secs(60));
    assert_eq!(options.timeout, Duration::from_secs(5));
    assert_eq!(options.data_model_version, "7");
    assert_eq!(options.data_model_id.as_deref(), Some("dm1"));
}

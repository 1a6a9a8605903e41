//! CLI integration tests
//!
//! Runs the `mx` binary against the fixture project. Commands that touch
//! data use a temp project that points at the fixture metrics and a seeded
//! DuckDB file.

use mx_db::{Connector, DuckDbConnector};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Path to the compiled mx binary (resolved at compile time)
fn mx_bin() -> String {
    env!("CARGO_BIN_EXE_mx").to_string()
}

fn fixture_project_dir() -> &'static str {
    "tests/fixtures/shop_project"
}

fn mx(args: &[&str], project_dir: &str) -> Output {
    Command::new(mx_bin())
        .args(args)
        .args(["--project-dir", project_dir])
        .output()
        .expect("Failed to run mx")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Temp project over the fixture metrics with a seeded warehouse
async fn seeded_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let metrics: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join(fixture_project_dir())
        .join("metrics");
    std::fs::write(
        dir.path().join("metrix.yml"),
        format!(
            "name: shop\ndatabase:\n  path: warehouse.duckdb\nmetric_paths:\n  - {}\ndata_model_id: dm_sales\n",
            metrics.display()
        ),
    )
    .unwrap();

    let db = DuckDbConnector::from_path(&dir.path().join("warehouse.duckdb")).unwrap();
    db.execute_batch(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, region VARCHAR);
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             customer_id INTEGER REFERENCES customers(id),
             amount DOUBLE,
             created_at DATE
         );
         INSERT INTO customers VALUES (1, 'emea'), (2, 'amer');
         INSERT INTO orders VALUES
           (1, 1, 10.0, DATE '2024-01-05'),
           (2, 1, 30.0, DATE '2024-01-20'),
           (3, 2, 5.0, DATE '2024-02-03');",
    )
    .await
    .unwrap();
    dir
}

#[test]
fn test_ls_table() {
    let output = mx(&["ls"], fixture_project_dir());
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("sales_emea"), "{}", out);
    assert!(out.contains("variant"), "{}", out);
    assert!(out.contains("3 definitions found"), "{}", out);
}

#[test]
fn test_ls_json() {
    let output = mx(&["ls", "--output", "json"], fixture_project_dir());
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["definition_count"], 3);
    assert_eq!(json["definitions"][1]["id"], "sales_emea");
    assert_eq!(json["definitions"][1]["source"], "sales");
}

#[test]
fn test_compile_variant_json() {
    let output = mx(&["compile", "sales_emea", "-o", "json"], fixture_project_dir());
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["lineage"], serde_json::json!(["sales", "sales_emea"]));
    assert_eq!(json["metric"]["dimensions"].as_array().unwrap().len(), 1);
    assert_eq!(json["metric"]["filters"][1]["name"], "emea_only");
    assert_eq!(json["definition_hash"].as_str().unwrap().len(), 64);
}

#[test]
fn test_compile_unknown_suggests_name() {
    let output = mx(&["compile", "sale"], fixture_project_dir());
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("sales"), "{}", err);
}

#[test]
fn test_sql_dialects_and_params() {
    let output = mx(
        &["sql", "sales", "--param", "start_date=2024-02-01"],
        fixture_project_dir(),
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let sql = stdout(&output);
    assert!(sql.contains("LEFT JOIN"), "{}", sql);
    assert!(sql.contains("2024-02-01"), "{}", sql);

    let output = mx(&["sql", "sales", "--dialect", "mysql"], fixture_project_dir());
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains('`'));

    let output = mx(&["sql", "sales", "--dialect", "oracle"], fixture_project_dir());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid SQL dialect"));
}

#[test]
fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = mx(&["ls"], dir.path().to_str().unwrap());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to load project configuration"));
}

#[tokio::test]
async fn test_run_json() {
    let dir = seeded_project().await;
    let project = dir.path().to_str().unwrap();

    let output = mx(&["run", "sales_emea", "-o", "json"], project);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["row_count"], 1);
    assert_eq!(json["rows"][0]["region"], "emea");
    assert_eq!(json["rows"][0]["revenue"], 40.0);
    // every invocation is a fresh process, so nothing is cached
    assert_eq!(json["cache_hit"], false);
}

#[tokio::test]
async fn test_run_table_with_params() {
    let dir = seeded_project().await;
    let output = mx(
        &["run", "sales", "--param", "start_date=2024-02-01", "--no-cache"],
        dir.path().to_str().unwrap(),
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("amer"), "{}", out);
    assert!(!out.contains("emea"), "{}", out);
    assert!(out.contains("1 row(s)"), "{}", out);
}

#[tokio::test]
async fn test_doctor_healthy_and_unhealthy() {
    let dir = seeded_project().await;
    let project = dir.path().to_str().unwrap();

    let output = mx(&["doctor", "sales"], project);
    assert!(output.status.success(), "{}", stdout(&output));
    assert!(stdout(&output).contains("No problems found in metric 'sales'."));

    let output = mx(&["doctor", "sales_running", "--output", "json"], project);
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["healthy"], false);
    let suggestions = json["diagnosis"]["suggestions"].as_array().unwrap();
    assert_eq!(
        suggestions[0]["description"],
        "Derived measure 'running_revenue': reference measure 'revenue' instead of 'revenu'"
    );
    let last = &suggestions[suggestions.len() - 1]["fixed_entity_json"];
    assert_eq!(last["derived_measures"][0]["order_dimension"], "month");
}

use super::*;
use mx_core::{ColumnInfo, ForeignKey, SchemaMetadata, SemanticMetric};
use std::path::Path;

fn metric(yaml: &str) -> SemanticMetric {
    SemanticMetric::from_yaml(yaml, Path::new("m.yml")).unwrap()
}

fn benchmark_metric() -> SemanticMetric {
    metric(
        r#"
id: kpi
name: KPI vs benchmark
table_name: orders
measures:
  - name: revenue
    type: sum
    query: orders.amount
  - name: target
    type: max
    query: kpi_benchmarks.target
"#,
    )
}

fn benchmark_schema() -> SchemaMetadata {
    SchemaMetadata::new()
        .with_table(
            "orders",
            vec![
                ColumnInfo::new("id", "INTEGER").primary(),
                ColumnInfo::new("benchmark_id", "INTEGER"),
                ColumnInfo::new("amount", "DOUBLE"),
            ],
        )
        .with_table(
            "kpi_benchmarks",
            vec![
                ColumnInfo::new("id", "INTEGER").primary(),
                ColumnInfo::new("target", "DOUBLE"),
            ],
        )
}

#[test]
fn test_foreign_key_join() {
    let mut schema = benchmark_schema();
    schema.add_foreign_key(ForeignKey {
        table: "orders".into(),
        column: "benchmark_id".into(),
        ref_table: "kpi_benchmarks".into(),
        ref_column: "id".into(),
    });

    let report = find_missing_joins(&benchmark_metric(), &schema);
    assert!(report.is_complete());
    assert_eq!(report.suggestions.len(), 1);

    let suggestion = &report.suggestions[0];
    assert_eq!(suggestion.strategy, JoinStrategy::ForeignKey);
    assert_eq!(suggestion.join.name, "orders_kpi_benchmarks");
    assert_eq!(suggestion.join.join_type, JoinType::Left);
    assert_eq!(suggestion.join.left_table, "orders");
    assert_eq!(suggestion.join.right_table, "kpi_benchmarks");
    assert_eq!(
        suggestion.join.conditions,
        vec![JoinCondition {
            left_column: "benchmark_id".into(),
            right_column: "id".into(),
        }]
    );
}

#[test]
fn test_reverse_foreign_key() {
    // FK declared on the table being joined in
    let m = metric(
        r#"
id: customer_orders
name: Customer orders
table_name: customers
measures:
  - name: orders
    type: count
    query: orders.id
"#,
    );
    let schema = SchemaMetadata::new()
        .with_table("customers", vec![ColumnInfo::new("id", "INTEGER").primary()])
        .with_table(
            "orders",
            vec![
                ColumnInfo::new("id", "INTEGER").primary(),
                ColumnInfo::new("customer_id", "INTEGER").references("customers", "id"),
            ],
        );
    let report = find_missing_joins(&m, &schema);
    let join = &report.suggestions[0].join;
    assert_eq!(report.suggestions[0].strategy, JoinStrategy::ForeignKey);
    assert_eq!(join.left_table, "customers");
    assert_eq!(join.conditions[0].left_column, "id");
    assert_eq!(join.conditions[0].right_column, "customer_id");
}

#[test]
fn test_shared_column_prefers_key_columns() {
    let m = metric(
        r#"
id: sales_by_store
name: Sales by store
table_name: sales
measures:
  - name: revenue
    type: sum
    query: sales.amount
dimensions:
  - name: city
    query: stores.city
"#,
    );
    let schema = SchemaMetadata::new()
        .with_table(
            "sales",
            vec![
                ColumnInfo::new("store_code", "TEXT"),
                ColumnInfo::new("updated_at", "TIMESTAMP"),
                ColumnInfo::new("amount", "DOUBLE"),
            ],
        )
        .with_table(
            "stores",
            vec![
                ColumnInfo::new("store_code", "TEXT").primary(),
                ColumnInfo::new("updated_at", "TIMESTAMP"),
                ColumnInfo::new("city", "TEXT"),
            ],
        );
    let report = find_missing_joins(&m, &schema);
    let suggestion = &report.suggestions[0];
    assert_eq!(suggestion.strategy, JoinStrategy::SharedColumn);
    assert_eq!(suggestion.join.conditions[0].left_column, "store_code");
}

#[test]
fn test_naming_pattern() {
    let m = metric(
        r#"
id: revenue_by_category
name: Revenue by category
table_name: products
measures:
  - name: revenue
    type: sum
    query: products.price
dimensions:
  - name: category
    query: categories.label
"#,
    );
    let schema = SchemaMetadata::new()
        .with_table(
            "products",
            vec![
                ColumnInfo::new("sku", "TEXT"),
                ColumnInfo::new("category_id", "INTEGER"),
                ColumnInfo::new("price", "DOUBLE"),
            ],
        )
        .with_table(
            "categories",
            vec![
                ColumnInfo::new("code", "INTEGER"),
                ColumnInfo::new("label", "TEXT"),
            ],
        );
    let report = find_missing_joins(&m, &schema);
    let suggestion = &report.suggestions[0];
    assert_eq!(suggestion.strategy, JoinStrategy::NamingPattern);
    assert_eq!(suggestion.join.conditions[0].left_column, "category_id");
    // No primary key declared, so the target column defaults to `id`
    assert_eq!(suggestion.join.conditions[0].right_column, "id");
}

#[test]
fn test_unresolved_table() {
    let schema = benchmark_schema().with_table("regions", vec![ColumnInfo::new("code", "TEXT")]);
    let mut m = benchmark_metric();
    m.measures.truncate(1);
    m.dimensions.push(mx_core::SemanticDimension {
        name: "region".into(),
        query: "regions.name".into(),
        dimension_type: Default::default(),
        grain: None,
        formatting: vec![],
    });
    let report = find_missing_joins(&m, &schema);
    assert!(!report.is_complete());
    assert_eq!(report.unresolved, vec!["regions"]);
    assert!(report.suggestions.is_empty());
}

#[test]
fn test_declared_joins_are_reachable() {
    let mut m = benchmark_metric();
    m.joins = vec![SemanticJoin {
        name: "bench".into(),
        join_type: JoinType::Inner,
        left_table: "orders".into(),
        right_table: "kpi_benchmarks".into(),
        conditions: vec![JoinCondition {
            left_column: "benchmark_id".into(),
            right_column: "id".into(),
        }],
    }];
    assert_eq!(reachable_tables(&m), vec!["orders", "kpi_benchmarks"]);
    assert!(find_missing_joins(&m, &benchmark_schema()).is_empty());
}

#[test]
fn test_inferred_table_extends_reachable_set() {
    let m = metric(
        r#"
id: order_lines
name: Order lines by country
table_name: order_items
measures:
  - name: quantity
    type: sum
    query: order_items.quantity
dimensions:
  - name: customer
    query: orders.customer_id
  - name: country
    query: customers.country
"#,
    );
    let schema = SchemaMetadata::new()
        .with_table(
            "order_items",
            vec![
                ColumnInfo::new("order_id", "INTEGER").references("orders", "id"),
                ColumnInfo::new("quantity", "INTEGER"),
            ],
        )
        .with_table(
            "orders",
            vec![
                ColumnInfo::new("id", "INTEGER").primary(),
                ColumnInfo::new("customer_id", "INTEGER").references("customers", "id"),
            ],
        )
        .with_table(
            "customers",
            vec![
                ColumnInfo::new("id", "INTEGER").primary(),
                ColumnInfo::new("country", "TEXT"),
            ],
        );
    let report = find_missing_joins(&m, &schema);
    assert!(report.is_complete());
    let names: Vec<_> = report.joins().into_iter().map(|j| j.name).collect();
    assert_eq!(names, vec!["order_items_orders", "orders_customers"]);
}

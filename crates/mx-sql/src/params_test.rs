use super::*;
use crate::dialect::{dialect_for, DuckDbDialect, MySqlDialect};
use mx_core::{Dialect, MeasureType, SemanticFilter, SemanticMeasure, SemanticParameter};
use serde_json::json;

fn metric_with_params() -> SemanticMetric {
    let mut metric = SemanticMetric::new("sales", "orders");
    metric.measures.push(SemanticMeasure {
        name: "revenue".into(),
        measure_type: MeasureType::Sum,
        query: "orders.amount".into(),
        formatting: vec![],
        description: None,
    });
    metric.filters.push(SemanticFilter::expression(
        "since",
        "orders.created_at >= {{ start_date }}",
    ));
    metric.filters.push(SemanticFilter::expression(
        "region",
        "orders.region IN ({{regions}})",
    ));
    metric.parameters.push(SemanticParameter {
        name: "start_date".into(),
        parameter_type: ParameterType::Date,
        required: true,
        default: None,
    });
    metric
}

#[test]
fn test_find_placeholders_dedupes_in_order() {
    assert_eq!(
        find_placeholders("{{ b }} + {{a}} + {{b}}"),
        vec!["b".to_string(), "a".to_string()]
    );
    assert!(find_placeholders("no params").is_empty());
}

#[test]
fn test_single_placeholder() {
    assert_eq!(as_single_placeholder(" {{ region }} "), Some("region"));
    assert_eq!(as_single_placeholder("x = {{ region }}"), None);
}

#[test]
fn test_bind_typed_values() {
    let metric = metric_with_params();
    let mut values = ParameterValues::new();
    values.insert("start_date".into(), json!("2024-03-01"));
    values.insert("regions".into(), json!(["EMEA", "O'Hare"]));

    let bound = bind_parameters(&metric, &values, &DuckDbDialect::new()).unwrap();
    assert_eq!(bound.literal("start_date"), Some("DATE '2024-03-01'"));
    assert_eq!(bound.literal("regions"), Some("'EMEA', 'O''Hare'"));
    assert_eq!(
        bound.render("orders.region IN ({{regions}})").unwrap(),
        "orders.region IN ('EMEA', 'O''Hare')"
    );
}

#[test]
fn test_missing_required_parameter() {
    let metric = metric_with_params();
    let mut values = ParameterValues::new();
    values.insert("regions".into(), json!(["EMEA"]));
    let err = bind_parameters(&metric, &values, &MySqlDialect::new()).unwrap_err();
    assert!(matches!(err, SqlError::ParameterValidation { ref parameter, .. } if parameter == "start_date"));
}

#[test]
fn test_undeclared_placeholder_without_value() {
    let metric = metric_with_params();
    let mut values = ParameterValues::new();
    values.insert("start_date".into(), json!("2024-03-01"));
    let err = bind_parameters(&metric, &values, &DuckDbDialect::new()).unwrap_err();
    assert!(matches!(err, SqlError::ParameterValidation { ref parameter, .. } if parameter == "regions"));
}

#[test]
fn test_default_and_optional_parameters() {
    let mut metric = metric_with_params();
    metric.parameters[0].default = Some(json!("2023-12-31T10:00:00Z"));
    metric.parameters.push(SemanticParameter {
        name: "min_amount".into(),
        parameter_type: ParameterType::Number,
        required: false,
        default: None,
    });
    let mut values = ParameterValues::new();
    values.insert("regions".into(), json!("EMEA"));
    let bound = bind_parameters(&metric, &values, &DuckDbDialect::new()).unwrap();
    assert_eq!(bound.literal("start_date"), Some("DATE '2023-12-31'"));
    assert_eq!(bound.literal("min_amount"), Some("NULL"));
}

#[test]
fn test_type_mismatch() {
    let mut metric = metric_with_params();
    metric.parameters.push(SemanticParameter {
        name: "regions".into(),
        parameter_type: ParameterType::Number,
        required: true,
        default: None,
    });
    let mut values = ParameterValues::new();
    values.insert("start_date".into(), json!("2024-03-01"));
    values.insert("regions".into(), json!("north"));
    assert!(bind_parameters(&metric, &values, &DuckDbDialect::new()).is_err());

    values.insert("start_date".into(), json!("March 1st"));
    values.insert("regions".into(), json!("12.5"));
    assert!(bind_parameters(&metric, &values, &DuckDbDialect::new()).is_err());
}

#[test]
fn test_sample_parameters_cover_placeholders() {
    let metric = metric_with_params();
    let samples = sample_parameters(&metric);
    assert_eq!(samples.get("start_date"), Some(&json!("2024-01-01")));
    assert!(samples.contains_key("regions"));
    assert!(bind_parameters(&metric, &samples, &DuckDbDialect::new()).is_ok());
}

#[test]
fn test_string_values_cannot_close_the_literal() {
    let payload = "\\') OR 1=1 -- ";
    let mut metric = SemanticMetric::new("sales", "orders");
    metric.filters.push(SemanticFilter::expression(
        "region",
        "orders.region = {{region}}",
    ));
    let mut values = ParameterValues::new();
    values.insert("region".into(), json!(payload));

    let expected = [
        (Dialect::Postgres, r"'\'') OR 1=1 -- '"),
        (Dialect::DuckDb, r"'\'') OR 1=1 -- '"),
        (Dialect::MySql, r"'\\'') OR 1=1 -- '"),
        (Dialect::Snowflake, r"'\\'') OR 1=1 -- '"),
        (Dialect::BigQuery, r"'\\\') OR 1=1 -- '"),
    ];
    for (kind, literal) in expected {
        let dialect = dialect_for(kind);
        let bound = bind_parameters(&metric, &values, dialect.as_ref()).unwrap();
        assert_eq!(bound.literal("region"), Some(literal), "{}", kind);

        let condition = bound.render("orders.region = {{region}}").unwrap();
        let sql = format!("SELECT 1 FROM orders WHERE {}", condition);
        let statements = dialect
            .parse(&sql)
            .unwrap_or_else(|e| panic!("{}: {}\n{}", kind, e, sql));
        assert_eq!(statements.len(), 1, "{}", kind);
        let reparsed = statements[0].to_string();
        assert!(!reparsed.contains("OR 1 = 1"), "{}: {}", kind, reparsed);
    }
}

#[test]
fn test_quotes_and_backslashes_per_dialect() {
    let value = r"it's C:\temp";
    let cases = [
        (Dialect::Postgres, r"'it''s C:\temp'"),
        (Dialect::MySql, r"'it''s C:\\temp'"),
        (Dialect::BigQuery, r"'it\'s C:\\temp'"),
    ];
    for (kind, literal) in cases {
        assert_eq!(dialect_for(kind).string_literal(value), literal, "{}", kind);
    }
    assert_eq!(dialect_for(Dialect::BigQuery).string_literal("a\nb"), r"'a\nb'");
}

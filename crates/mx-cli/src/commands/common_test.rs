use super::*;
use serde_json::json;

#[test]
fn test_parse_params_types() {
    let raw = vec![
        "start_date=2024-01-01".to_string(),
        "limit=10".to_string(),
        "regions=[\"emea\",\"amer\"]".to_string(),
        "label=a=b".to_string(),
        "flag=true".to_string(),
    ];
    let params = parse_params(&raw).unwrap();
    assert_eq!(params["start_date"], json!("2024-01-01"));
    assert_eq!(params["limit"], json!(10));
    assert_eq!(params["regions"], json!(["emea", "amer"]));
    // only the first '=' splits
    assert_eq!(params["label"], json!("a=b"));
    assert_eq!(params["flag"], json!(true));
}

#[test]
fn test_parse_params_keeps_odd_values_as_text() {
    let raw = vec!["x=null".to_string(), "y={\"a\":1}".to_string(), "z=".to_string()];
    let params = parse_params(&raw).unwrap();
    assert_eq!(params["x"], json!("null"));
    assert_eq!(params["y"], json!("{\"a\":1}"));
    assert_eq!(params["z"], json!(""));
}

#[test]
fn test_parse_params_rejects_malformed() {
    assert!(parse_params(&["region".to_string()]).is_err());
    assert!(parse_params(&["=emea".to_string()]).is_err());
}

#[test]
fn test_column_widths() {
    let rows = vec![vec!["sales".to_string(), "metric".to_string()]];
    assert_eq!(calculate_column_widths(&["ID", "KIND"], &rows), vec![5, 6]);
}

#[test]
fn test_cell_text() {
    assert_eq!(cell_text(&json!(null)), "NULL");
    assert_eq!(cell_text(&json!("emea")), "emea");
    assert_eq!(cell_text(&json!(40.5)), "40.5");
}

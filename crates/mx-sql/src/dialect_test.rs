use super::*;

#[test]
fn test_dialect_for_every_kind() {
    for kind in DialectKind::ALL {
        let dialect = dialect_for(kind);
        assert_eq!(dialect.kind(), kind);
        assert_eq!(dialect.name(), kind.as_str());
    }
}

#[test]
fn test_quote_ident_per_dialect() {
    assert_eq!(PostgresDialect::new().quote_ident("order"), "\"order\"");
    assert_eq!(MySqlDialect::new().quote_ident("order"), "`order`");
    assert_eq!(BigQueryDialect::new().quote_ident("order"), "`order`");
    assert_eq!(
        DuckDbDialect::new().quote_qualified("analytics.orders"),
        "\"analytics\".\"orders\""
    );
}

#[test]
fn test_date_trunc_per_dialect() {
    assert_eq!(
        PostgresDialect::new().date_trunc("created_at", TimeGrain::Month),
        "DATE_TRUNC('month', created_at)"
    );
    assert_eq!(
        BigQueryDialect::new().date_trunc("created_at", TimeGrain::Month),
        "DATE_TRUNC(created_at, MONTH)"
    );
    assert_eq!(
        MySqlDialect::new().date_trunc("created_at", TimeGrain::Day),
        "DATE(created_at)"
    );
}

#[test]
fn test_cast_type_names() {
    assert_eq!(
        SnowflakeDialect::new().cast("x", "timestamp").as_deref(),
        Some("CAST(x AS TIMESTAMP_NTZ)")
    );
    assert_eq!(BigQueryDialect::new().cast("x", "integer").as_deref(), Some("CAST(x AS INT64)"));
    assert!(DuckDbDialect::new().cast("x", "blob").is_none());
    for logical in LOGICAL_TYPES {
        for kind in DialectKind::ALL {
            assert!(dialect_for(kind).type_name(logical).is_some());
        }
    }
}

#[test]
fn test_parse_error_location() {
    let err = DuckDbDialect::new().parse("SELECT FROM WHERE").unwrap_err();
    assert!(matches!(err, SqlError::ParseError { .. }));
}

#[test]
fn test_full_join_support() {
    assert!(!MySqlDialect::new().supports_full_join());
    assert!(PostgresDialect::new().supports_full_join());
}

#[test]
fn test_mysql_date_trunc_yields_datetimes() {
    let mysql = MySqlDialect::new();
    for grain in [TimeGrain::Hour, TimeGrain::Month, TimeGrain::Year] {
        let sql = mysql.date_trunc("created_at", grain);
        assert!(sql.starts_with("STR_TO_DATE(DATE_FORMAT(created_at, "), "{}", sql);
    }
    assert_eq!(
        mysql.date_trunc("created_at", TimeGrain::Month),
        "STR_TO_DATE(DATE_FORMAT(created_at, '%Y-%m-01'), '%Y-%m-%d')"
    );
    assert!(mysql
        .parse("SELECT STR_TO_DATE(DATE_FORMAT(created_at, '%Y-01-01'), '%Y-%m-%d') FROM t")
        .is_ok());
}

#[test]
fn test_string_literal_per_dialect() {
    assert_eq!(PostgresDialect::new().string_literal("it's"), "'it''s'");
    assert_eq!(MySqlDialect::new().string_literal("a\\b"), "'a\\\\b'");
    assert_eq!(BigQueryDialect::new().string_literal("it's"), "'it\\'s'");
    assert_eq!(
        MySqlDialect::new().date_literal("2024-01-01"),
        "DATE '2024-01-01'"
    );
}

//! SQL identifier and literal helpers
//!
//! Dialect-specific quoting lives in `mx-sql`; these helpers cover the
//! dialect-neutral pieces shared by every crate.

/// Quote a SQL identifier with ANSI double quotes.
///
/// Embedded double quotes are escaped by doubling them.
///
/// # Examples
/// ```
/// use mx_core::sql_utils::quote_ident;
/// assert_eq!(quote_ident("users"), r#""users""#);
/// assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Last component of a possibly schema-qualified table name.
///
/// # Examples
/// ```
/// use mx_core::sql_utils::table_base_name;
/// assert_eq!(table_base_name("analytics.orders"), "orders");
/// assert_eq!(table_base_name("orders"), "orders");
/// ```
pub fn table_base_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Escape a SQL string literal value by doubling single quotes.
///
/// This is for use inside single-quoted SQL string literals, not identifiers.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Whether two table references name the same table (base name, case-insensitive)
pub fn same_table(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || table_base_name(a).eq_ignore_ascii_case(table_base_name(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_with_embedded_quotes() {
        assert_eq!(quote_ident(r#"a"b"#), r#""a""b""#);
    }

    #[test]
    fn test_escape_sql_string() {
        assert_eq!(escape_sql_string("O'Brien"), "O''Brien");
    }

    #[test]
    fn test_same_table() {
        assert!(same_table("public.orders", "ORDERS"));
        assert!(!same_table("orders", "customers"));
    }
}

//! Column reference extraction from metric expressions
//!
//! Expressions are parsed with sqlparser's generic dialect and walked with
//! `visit_expressions`. Fragments sqlparser rejects fall back to a regex
//! scan over the text with string literals removed.

use crate::params::blank_placeholders;
use regex::Regex;
use sqlparser::ast::{visit_expressions, Expr};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use std::ops::ControlFlow;
use std::sync::OnceLock;

/// A `table.column` reference found in an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnReference {
    /// Table (base name, as written)
    pub table: String,
    /// Column
    pub column: String,
}

impl std::fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

fn parse_expr(expr: &str) -> Option<Expr> {
    let text = blank_placeholders(expr, "NULL");
    let dialect = GenericDialect {};
    let mut parser = Parser::new(&dialect).try_with_sql(&text).ok()?;
    let parsed = parser.parse_expr().ok()?;
    // Trailing tokens mean the fragment was only partially understood
    if parser.peek_token().token != Token::EOF {
        return None;
    }
    Some(parsed)
}

/// Every identifier path in the expression, in first-appearance order
fn identifier_paths(expr: &str) -> Vec<Vec<String>> {
    let mut paths: Vec<Vec<String>> = Vec::new();
    let mut push = |path: Vec<String>| {
        if !paths.contains(&path) {
            paths.push(path);
        }
    };

    match parse_expr(expr) {
        Some(parsed) => {
            let _ = visit_expressions(&parsed, |e| {
                match e {
                    Expr::Identifier(ident) => push(vec![ident.value.clone()]),
                    Expr::CompoundIdentifier(idents) => {
                        push(idents.iter().map(|i| i.value.clone()).collect())
                    }
                    _ => {}
                }
                ControlFlow::<()>::Continue(())
            });
        }
        None => {
            log::debug!("Falling back to regex reference scan for '{}'", expr);
            for path in regex_paths(expr) {
                push(path);
            }
        }
    }
    paths
}

fn regex_paths(expr: &str) -> Vec<Vec<String>> {
    static STRINGS: OnceLock<Regex> = OnceLock::new();
    static PATHS: OnceLock<Regex> = OnceLock::new();
    let strings = STRINGS.get_or_init(|| Regex::new(r"'(?:[^']|'')*'").expect("string literal regex is valid"));
    let paths = PATHS.get_or_init(|| {
        Regex::new(r#""?([A-Za-z_][A-Za-z0-9_]*)"?\s*\.\s*"?([A-Za-z_][A-Za-z0-9_]*)"?"#)
            .expect("reference regex is valid")
    });
    let text = strings.replace_all(&blank_placeholders(expr, "NULL"), "''").into_owned();
    paths
        .captures_iter(&text)
        .map(|cap| vec![cap[1].to_string(), cap[2].to_string()])
        .collect()
}

/// `table.column` references in an expression, deduplicated, in order.
///
/// For `schema.table.column` the table is the middle part.
pub fn extract_column_references(expr: &str) -> Vec<ColumnReference> {
    identifier_paths(expr)
        .into_iter()
        .filter(|path| path.len() >= 2)
        .map(|path| ColumnReference {
            table: path[path.len() - 2].clone(),
            column: path[path.len() - 1].clone(),
        })
        .collect()
}

/// Every column referenced by an expression, qualified ones as `table.column`
pub fn extract_columns(expr: &str) -> Vec<String> {
    identifier_paths(expr)
        .into_iter()
        .map(|path| {
            if path.len() >= 2 {
                format!("{}.{}", path[path.len() - 2], path[path.len() - 1])
            } else {
                path.join(".")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_qualified_references() {
        let refs = extract_column_references(
            "SUM(orders.amount) / NULLIF(kpi_benchmarks.target, 0) + orders.amount",
        );
        assert_eq!(
            refs,
            vec![
                ColumnReference {
                    table: "orders".into(),
                    column: "amount".into()
                },
                ColumnReference {
                    table: "kpi_benchmarks".into(),
                    column: "target".into()
                },
            ]
        );
    }

    #[test]
    fn test_schema_qualified_reference_uses_table_part() {
        let refs = extract_column_references("analytics.orders.amount > 0");
        assert_eq!(refs[0].table, "orders");
        assert_eq!(refs[0].column, "amount");
    }

    #[test]
    fn test_placeholders_are_ignored() {
        let refs = extract_column_references("orders.created_at >= {{ start_date }}");
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_regex_fallback_skips_string_literals() {
        // Not a valid standalone expression, so the regex path is taken
        let refs = extract_column_references("orders.region = 'a.b' )( customers.tier");
        let tables: Vec<&str> = refs.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(tables, vec!["orders", "customers"]);
    }

    #[test]
    fn test_extract_columns_includes_unqualified() {
        assert_eq!(
            extract_columns("region = 'EMEA' AND orders.status <> 'void'"),
            vec!["region".to_string(), "orders.status".to_string()]
        );
    }
}

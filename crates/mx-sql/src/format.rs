//! In-query output formatting
//!
//! Folds `mode: in_query` formats into a SQL expression. Post-query formats
//! are skipped here and applied to result rows by the executor.

use crate::dialect::{SqlDialect, LOGICAL_TYPES};
use crate::error::{SqlError, SqlResult};
use mx_core::{FormatType, OutputFormat, TimeGrain};

/// Apply every in-query format to `expr`, in declaration order.
///
/// Parameters by format type:
/// - `cast`: `to` (one of [`LOGICAL_TYPES`])
/// - `calculate`: `operation` (`multiply|divide|add|subtract`) and `operand`, optional `round`
/// - `format`: `grain` (time truncation) or `decimals` (rounding)
/// - `combine`: `columns` (extra expressions) and optional `separator`
pub fn apply_in_query(
    metric: &str,
    expr: String,
    formats: &[OutputFormat],
    dialect: &dyn SqlDialect,
) -> SqlResult<String> {
    formats
        .iter()
        .filter(|f| f.is_in_query())
        .try_fold(expr, |acc, fmt| apply_one(metric, acc, fmt, dialect))
}

fn apply_one(
    metric: &str,
    expr: String,
    fmt: &OutputFormat,
    dialect: &dyn SqlDialect,
) -> SqlResult<String> {
    let invalid = |message: String| {
        SqlError::generation(metric, format!("format '{}': {}", fmt.name, message))
    };

    match fmt.format_type {
        FormatType::Raw => Ok(expr),
        FormatType::Cast => {
            let to = fmt
                .param_str("to")
                .ok_or_else(|| invalid("cast requires a 'to' type".to_string()))?;
            dialect.cast(&expr, to).ok_or_else(|| {
                invalid(format!(
                    "unknown cast type '{}' (expected one of {})",
                    to,
                    LOGICAL_TYPES.join(", ")
                ))
            })
        }
        FormatType::Calculate => {
            let operation = fmt
                .param_str("operation")
                .ok_or_else(|| invalid("calculate requires an 'operation'".to_string()))?;
            let operand = fmt
                .param_f64("operand")
                .ok_or_else(|| invalid("calculate requires a numeric 'operand'".to_string()))?;
            let computed = match operation {
                "multiply" => format!("({}) * {}", expr, operand),
                "divide" if operand == 0.0 => {
                    return Err(invalid("division by zero".to_string()));
                }
                "divide" => format!("({}) / {}", expr, operand),
                "add" => format!("({}) + {}", expr, operand),
                "subtract" => format!("({}) - {}", expr, operand),
                other => return Err(invalid(format!("unknown operation '{}'", other))),
            };
            Ok(match fmt.param_u64("round") {
                Some(places) => format!("ROUND({}, {})", computed, places),
                None => computed,
            })
        }
        FormatType::Format => {
            if let Some(grain) = fmt.param_str("grain") {
                let grain: TimeGrain = grain
                    .parse()
                    .map_err(|_| invalid(format!("unknown grain '{}'", grain)))?;
                Ok(dialect.date_trunc(&expr, grain))
            } else if let Some(places) = fmt.param_u64("decimals") {
                Ok(format!("ROUND({}, {})", expr, places))
            } else {
                Err(invalid(
                    "in-query format requires 'grain' or 'decimals'".to_string(),
                ))
            }
        }
        FormatType::Combine => {
            let columns = fmt.param_str_list("columns");
            if columns.is_empty() {
                return Err(invalid("combine requires 'columns'".to_string()));
            }
            let separator = fmt.param_str("separator").unwrap_or("");
            let mut parts = vec![expr];
            for column in columns {
                if !separator.is_empty() {
                    parts.push(dialect.string_literal(separator));
                }
                parts.push(column.to_string());
            }
            Ok(format!("CONCAT({})", parts.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{BigQueryDialect, DuckDbDialect};

    fn fmt(yaml: &str) -> OutputFormat {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_post_query_formats_are_skipped() {
        let formats = vec![fmt("name: pct\ntype: calculate\nparams: {operation: multiply, operand: 100}\n")];
        let out = apply_in_query("m", "x".into(), &formats, &DuckDbDialect::new()).unwrap();
        assert_eq!(out, "x");
    }

    #[test]
    fn test_chained_in_query_formats() {
        let formats = vec![
            fmt("name: pct\ntype: calculate\nmode: in_query\nparams: {operation: multiply, operand: 100, round: 2}\n"),
            fmt("name: as_text\ntype: cast\nmode: in_query\nparams: {to: string}\n"),
        ];
        let out = apply_in_query("m", "SUM(a)".into(), &formats, &BigQueryDialect::new()).unwrap();
        assert_eq!(out, "CAST(ROUND((SUM(a)) * 100, 2) AS STRING)");
    }

    #[test]
    fn test_grain_and_combine() {
        let month = fmt("name: month\ntype: format\nmode: in_query\nparams: {grain: month}\n");
        let out = apply_in_query("m", "d".into(), &[month], &DuckDbDialect::new()).unwrap();
        assert_eq!(out, "DATE_TRUNC('month', d)");

        let combine = fmt("name: full\ntype: combine\nmode: in_query\nparams: {columns: [last_name], separator: ' '}\n");
        let out = apply_in_query("m", "first_name".into(), &[combine], &DuckDbDialect::new()).unwrap();
        assert_eq!(out, "CONCAT(first_name, ' ', last_name)");
    }

    #[test]
    fn test_invalid_formats() {
        let bad_cast = fmt("name: c\ntype: cast\nmode: in_query\nparams: {to: blob}\n");
        assert!(apply_in_query("m", "x".into(), &[bad_cast], &DuckDbDialect::new()).is_err());
        let div0 = fmt("name: d\ntype: calculate\nmode: in_query\nparams: {operation: divide, operand: 0}\n");
        assert!(apply_in_query("m", "x".into(), &[div0], &DuckDbDialect::new()).is_err());
    }
}

//! Post-query output formatting over result rows
//!
//! Formats with `mode: post_query` run here, after execution, in declaration
//! order. Parameters by format type:
//! - `cast`: `to` (`string|integer|number|boolean`)
//! - `calculate`: `operation` (`multiply|divide|add|subtract`), `operand`, optional `round`
//! - `format`: optional `decimals`, `prefix`, `suffix`, `date_format` (chrono pattern)
//! - `combine`: `columns` (other output names) and optional `separator`

use crate::error::{EngineError, EngineResult};
use chrono::{NaiveDate, NaiveDateTime};
use mx_core::{FormatType, OutputFormat, SemanticMetric};
use mx_db::Row;
use serde_json::{Number, Value};

fn post_query(formats: &[OutputFormat]) -> Vec<&OutputFormat> {
    formats.iter().filter(|f| !f.is_in_query()).collect()
}

/// Output names and their post-query formats, in select order
fn formatted_outputs(metric: &SemanticMetric) -> Vec<(&str, Vec<&OutputFormat>)> {
    metric
        .dimensions
        .iter()
        .map(|d| (d.name.as_str(), post_query(&d.formatting)))
        .chain(metric.measures.iter().map(|m| (m.name.as_str(), post_query(&m.formatting))))
        .chain(
            metric
                .derived_measures
                .iter()
                .map(|d| (d.name.as_str(), post_query(&d.formatting))),
        )
        .filter(|(_, formats)| !formats.is_empty())
        .collect()
}

/// Whether the metric declares any post-query format
pub fn has_post_query_formats(metric: &SemanticMetric) -> bool {
    !formatted_outputs(metric).is_empty()
}

/// Apply every post-query format of `metric` to `rows` in place
pub fn apply_post_query(metric: &SemanticMetric, rows: &mut [Row]) -> EngineResult<()> {
    let outputs = formatted_outputs(metric);
    if outputs.is_empty() {
        return Ok(());
    }
    for row in rows.iter_mut() {
        for (field, formats) in &outputs {
            for fmt in formats {
                let current = row.get(*field).cloned().unwrap_or(Value::Null);
                let value = apply_one(field, current, fmt, row)?;
                row.insert(field.to_string(), value);
            }
        }
    }
    Ok(())
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn number(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn round(f: f64, places: u64) -> f64 {
    let factor = 10f64.powi(places.min(15) as i32);
    (f * factor).round() / factor
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn apply_one(field: &str, value: Value, fmt: &OutputFormat, row: &Row) -> EngineResult<Value> {
    let fail = |message: String| EngineError::Format {
        field: field.to_string(),
        format: fmt.name.clone(),
        message,
    };

    if value.is_null() && fmt.format_type != FormatType::Combine {
        return Ok(Value::Null);
    }

    match fmt.format_type {
        FormatType::Raw => Ok(value),
        FormatType::Cast => {
            let to = fmt
                .param_str("to")
                .ok_or_else(|| fail("cast requires a 'to' type".to_string()))?;
            match to {
                "string" => Ok(Value::String(text(&value))),
                "number" => as_f64(&value)
                    .map(number)
                    .ok_or_else(|| fail(format!("'{}' is not numeric", text(&value)))),
                "integer" => as_f64(&value)
                    .map(|f| Value::from(f.trunc() as i64))
                    .ok_or_else(|| fail(format!("'{}' is not numeric", text(&value)))),
                "boolean" => match &value {
                    Value::Bool(b) => Ok(Value::Bool(*b)),
                    Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                        "true" | "t" | "yes" | "1" => Ok(Value::Bool(true)),
                        "false" | "f" | "no" | "0" => Ok(Value::Bool(false)),
                        other => Err(fail(format!("'{}' is not a boolean", other))),
                    },
                    other => as_f64(other)
                        .map(|f| Value::Bool(f != 0.0))
                        .ok_or_else(|| fail(format!("'{}' is not a boolean", text(other)))),
                },
                other => Err(fail(format!("unknown cast type '{}'", other))),
            }
        }
        FormatType::Calculate => {
            let operation = fmt
                .param_str("operation")
                .ok_or_else(|| fail("calculate requires an 'operation'".to_string()))?;
            let operand = fmt
                .param_f64("operand")
                .ok_or_else(|| fail("calculate requires a numeric 'operand'".to_string()))?;
            let x = as_f64(&value).ok_or_else(|| fail(format!("'{}' is not numeric", text(&value))))?;
            let computed = match operation {
                "multiply" => x * operand,
                "divide" if operand == 0.0 => return Err(fail("division by zero".to_string())),
                "divide" => x / operand,
                "add" => x + operand,
                "subtract" => x - operand,
                other => return Err(fail(format!("unknown operation '{}'", other))),
            };
            Ok(number(match fmt.param_u64("round") {
                Some(places) => round(computed, places),
                None => computed,
            }))
        }
        FormatType::Format => {
            if let Some(pattern) = fmt.param_str("date_format") {
                let raw = text(&value);
                let formatted = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
                    .map(|dt| dt.format(pattern).to_string())
                    .or_else(|_| {
                        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map(|d| d.format(pattern).to_string())
                    })
                    .map_err(|_| fail(format!("'{}' is not a date", raw)))?;
                return Ok(Value::String(formatted));
            }
            let body = match fmt.param_u64("decimals") {
                Some(places) => {
                    let x = as_f64(&value)
                        .ok_or_else(|| fail(format!("'{}' is not numeric", text(&value))))?;
                    format!("{:.*}", places as usize, x)
                }
                None => text(&value),
            };
            Ok(Value::String(format!(
                "{}{}{}",
                fmt.param_str("prefix").unwrap_or_default(),
                body,
                fmt.param_str("suffix").unwrap_or_default()
            )))
        }
        FormatType::Combine => {
            let columns = fmt.param_str_list("columns");
            if columns.is_empty() {
                return Err(fail("combine requires 'columns'".to_string()));
            }
            let separator = fmt.param_str("separator").unwrap_or(" ");
            let mut parts = vec![text(&value)];
            for column in columns {
                let other = row
                    .get(column)
                    .ok_or_else(|| fail(format!("unknown output '{}'", column)))?;
                parts.push(text(other));
            }
            Ok(Value::String(parts.join(separator)))
        }
    }
}

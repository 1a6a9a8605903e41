//! `{{param}}` placeholder discovery, validation, and typed binding
//!
//! Placeholders are rendered through minijinja with strict undefined
//! behavior; every bound value is a ready-to-splice SQL literal.

use crate::dialect::SqlDialect;
use crate::error::{SqlError, SqlResult};
use minijinja::{Environment, UndefinedBehavior};
use mx_core::{ParameterType, SemanticMetric};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Caller-supplied parameter values
pub type ParameterValues = BTreeMap<String, Value>;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Placeholder names in `text`, in first-appearance order
pub fn find_placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for cap in placeholder_regex().captures_iter(text) {
        let name = cap[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Whether `text` is exactly one placeholder
pub fn as_single_placeholder(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let caps = placeholder_regex().captures(trimmed)?;
    if caps.get(0)?.as_str().len() != trimmed.len() {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

/// Replace every placeholder with `replacement` (used before parsing expressions)
pub fn blank_placeholders(text: &str, replacement: &str) -> String {
    placeholder_regex().replace_all(text, replacement).into_owned()
}

/// Every placeholder used by a metric's expressions, in first-appearance order
pub fn metric_placeholders(metric: &SemanticMetric) -> Vec<String> {
    let mut texts: Vec<&str> = Vec::new();
    if let Some(query) = &metric.query {
        texts.push(query);
    }
    texts.extend(metric.dimensions.iter().map(|d| d.query.as_str()));
    texts.extend(metric.measures.iter().map(|m| m.query.as_str()));
    for filter in &metric.filters {
        if let Some(text) = filter.referenced_text() {
            texts.push(text);
        }
        texts.extend(filter.values.iter().filter_map(Value::as_str));
    }

    let mut names: Vec<String> = Vec::new();
    for text in texts {
        for name in find_placeholders(text) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Parameters bound to SQL literals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundParameters {
    literals: BTreeMap<String, String>,
}

impl BoundParameters {
    /// SQL literal bound to `name`
    pub fn literal(&self, name: &str) -> Option<&str> {
        self.literals.get(name).map(String::as_str)
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Bound literals by name
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.literals
    }

    /// Substitute every placeholder in `text` with its literal
    pub fn render(&self, text: &str) -> SqlResult<String> {
        if !text.contains("{{") {
            return Ok(text.to_string());
        }
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.render_str(text, &self.literals).map_err(|e| {
            let name = find_placeholders(text)
                .into_iter()
                .find(|n| !self.literals.contains_key(n))
                .unwrap_or_else(|| "<template>".to_string());
            SqlError::parameter(&name, e.to_string())
        })
    }
}

/// Validate supplied values against the metric's declarations and bind them.
///
/// Declared parameters take the supplied value, else their default; a
/// required parameter with neither fails. Placeholders that are not declared
/// must be supplied and are typed from the value itself.
pub fn bind_parameters(
    metric: &SemanticMetric,
    values: &ParameterValues,
    dialect: &dyn SqlDialect,
) -> SqlResult<BoundParameters> {
    let mut literals = BTreeMap::new();

    for param in &metric.parameters {
        let literal = match values.get(&param.name).or(param.default.as_ref()) {
            Some(value) => coerce(&param.name, value, Some(param.parameter_type), dialect)?,
            None if param.required => {
                return Err(SqlError::parameter(
                    &param.name,
                    format!("required {} parameter has no value", param.parameter_type),
                ))
            }
            None => "NULL".to_string(),
        };
        literals.insert(param.name.clone(), literal);
    }

    for name in metric_placeholders(metric) {
        if literals.contains_key(&name) {
            continue;
        }
        let Some(value) = values.get(&name) else {
            return Err(SqlError::parameter(
                &name,
                "placeholder is not declared and no value was supplied",
            ));
        };
        literals.insert(name.clone(), coerce(&name, value, None, dialect)?);
    }

    for name in values.keys() {
        if !literals.contains_key(name) {
            log::debug!("Ignoring unused parameter '{}' for metric '{}'", name, metric.id);
        }
    }

    Ok(BoundParameters { literals })
}

fn coerce(
    name: &str,
    value: &Value,
    declared: Option<ParameterType>,
    dialect: &dyn SqlDialect,
) -> SqlResult<String> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(SqlError::parameter(name, "list value is empty"));
            }
            let parts = items
                .iter()
                .map(|item| match item {
                    Value::Array(_) => Err(SqlError::parameter(name, "nested lists are not allowed")),
                    other => coerce(name, other, declared, dialect),
                })
                .collect::<SqlResult<Vec<_>>>()?;
            Ok(parts.join(", "))
        }
        Value::Null => Ok("NULL".to_string()),
        _ => match declared {
            Some(ParameterType::Date) => coerce_date(name, value, dialect),
            Some(ParameterType::Number) => coerce_number(name, value),
            Some(ParameterType::String) => Ok(match value {
                Value::String(s) => dialect.string_literal(s),
                other => dialect.string_literal(&other.to_string()),
            }),
            None => Ok(match value {
                Value::Number(n) => n.to_string(),
                Value::Bool(true) => "TRUE".to_string(),
                Value::Bool(false) => "FALSE".to_string(),
                Value::String(s) => dialect.string_literal(s),
                other => dialect.string_literal(&other.to_string()),
            }),
        },
    }
}

fn coerce_date(name: &str, value: &Value, dialect: &dyn SqlDialect) -> SqlResult<String> {
    let Value::String(s) = value else {
        return Err(SqlError::parameter(name, format!("expected a date, got {}", value)));
    };
    let text = s.trim();
    let date = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .ok_or_else(|| {
            SqlError::parameter(name, format!("'{}' is not a YYYY-MM-DD date", text))
        })?;
    Ok(dialect.date_literal(&date.format("%Y-%m-%d").to_string()))
}

fn coerce_number(name: &str, value: &Value) -> SqlResult<String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(s.trim().to_string()),
            _ => Err(SqlError::parameter(name, format!("'{}' is not a number", s))),
        },
        other => Err(SqlError::parameter(name, format!("expected a number, got {}", other))),
    }
}

/// Plausible values for every declared parameter and placeholder, used for
/// dry-run generation
pub fn sample_parameters(metric: &SemanticMetric) -> ParameterValues {
    let mut values = ParameterValues::new();
    for param in &metric.parameters {
        let value = param.default.clone().unwrap_or_else(|| match param.parameter_type {
            ParameterType::Date => Value::String("2024-01-01".to_string()),
            ParameterType::Number => Value::from(1),
            ParameterType::String => Value::String("sample".to_string()),
        });
        values.insert(param.name.clone(), value);
    }
    for name in metric_placeholders(metric) {
        values
            .entry(name)
            .or_insert_with(|| Value::String("sample".to_string()));
    }
    values
}

#[cfg(test)]
#[path = "params_test.rs"]
mod tests;

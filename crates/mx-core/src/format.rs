//! Output formatting definitions attached to measures and dimensions
//!
//! A format either folds into the generated SQL (`in_query`) or runs over the
//! result rows once the query has executed (`post_query`). Post-query formats
//! never touch SQL text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of transform a format applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatType {
    /// No transform
    Raw,
    /// Concatenate several values into one
    Combine,
    /// Arithmetic over the value
    Calculate,
    /// Presentation formatting (date truncation in-query, number/string formatting post-query)
    Format,
    /// Type conversion
    Cast,
}

impl std::fmt::Display for FormatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FormatType::Raw => "raw",
            FormatType::Combine => "combine",
            FormatType::Calculate => "calculate",
            FormatType::Format => "format",
            FormatType::Cast => "cast",
        };
        f.write_str(s)
    }
}

/// Where a format is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormatMode {
    /// Folded into the generated SQL expression
    InQuery,
    /// Applied to result rows after execution
    #[default]
    PostQuery,
}

/// A named output format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFormat {
    /// Format name (informational)
    pub name: String,
    /// Transform kind
    #[serde(rename = "type")]
    pub format_type: FormatType,
    /// Application mode
    #[serde(default)]
    pub mode: FormatMode,
    /// Transform-specific parameters
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl OutputFormat {
    /// Whether this format is folded into SQL
    pub fn is_in_query(&self) -> bool {
        self.mode == FormatMode::InQuery
    }

    /// String parameter lookup
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Numeric parameter lookup (accepts numbers and numeric strings)
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Unsigned integer parameter lookup
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// List-of-strings parameter lookup
    pub fn param_str_list(&self, key: &str) -> Vec<&str> {
        self.params
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

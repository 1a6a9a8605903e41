//! Shared utilities for CLI commands

use anyhow::{bail, Result};
use mx_sql::ParameterValues;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main.rs exits without printing it
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Parse repeated `name=value` arguments.
///
/// Values that parse as JSON (numbers, booleans, arrays) keep that type;
/// anything else is a string.
pub(crate) fn parse_params(raw: &[String]) -> Result<ParameterValues> {
    let mut params = ParameterValues::new();
    for item in raw {
        let Some((name, value)) = item.split_once('=') else {
            bail!("Invalid --param '{}': expected NAME=VALUE", item);
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("Invalid --param '{}': empty parameter name", item);
        }
        let parsed = serde_json::from_str::<Value>(value)
            .ok()
            .filter(|v| !v.is_object() && !v.is_null())
            .unwrap_or_else(|| Value::String(value.to_string()));
        params.insert(name.to_string(), parsed);
    }
    Ok(params)
}

/// Display text for a result cell
pub(crate) fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Print `data` as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize + ?Sized>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Table-printing utilities
// ---------------------------------------------------------------------------

/// Calculate column widths for a table given headers and row data.
///
/// For each column, returns the maximum width across the header and all
/// row values so that data aligns when printed with left-padding.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }
    widths
}

/// Print a formatted table to stdout.
///
/// Prints a left-aligned header row, a separator line of dashes, and each
/// data row. Columns are separated by two spaces.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  ").trim_end());

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  ").trim_end());
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;

//! DuckDB value to JSON conversion

use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ValueRef};
use serde_json::{Number, Value};

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Convert one DuckDB cell to JSON.
///
/// Dates render as `YYYY-MM-DD`, timestamps as `YYYY-MM-DD HH:MM:SS`.
/// HUGEINT values outside the i64 range and unhandled types fall back to text.
pub(crate) fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(n) => n.into(),
        ValueRef::SmallInt(n) => n.into(),
        ValueRef::Int(n) => n.into(),
        ValueRef::BigInt(n) => n.into(),
        ValueRef::HugeInt(n) => i64::try_from(n)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(n.to_string())),
        ValueRef::UTinyInt(n) => n.into(),
        ValueRef::USmallInt(n) => n.into(),
        ValueRef::UInt(n) => n.into(),
        ValueRef::UBigInt(n) => n.into(),
        ValueRef::Float(f) => float(f64::from(f)),
        ValueRef::Double(f) => float(f),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>().map(float).unwrap_or(Value::String(text))
        }
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        ValueRef::Timestamp(unit, value) => DateTime::from_timestamp_micros(micros(unit, value))
            .map(|dt| Value::String(dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
        other => Value::String(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(value_to_json(ValueRef::Null), Value::Null);
        assert_eq!(value_to_json(ValueRef::Int(7)), Value::from(7));
        assert_eq!(value_to_json(ValueRef::HugeInt(42)), Value::from(42));
        assert_eq!(value_to_json(ValueRef::Double(1.5)), Value::from(1.5));
        assert_eq!(value_to_json(ValueRef::Double(f64::NAN)), Value::Null);
        assert_eq!(value_to_json(ValueRef::Text(b"emea")), Value::from("emea"));
    }

    #[test]
    fn test_dates() {
        assert_eq!(value_to_json(ValueRef::Date32(0)), Value::from("1970-01-01"));
        assert_eq!(value_to_json(ValueRef::Date32(19_723)), Value::from("2024-01-01"));
        assert_eq!(
            value_to_json(ValueRef::Timestamp(TimeUnit::Second, 86_400)),
            Value::from("1970-01-02 00:00:00")
        );
    }
}

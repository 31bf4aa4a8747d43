//! Defensive field readers for operator response entries.
//!
//! Every reader returns `Err(reason)` for a malformed field so the adapter can
//! drop just that entry and keep the rest of the response.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use ferry_core::{AdapterError, AdapterResult};
use rust_decimal::Decimal;
use serde_json::Value;

pub(crate) type EntryResult<T> = Result<T, String>;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Locate the array of result entries. A body without it is a whole-response failure.
pub(crate) fn entries<'a>(body: &'a Value, field: &str) -> AdapterResult<&'a [Value]> {
    match body.get(field) {
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(Value::Null) | None if body.is_object() => Ok(&[][..]),
        Some(_) => Err(AdapterError::invalid_response(format!("'{}' is not an array", field))),
        None => Err(AdapterError::invalid_response("response body is not a JSON object")),
    }
}

/// Strings and integers are both accepted for identifiers.
pub(crate) fn required_id(entry: &Value, field: &str) -> EntryResult<String> {
    match entry.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(format!("'{}' is not a valid identifier", field)),
        None => Err(format!("missing '{}'", field)),
    }
}

pub(crate) fn optional_str(entry: &Value, field: &str) -> Option<String> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn timestamp(entry: &Value, field: &str) -> EntryResult<DateTime<Utc>> {
    let raw = entry
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing '{}'", field))?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    // Operators without an offset report times as UTC.
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{}' is not a timestamp: {}", field, raw))
}

/// Non-negative integer field. `default` is used when the field is absent or null.
pub(crate) fn count(entry: &Value, field: &str, default: Option<u32>) -> EntryResult<u32> {
    match entry.get(field) {
        None | Some(Value::Null) => default.ok_or_else(|| format!("missing '{}'", field)),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| format!("'{}' must be a non-negative integer, got {}", field, n)),
        Some(other) => Err(format!("'{}' must be a number, got {}", field, other)),
    }
}

/// Exact decimal price from either a JSON number or a string. Negative prices are rejected.
pub(crate) fn price(entry: &Value, field: &str) -> EntryResult<Decimal> {
    let raw = match entry.get(field) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => return Err(format!("'{}' must be a number, got {}", field, other)),
        None => return Err(format!("missing '{}'", field)),
    };

    let value = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| format!("'{}' is not a price: {}", field, raw))?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(format!("'{}' must not be negative: {}", field, raw));
    }

    Ok(value)
}

pub(crate) fn string_list(entry: &Value, field: &str) -> Vec<String> {
    entry
        .get(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Duration in minutes, computed from the timestamps when the operator omits it.
pub(crate) fn duration_minutes(
    entry: &Value,
    field: &str,
    departure: DateTime<Utc>,
    arrival: DateTime<Utc>,
) -> EntryResult<u32> {
    if arrival < departure {
        return Err("arrival precedes departure".to_string());
    }

    match entry.get(field) {
        None | Some(Value::Null) => u32::try_from((arrival - departure).num_minutes())
            .map_err(|_| "duration out of range".to_string()),
        Some(_) => count(entry, field, None),
    }
}

//! Property value coercion used by component setters.
//!
//! Configuration arrives as loosely typed JSON/TOML values; each setter
//! converts through these helpers so a bad value names the class and
//! property it was meant for.

use crate::error::{Result, TrellisError};
use serde_json::Value;

/// Split a comma/space separated list, lowercasing each item.
pub fn split_list(spec: &str) -> Vec<String> {
    spec.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Split a comma/space separated list, keeping case.
pub fn split_list_raw(spec: &str) -> Vec<String> {
    spec.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn as_bool(class: &str, property: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(TrellisError::invalid_property(
                class,
                property,
                format!("expected a boolean, got \"{}\"", other),
            )),
        },
        Value::Null => Ok(false),
        _ => Err(TrellisError::invalid_property(
            class,
            property,
            "expected a boolean",
        )),
    }
}

pub fn as_string(class: &str, property: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(TrellisError::invalid_property(
            class,
            property,
            "expected a string",
        )),
    }
}

pub fn as_opt_string(class: &str, property: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        other => as_string(class, property, other).map(Some),
    }
}

pub fn as_u64(class: &str, property: &str, value: &Value) -> Result<u64> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        TrellisError::invalid_property(class, property, "expected a non-negative integer")
    })
}

pub fn as_f64(class: &str, property: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| TrellisError::invalid_property(class, property, "expected a number"))
}

/// A list given either as an array of strings or a comma/space separated string.
pub fn as_list(class: &str, property: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(split_list_raw(s)),
        Value::Array(items) => items
            .iter()
            .map(|item| as_string(class, property, item))
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(TrellisError::invalid_property(
            class,
            property,
            "expected a list or a comma separated string",
        )),
    }
}

/// Loose string form of a scalar, for non-strict comparisons.
pub fn loose_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

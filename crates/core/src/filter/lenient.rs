//! Deserializers that never fail on bad client input.
//!
//! Each one reads the raw JSON value and returns "not set" for anything it
//! cannot interpret.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::RangeInput;

/// A finite number from a JSON number or numeric string.
pub(super) fn number_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub(super) fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_value(&value))
}

pub(super) fn range<'de, D>(deserializer: D) -> Result<Option<RangeInput>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(fields) = value else {
        return Ok(None);
    };
    Ok(Some(RangeInput {
        min: fields.get("min").and_then(number_value),
        max: fields.get("max").and_then(number_value),
    }))
}

pub(super) fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

pub(super) fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // checked integral and non-negative
pub(super) fn indices<'de, D>(deserializer: D) -> Result<Vec<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter_map(number_value)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= 1024.0)
        .map(|n| n as usize)
        .collect())
}

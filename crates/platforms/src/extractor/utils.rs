//! Lenient field decoders for loosely typed platform payloads.
//!
//! Platforms mix numbers, numeric strings, floats and `null` for the same
//! field. These decoders accept all of them and map anything unusable to
//! `None` instead of failing the whole document.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn normalize_number(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::String(s)) => s
            .trim()
            .parse::<serde_json::Number>()
            .ok()
            .map(Value::Number),
        other => other,
    }
}

#[inline]
fn as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(normalize_number(value).as_ref().and_then(as_u64))
}

pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u64(deserializer)?.and_then(|v| u32::try_from(v).ok()))
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(normalize_number(value).and_then(|v| v.as_i64()))
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(normalize_number(value).and_then(|v| v.as_f64()))
}

//! Field map values
//!
//! Every CRUD boundary of the core speaks in field maps: loosely-typed,
//! JSON-shaped records keyed by camelCase field name. [`Value`] keeps that
//! contract while giving the rest of the crate something it can match on.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A loosely-typed record, keyed by field name.
pub type FieldMap = BTreeMap<String, Value>;

/// Unix time of the reference epoch (2001-01-01T00:00:00Z) that
/// `ZTIMESTAMP` columns count from.
pub const REFERENCE_EPOCH_UNIX: i64 = 978_307_200;

/// A single field value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    StringArray(Vec<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) if d.fract() == 0.0 => Some(*d as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// True for null and for text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StringArray(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::StringArray(
                items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            object @ serde_json::Value::Object(_) => Value::Text(object.to_string()),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => serde_json::Value::from(bytes.clone()),
            Value::StringArray(items) => serde_json::Value::from(items.clone()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

/// Convert a JSON object into a field map. Non-objects yield `None`.
pub fn field_map_from_json(json: serde_json::Value) -> Option<FieldMap> {
    match json {
        serde_json::Value::Object(map) => Some(
            map.into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect(),
        ),
        _ => None,
    }
}

/// Render a field map as a JSON object.
pub fn field_map_to_json(fields: &FieldMap) -> serde_json::Value {
    serde_json::Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
            .collect(),
    )
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

/// Seconds since the reference epoch for a UTC instant.
pub fn to_reference_seconds(instant: DateTime<Utc>) -> f64 {
    let unix = instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_millis()) / 1000.0;
    unix - REFERENCE_EPOCH_UNIX as f64
}

/// UTC instant for a stored reference-epoch offset.
pub fn from_reference_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = ((seconds + REFERENCE_EPOCH_UNIX as f64) * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

/// ISO-8601 rendering of a stored timestamp, as handed to consumers.
pub fn iso8601(seconds: f64) -> Option<String> {
    from_reference_seconds(seconds).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Interpret a caller-supplied timestamp: RFC 3339 text, or a numeric
/// reference-epoch offset.
pub fn parse_timestamp(value: &Value) -> Option<f64> {
    match value {
        Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| to_reference_seconds(dt.with_timezone(&Utc))),
        Value::Int(i) => Some(*i as f64),
        Value::Double(d) if d.is_finite() => Some(*d),
        _ => None,
    }
}

//! Row decoding
//!
//! Two decoders turn producer rows into field maps. The primary one walks
//! the static column map and decodes each column by its declared type. The
//! raw one is driven by whatever columns the row happens to carry and is
//! only used for diagnostics.

use rusqlite::Row;
use rusqlite::types::ValueRef;

use crate::schema::{FieldType, ID_COLUMN, TableSpec, TIMESTAMP_COLUMN};
use crate::value::{FieldMap, Value, iso8601};

/// A decoded producer row
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub id: String,
    /// Reference-epoch seconds, kept numeric for ordering
    pub timestamp: Option<f64>,
    /// Field map including `id` and the ISO-8601 `timestamp`
    pub fields: FieldMap,
}

fn column_index(row: &Row<'_>, column: &str) -> Option<usize> {
    row.as_ref().column_index(column).ok()
}

fn text_of(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Integer(i) => Value::Text(i.to_string()),
        ValueRef::Real(d) => Value::Text(d.to_string()),
    }
}

/// Timestamp columns are declared `TIMESTAMP` and may hold REAL or INTEGER.
pub(crate) fn timestamp_of(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Real(d) => Some(d),
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}

fn string_list_of(field: &str, value: ValueRef<'_>) -> Value {
    let bytes = match value {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => bytes,
        ValueRef::Null => return Value::StringArray(Vec::new()),
        other => {
            tracing::warn!(field, kind = ?other.data_type(), "List column holds a scalar");
            return Value::StringArray(Vec::new());
        }
    };
    match serde_json::from_slice::<Vec<String>>(bytes) {
        Ok(items) => Value::StringArray(items),
        Err(e) => {
            tracing::warn!(field, error = %e, "Failed to decode list blob");
            Value::StringArray(Vec::new())
        }
    }
}

fn typed_value(field: &str, ty: FieldType, value: ValueRef<'_>) -> Value {
    match (ty, value) {
        (FieldType::StringList, value) => string_list_of(field, value),
        (_, ValueRef::Null) => Value::Null,
        (FieldType::Text, value) => text_of(value),
        (FieldType::Integer, ValueRef::Integer(i)) => Value::Int(i),
        (FieldType::Integer, ValueRef::Real(d)) => Value::Int(d as i64),
        (FieldType::Double, ValueRef::Real(d)) => Value::Double(d),
        (FieldType::Double, ValueRef::Integer(i)) => Value::Double(i as f64),
        (FieldType::Bool, ValueRef::Integer(i)) => Value::Bool(i != 0),
        (FieldType::Bool, ValueRef::Real(d)) => Value::Bool(d != 0.0),
        (ty, other) => {
            let parsed = match (ty, text_of(other)) {
                (FieldType::Integer, Value::Text(s)) => s.trim().parse().ok().map(Value::Int),
                (FieldType::Double, Value::Text(s)) => s.trim().parse().ok().map(Value::Double),
                (FieldType::Bool, Value::Text(s)) => match s.trim() {
                    "1" | "true" => Some(Value::Bool(true)),
                    "0" | "false" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            };
            parsed.unwrap_or_else(|| {
                tracing::warn!(field, "Column value does not match its declared type");
                Value::Null
            })
        }
    }
}

/// Decode a row over the static column map. Columns the row lacks are
/// skipped, so older producer schemas still decode.
pub fn decode_row(spec: &TableSpec, row: &Row<'_>) -> rusqlite::Result<DecodedRecord> {
    let mut fields = FieldMap::new();

    let id = match column_index(row, ID_COLUMN) {
        Some(idx) => match text_of(row.get_ref(idx)?) {
            Value::Text(s) => s,
            _ => String::new(),
        },
        None => String::new(),
    };
    fields.insert("id".to_string(), Value::Text(id.clone()));

    let timestamp = match column_index(row, TIMESTAMP_COLUMN) {
        Some(idx) => timestamp_of(row.get_ref(idx)?),
        None => None,
    };
    fields.insert(
        "timestamp".to_string(),
        timestamp
            .and_then(iso8601)
            .map(Value::Text)
            .unwrap_or_default(),
    );

    for column in spec.columns {
        let Some(idx) = column_index(row, column.column) else {
            continue;
        };
        let value = typed_value(column.field, column.ty, row.get_ref(idx)?);
        fields.insert(column.field.to_string(), value);
    }

    Ok(DecodedRecord {
        id,
        timestamp,
        fields,
    })
}

/// Field key for a column the catalogue does not map: drop the one-letter
/// storage prefix and lower-camel the rest. Word boundaries come from `_`
/// or from existing mixed case; an all-caps run without either (the
/// producer's usual `ZMOODSCORE`) has none to recover and is lowercased.
fn raw_field_name(column: &str) -> String {
    let stripped = column
        .strip_prefix('Z')
        .or_else(|| column.strip_prefix('z'))
        .unwrap_or(column);
    let all_caps = !stripped.chars().any(|c| c.is_ascii_lowercase());

    let mut key = String::with_capacity(stripped.len());
    for word in stripped.split('_').filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        let rest: String = if all_caps {
            chars.as_str().to_ascii_lowercase()
        } else {
            chars.as_str().to_string()
        };
        if key.is_empty() {
            key.push(first.to_ascii_lowercase());
        } else {
            key.push(first.to_ascii_uppercase());
        }
        key.push_str(&rest);
    }
    key
}

/// Decode every non-housekeeping column of a row by storage type.
pub fn decode_raw(spec: &TableSpec, row: &Row<'_>) -> rusqlite::Result<FieldMap> {
    let names: Vec<String> = row
        .as_ref()
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut fields = FieldMap::new();
    for (idx, name) in names.iter().enumerate() {
        if name.starts_with("Z_") {
            continue;
        }
        let raw = row.get_ref(idx)?;

        if name.eq_ignore_ascii_case(TIMESTAMP_COLUMN) {
            let value = timestamp_of(raw)
                .and_then(iso8601)
                .map(Value::Text)
                .unwrap_or_default();
            fields.insert("timestamp".to_string(), value);
            continue;
        }

        let key = if name.eq_ignore_ascii_case(ID_COLUMN) {
            "id".to_string()
        } else {
            spec.field_for_column(name)
                .map(|c| c.field.to_string())
                .unwrap_or_else(|| raw_field_name(name))
        };

        let value = match raw {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(d) => Value::Double(d),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => match serde_json::from_slice::<Vec<String>>(bytes) {
                Ok(items) => Value::StringArray(items),
                Err(_) => Value::Bytes(bytes.to_vec()),
            },
        };
        fields.insert(key, value);
    }
    Ok(fields)
}

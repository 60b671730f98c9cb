//! Value parsing and decoding
//!
//! Parsing is driven by the declared `DataType`; a value is never sniffed
//! for JSON and silently downgraded to a string.

use crate::types::{CacheValue, DataType, ValueError};

/// Parse a JSON document
pub fn parse_json(input: &str) -> Result<serde_json::Value, ValueError> {
    serde_json::from_str(input).map_err(|e| ValueError::InvalidJson(e.to_string()))
}

/// Interpret caller input as a value of the declared type
pub fn parse_value(input: &str, data_type: DataType) -> Result<CacheValue, ValueError> {
    match data_type {
        DataType::String => Ok(CacheValue::Raw(input.to_string())),
        DataType::Json => parse_json(input).map(CacheValue::Json),
        DataType::Hash => Err(ValueError::UnsupportedType(DataType::Hash)),
    }
}

/// Decode a stored string read back from the store
pub fn decode_stored(raw: String, data_type: DataType) -> Result<CacheValue, ValueError> {
    match data_type {
        DataType::String => Ok(CacheValue::Raw(raw)),
        DataType::Json => parse_json(&raw).map(CacheValue::Json),
        DataType::Hash => Err(ValueError::UnsupportedType(DataType::Hash)),
    }
}

/// Convert a JSON value coming from an input record into a value of the
/// declared type. Strings are parsed for `Json`; any other JSON value is
/// taken as the document itself.
pub fn value_from_json(value: &serde_json::Value, data_type: DataType) -> Result<CacheValue, ValueError> {
    match (data_type, value) {
        (DataType::String, serde_json::Value::String(s)) => Ok(CacheValue::Raw(s.clone())),
        (DataType::String, other) => Ok(CacheValue::Raw(other.to_string())),
        (DataType::Json, serde_json::Value::String(s)) => parse_json(s).map(CacheValue::Json),
        (DataType::Json, other) => Ok(CacheValue::Json(other.clone())),
        (DataType::Hash, _) => Err(ValueError::UnsupportedType(DataType::Hash)),
    }
}

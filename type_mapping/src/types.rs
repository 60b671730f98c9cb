//! Type mapping definitions
//!
//! This module provides the caller-declared data types and the tagged
//! value representation used when reading and writing cache entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Data type a caller declares for a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Opaque string, stored as-is
    String,
    /// JSON document, validated and stored in compact form
    Json,
    /// Field/value mapping stored as a store-native hash
    Hash,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Json => "json",
            DataType::Hash => "hash",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value stored under a single key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Raw(String),
    Json(serde_json::Value),
}

impl CacheValue {
    pub fn raw(value: impl Into<String>) -> Self {
        CacheValue::Raw(value.into())
    }

    pub fn data_type(&self) -> DataType {
        match self {
            CacheValue::Raw(_) => DataType::String,
            CacheValue::Json(_) => DataType::Json,
        }
    }

    /// String written to the store
    pub fn to_wire(&self) -> String {
        match self {
            CacheValue::Raw(s) => s.clone(),
            CacheValue::Json(v) => v.to_string(),
        }
    }

    /// Representation placed into output records
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CacheValue::Raw(s) => serde_json::Value::String(s.clone()),
            CacheValue::Json(v) => v.clone(),
        }
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        CacheValue::Json(value)
    }
}

/// Errors raised while interpreting or editing values
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValueError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid field path: {0}")]
    InvalidPath(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Field '{0}' is not an array")]
    NotAnArray(String),

    #[error("Cache key cannot be empty")]
    EmptyKey,

    #[error("At least one field is required for a hash")]
    EmptyHash,

    #[error("Invalid hash field: {0}")]
    InvalidField(String),

    #[error("Data type '{0}' cannot be read as a single value")]
    UnsupportedType(DataType),
}

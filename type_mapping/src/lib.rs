//! Data type mapping for cache values
//! This crate provides the value representation used across the cachewarden ecosystem

pub mod path;
pub mod serialize;
pub mod types;
pub mod validate;

pub use path::{append_to_array, pop_from_array, set_field, FieldPath};
pub use serialize::{decode_stored, parse_json, parse_value, value_from_json};
pub use types::{CacheValue, DataType, ValueError};
pub use validate::{validate_hash_fields, validate_key};

//! Write entries with an optional expiry

use cache_system::CacheError;
use serde_json::{Map, Value, json};
use type_mapping::{DataType, ValueError, validate_hash_fields, value_from_json};

use super::{fields, item_failed};
use crate::core::CacheWarden;
use crate::errors::CacheWardenError;
use crate::records::{BatchOutput, KeySource, Record, ValueSource, merge, timestamp};

pub const STORED: &str = "stored";

#[derive(Debug, Clone)]
pub struct SetParams {
    pub key: KeySource,
    pub data_type: DataType,
    /// For hashes this must resolve to an object of field values
    pub value: ValueSource,
    /// Seconds; `0` stores without expiry
    pub expiration: u64,
    /// Echo the stored value in the output record
    pub return_value: bool,
}

impl SetParams {
    pub fn new(key: KeySource, data_type: DataType, value: ValueSource) -> Self {
        Self {
            key,
            data_type,
            value,
            expiration: 0,
            return_value: false,
        }
    }

    pub fn with_expiration(mut self, seconds: u64) -> Self {
        self.expiration = seconds;
        self
    }

    pub fn with_return_value(mut self, return_value: bool) -> Self {
        self.return_value = return_value;
        self
    }
}

/// Channel: `stored`
pub async fn execute(
    warden: &CacheWarden,
    records: &[Record],
    params: &SetParams,
) -> Result<BatchOutput, CacheWardenError> {
    let mut output = BatchOutput::new(&[STORED]);

    for (index, record) in records.iter().enumerate() {
        let key = params
            .key
            .resolve(record)
            .map_err(|err| item_failed(index, None, err))?;
        let result = store_item(warden, &key, record, params)
            .await
            .map_err(|err| item_failed(index, Some(&key), err))?;
        output.push(STORED, merge(record, result));
    }

    Ok(output)
}

async fn store_item(
    warden: &CacheWarden,
    key: &str,
    record: &Record,
    params: &SetParams,
) -> Result<Record, CacheError> {
    let executor = warden.executor();
    let input = params.value.resolve(record)?;

    let stored = match params.data_type {
        DataType::Hash => {
            let hash = hash_fields(input)?;
            validate_hash_fields(&hash)?;
            executor.hset_multiple(key, &hash).await?;
            if params.expiration > 0 {
                executor.expire(key, params.expiration).await?;
            }
            Value::Object(
                hash.into_iter()
                    .map(|(field, value)| (field, Value::String(value)))
                    .collect(),
            )
        }
        data_type => {
            let value = value_from_json(input, data_type)?;
            let wire = value.to_wire();
            if params.expiration > 0 {
                executor.set_with_expiry(key, &wire, params.expiration).await?;
            } else {
                executor.set(key, &wire).await?;
            }
            value.to_json()
        }
    };
    crate::debug_log!("[SET] {} ({}) expires in {}", key, params.data_type, params.expiration);

    let expires_in = match params.expiration {
        0 => json!("never"),
        seconds => json!(seconds),
    };
    let mut result = fields(json!({
        "key": key,
        "data_type": params.data_type,
        "success": true,
        "expires_in": expires_in,
        "timestamp": timestamp(),
    }));
    if params.return_value {
        result.insert("value".to_string(), stored);
    }
    Ok(result)
}

/// Hash fields from an object, or from a string holding a JSON object
fn hash_fields(input: &Value) -> Result<Vec<(String, String)>, ValueError> {
    let parsed;
    let object: &Map<String, Value> = match input {
        Value::Object(map) => map,
        Value::String(s) => {
            parsed = type_mapping::parse_json(s)?;
            match &parsed {
                Value::Object(map) => map,
                _ => return Err(ValueError::InvalidField("hash value must be an object".to_string())),
            }
        }
        _ => return Err(ValueError::InvalidField("hash value must be an object".to_string())),
    };

    Ok(object
        .iter()
        .map(|(field, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (field.clone(), value)
        })
        .collect())
}

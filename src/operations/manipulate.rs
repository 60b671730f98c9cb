//! In-place edits of stored JSON documents and hash fields

use cache_system::CacheError;
use serde_json::{Map, Value, json};
use type_mapping::{FieldPath, append_to_array, parse_json, pop_from_array, set_field};

use super::{fields, item_failed};
use crate::core::CacheWarden;
use crate::errors::CacheWardenError;
use crate::records::{BatchOutput, KeySource, Record, ValueSource, merge, timestamp};

pub const MANIPULATED: &str = "manipulated";

/// Edit applied to an existing entry
#[derive(Debug, Clone, PartialEq)]
pub enum Manipulation {
    /// Set a dotted path, creating intermediate objects
    UpdateJsonField { path: String, value: ValueSource },
    /// Push onto the array at a dotted path; a missing field becomes an array
    AppendJsonArray { path: String, value: ValueSource },
    /// Drop the last element of the array at a dotted path
    PopJsonArray { path: String },
    UpdateHashField { field: String, value: ValueSource },
}

impl Manipulation {
    pub fn name(&self) -> &'static str {
        match self {
            Manipulation::UpdateJsonField { .. } => "update_json_field",
            Manipulation::AppendJsonArray { .. } => "append_json_array",
            Manipulation::PopJsonArray { .. } => "pop_json_array",
            Manipulation::UpdateHashField { .. } => "update_hash_field",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManipulateParams {
    pub key: KeySource,
    pub operation: Manipulation,
    /// Re-apply the remaining TTL after the write
    pub preserve_ttl: bool,
}

impl ManipulateParams {
    pub fn new(key: KeySource, operation: Manipulation) -> Self {
        Self {
            key,
            operation,
            preserve_ttl: false,
        }
    }

    pub fn with_preserve_ttl(mut self, preserve: bool) -> Self {
        self.preserve_ttl = preserve;
        self
    }
}

/// Channel: `manipulated`
pub async fn execute(
    warden: &CacheWarden,
    records: &[Record],
    params: &ManipulateParams,
) -> Result<BatchOutput, CacheWardenError> {
    let mut output = BatchOutput::new(&[MANIPULATED]);

    for (index, record) in records.iter().enumerate() {
        let key = params
            .key
            .resolve(record)
            .map_err(|err| item_failed(index, None, err))?;
        let result = manipulate_item(warden, &key, record, params)
            .await
            .map_err(|err| item_failed(index, Some(&key), err))?;
        output.push(MANIPULATED, merge(record, result));
    }

    Ok(output)
}

async fn manipulate_item(
    warden: &CacheWarden,
    key: &str,
    record: &Record,
    params: &ManipulateParams,
) -> Result<Record, CacheError> {
    let executor = warden.executor();

    // Inputs are checked before the store is touched
    let path = match &params.operation {
        Manipulation::UpdateJsonField { path, .. }
        | Manipulation::AppendJsonArray { path, .. }
        | Manipulation::PopJsonArray { path } => Some(FieldPath::parse(path)?),
        Manipulation::UpdateHashField { field, .. } => {
            if field.trim().is_empty() {
                return Err(CacheError::Validation("Hash field name cannot be empty".to_string()));
            }
            None
        }
    };
    let new_value = match &params.operation {
        Manipulation::UpdateJsonField { value, .. }
        | Manipulation::AppendJsonArray { value, .. }
        | Manipulation::UpdateHashField { value, .. } => Some(value.resolve(record)?.clone()),
        Manipulation::PopJsonArray { .. } => None,
    };

    if !executor.exists(key).await? {
        return Err(CacheError::NotFound(key.to_string()));
    }
    let preserved_ttl = match params.preserve_ttl {
        true => Some(executor.ttl(key).await?),
        false => None,
    };
    let reapply = preserved_ttl.filter(|ttl| *ttl > 0).map(|ttl| ttl as u64);

    let mut popped = None;
    let result = match (&params.operation, path) {
        (Manipulation::UpdateHashField { field, .. }, _) => {
            let value = match new_value.unwrap_or(Value::Null) {
                Value::String(s) => s,
                other => other.to_string(),
            };
            executor.hset(key, field, &value).await?;
            if let Some(ttl) = reapply {
                executor.expire(key, ttl).await?;
            }
            let hash: Map<String, Value> = executor
                .hgetall(key)
                .await?
                .into_iter()
                .map(|(field, value)| (field, Value::String(value)))
                .collect();
            Value::Object(hash)
        }
        (operation, Some(path)) => {
            let raw = executor
                .get(key)
                .await?
                .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
            let mut doc = parse_json(&raw)?;

            match operation {
                Manipulation::UpdateJsonField { .. } => {
                    set_field(&mut doc, &path, new_value.unwrap_or(Value::Null))?
                }
                Manipulation::AppendJsonArray { .. } => {
                    append_to_array(&mut doc, &path, new_value.unwrap_or(Value::Null))?
                }
                _ => popped = Some(pop_from_array(&mut doc, &path)?.unwrap_or(Value::Null)),
            }

            let wire = doc.to_string();
            match reapply {
                Some(ttl) => executor.set_with_expiry(key, &wire, ttl).await?,
                None => executor.set(key, &wire).await?,
            }
            doc
        }
        (_, None) => {
            return Err(CacheError::Validation("A field path is required".to_string()));
        }
    };
    crate::debug_log!("[MANIPULATE] {} {}", key, params.operation.name());

    let mut output = fields(json!({
        "key": key,
        "operation": params.operation.name(),
        "success": true,
        "result": result,
        "preserved_ttl": preserved_ttl,
        "timestamp": timestamp(),
    }));
    if let Some(value) = popped {
        output.insert("popped".to_string(), value);
    }
    Ok(output)
}

//! Batch operations exposed to the host runtime
//!
//! Each operation takes the ordered input records and returns one ordered
//! list of output records per declared channel. The first failing item
//! aborts the batch.

pub mod get;
pub mod manipulate;
pub mod renew;
pub mod set;
pub mod test_connection;

use cache_system::{CacheError, OperationExecutor};
use serde_json::{Map, Value};
use type_mapping::{DataType, decode_stored};

use crate::errors::CacheWardenError;
use crate::records::Record;

/// Batch error for a failed item, logged once here
pub(crate) fn item_failed(index: usize, key: Option<&str>, source: CacheError) -> CacheWardenError {
    tracing::warn!(index, key = ?key, "[BATCH] item failed, aborting batch: {}", source);
    CacheWardenError::item(index, key, source)
}

/// Read the current value of `key` in the declared representation
///
/// `None` when the key is missing.
pub(crate) async fn read_value(
    executor: &OperationExecutor,
    key: &str,
    data_type: DataType,
) -> Result<Option<Value>, CacheError> {
    match data_type {
        DataType::Hash => {
            let fields = executor.hgetall(key).await?;
            if fields.is_empty() {
                return Ok(None);
            }
            let object: Map<String, Value> = fields
                .into_iter()
                .map(|(field, value)| (field, Value::String(value)))
                .collect();
            Ok(Some(Value::Object(object)))
        }
        _ => match executor.get(key).await? {
            Some(raw) => Ok(Some(decode_stored(raw, data_type)?.to_json())),
            None => Ok(None),
        },
    }
}

/// TTL as shown in output records; permanent entries read `"never"`
pub(crate) fn ttl_field(ttl: i64) -> Value {
    if ttl == -1 {
        Value::String("never".to_string())
    } else {
        Value::from(ttl)
    }
}

/// Object literal to record
pub(crate) fn fields(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

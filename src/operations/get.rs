//! Read entries and route them by freshness

use cache_system::CacheError;
use renewal_engine::{Classification, RenewalPolicy, classify};
use serde_json::json;
use type_mapping::DataType;

use super::{fields, item_failed, read_value, ttl_field};
use crate::core::CacheWarden;
use crate::errors::CacheWardenError;
use crate::records::{BatchOutput, KeySource, Record, merge, timestamp};

pub const VALID: &str = "valid";
pub const INVALID: &str = "invalid";
pub const NEEDS_RENEWAL: &str = "needs_renewal";

#[derive(Debug, Clone)]
pub struct GetParams {
    pub key: KeySource,
    pub data_type: DataType,
    /// Output field receiving the value
    pub property_name: String,
    /// Falls back to the configured default policy
    pub policy: Option<RenewalPolicy>,
}

impl GetParams {
    pub fn new(key: KeySource, data_type: DataType) -> Self {
        Self {
            key,
            data_type,
            property_name: "value".to_string(),
            policy: None,
        }
    }

    pub fn with_property_name(mut self, name: impl Into<String>) -> Self {
        self.property_name = name.into();
        self
    }

    pub fn with_policy(mut self, policy: RenewalPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// Channels: `valid`, `invalid`, `needs_renewal`
///
/// Every record lands in exactly one channel.
pub async fn execute(
    warden: &CacheWarden,
    records: &[Record],
    params: &GetParams,
) -> Result<BatchOutput, CacheWardenError> {
    let policy = params.policy.unwrap_or(*warden.default_policy());
    let mut output = BatchOutput::new(&[VALID, INVALID, NEEDS_RENEWAL]);

    for (index, record) in records.iter().enumerate() {
        let key = params
            .key
            .resolve(record)
            .map_err(|err| item_failed(index, None, err))?;
        let (channel, result) = read_item(warden, &key, params, &policy)
            .await
            .map_err(|err| item_failed(index, Some(&key), err))?;
        output.push(channel, merge(record, result));
    }

    Ok(output)
}

async fn read_item(
    warden: &CacheWarden,
    key: &str,
    params: &GetParams,
    policy: &RenewalPolicy,
) -> Result<(&'static str, Record), CacheError> {
    let executor = warden.executor();
    let ttl = executor.ttl(key).await?;
    let value = match ttl {
        -2 => None,
        _ => read_value(executor, key, params.data_type).await?,
    };

    let Some(value) = value else {
        return Ok((
            INVALID,
            fields(json!({
                "key": key,
                "exists": false,
                "ttl": -2,
                "status": "invalid_cache",
                "timestamp": timestamp(),
            })),
        ));
    };

    let classification = classify(ttl, policy);
    let (channel, status) = match classification {
        Classification::NeedsRenewal => (NEEDS_RENEWAL, "needs_renewal"),
        Classification::Absent => (INVALID, "invalid_cache"),
        Classification::Valid | Classification::Permanent => (VALID, "valid_cache"),
    };
    crate::debug_log!("[GET] {} ttl={} -> {}", key, ttl, classification);

    let mut result = fields(json!({
        "key": key,
        "exists": true,
        "ttl": ttl_field(ttl),
        "status": status,
        "classification": classification,
        "renewal_threshold": policy.threshold_seconds(),
        "timestamp": timestamp(),
    }));
    result.insert(params.property_name.clone(), value);
    Ok((channel, result))
}

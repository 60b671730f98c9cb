//! Check entries against a renewal policy and renew the ones that are due

use cache_system::CacheError;
use config::UpdateMode;
use renewal_engine::{Classification, RenewalPolicy};
use serde_json::json;
use type_mapping::{DataType, value_from_json};

use super::{fields, item_failed, read_value};
use crate::core::CacheWarden;
use crate::errors::CacheWardenError;
use crate::records::{BatchOutput, KeySource, Record, ValueSource, merge, timestamp};

pub const RENEWED: &str = "renewed";
pub const NOT_RENEWED: &str = "not_renewed";

#[derive(Debug, Clone)]
pub struct RenewParams {
    pub key: KeySource,
    /// Falls back to the configured default policy
    pub policy: Option<RenewalPolicy>,
    /// Replacement value, used with `UpdateMode::ReplaceValue`
    pub new_value: Option<ValueSource>,
    /// How the replacement and the included value are represented
    pub data_type: DataType,
    /// Output field receiving the current value, when set
    pub include_value: Option<String>,
    pub include_metadata: bool,
}

impl RenewParams {
    pub fn new(key: KeySource) -> Self {
        Self {
            key,
            policy: None,
            new_value: None,
            data_type: DataType::String,
            include_value: None,
            include_metadata: true,
        }
    }

    pub fn with_policy(mut self, policy: RenewalPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_new_value(mut self, value: ValueSource, data_type: DataType) -> Self {
        self.new_value = Some(value);
        self.data_type = data_type;
        self
    }

    pub fn with_included_value(mut self, property_name: impl Into<String>, data_type: DataType) -> Self {
        self.include_value = Some(property_name.into());
        self.data_type = data_type;
        self
    }

    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }
}

/// Channels: `renewed`, `not_renewed`
pub async fn execute(
    warden: &CacheWarden,
    records: &[Record],
    params: &RenewParams,
) -> Result<BatchOutput, CacheWardenError> {
    let policy = params.policy.unwrap_or(*warden.default_policy());
    let mut output = BatchOutput::new(&[RENEWED, NOT_RENEWED]);

    for (index, record) in records.iter().enumerate() {
        let key = params
            .key
            .resolve(record)
            .map_err(|err| item_failed(index, None, err))?;
        let (channel, result) = renew_item(warden, &key, record, params, &policy)
            .await
            .map_err(|err| item_failed(index, Some(&key), err))?;
        output.push(channel, merge(record, result));
    }

    Ok(output)
}

async fn renew_item(
    warden: &CacheWarden,
    key: &str,
    record: &Record,
    params: &RenewParams,
    policy: &RenewalPolicy,
) -> Result<(&'static str, Record), CacheError> {
    // Resolved before any store call so a bad value never causes a write
    let replacement = match (&params.new_value, policy.update_mode()) {
        (Some(source), UpdateMode::ReplaceValue) => {
            Some(value_from_json(source.resolve(record)?, params.data_type)?.to_wire())
        }
        _ => None,
    };

    let outcome = warden
        .renewer()
        .check_and_renew(key, policy, replacement.as_deref())
        .await?;
    let check = &outcome.check;
    crate::debug_log!(
        "[RENEW] {} ttl {} -> {} ({})",
        key,
        check.ttl,
        outcome.ttl_after,
        check.classification
    );

    let mut result = fields(json!({
        "key": key,
        "renewed": outcome.renewed(),
    }));

    if params.include_metadata {
        result.extend(fields(json!({
            "exists": check.classification != Classification::Absent,
            "ttl_before": check.ttl,
            "ttl_after": outcome.ttl_after,
            "renewal_threshold": check.threshold_seconds,
            "needs_renewal": check.needs_renewal(),
            "value_updated": outcome.value_updated(),
            "permanent": check.ttl == -1,
            "expired": check.classification == Classification::Absent,
            "renewal_ttl": policy.renewal_ttl(),
            "classification": check.classification,
            "timestamp": timestamp(),
        })));
    }

    if let Some(property) = &params.include_value {
        if let Some(value) = read_value(warden.executor(), key, params.data_type).await? {
            result.insert(property.clone(), value);
        }
    }

    let channel = if outcome.renewed() { RENEWED } else { NOT_RENEWED };
    Ok((channel, result))
}

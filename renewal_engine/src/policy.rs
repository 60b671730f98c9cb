//! Renewal policy
//!
//! A validated set of renewal settings. Construction fails for thresholds
//! that cannot be evaluated, so classification itself never errors.

use cache_system::CacheError;
use config::{RenewalConfig, ThresholdMode, UpdateMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Threshold must be a finite number, got {0}")]
    NotFinite(f64),

    #[error("Percent threshold must be in (0, 100], got {0}")]
    PercentOutOfRange(f64),

    #[error("Fixed threshold cannot be negative, got {0}")]
    NegativeThreshold(f64),

    #[error("Renewal TTL must be greater than 0")]
    ZeroRenewalTtl,
}

impl From<PolicyError> for CacheError {
    fn from(err: PolicyError) -> Self {
        CacheError::Validation(err.to_string())
    }
}

/// When an entry counts as due for renewal and what a renewal writes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RenewalConfig")]
pub struct RenewalPolicy {
    threshold_mode: ThresholdMode,
    threshold_value: f64,
    renewal_ttl: u64,
    update_mode: UpdateMode,
    always_update: bool,
}

impl RenewalPolicy {
    pub fn new(
        threshold_mode: ThresholdMode,
        threshold_value: f64,
        renewal_ttl: u64,
    ) -> Result<Self, PolicyError> {
        if !threshold_value.is_finite() {
            return Err(PolicyError::NotFinite(threshold_value));
        }
        match threshold_mode {
            ThresholdMode::PercentOfOriginal if threshold_value <= 0.0 || threshold_value > 100.0 => {
                return Err(PolicyError::PercentOutOfRange(threshold_value));
            }
            ThresholdMode::FixedSeconds if threshold_value < 0.0 => {
                return Err(PolicyError::NegativeThreshold(threshold_value));
            }
            _ => {}
        }
        if renewal_ttl == 0 {
            return Err(PolicyError::ZeroRenewalTtl);
        }

        Ok(Self {
            threshold_mode,
            threshold_value,
            renewal_ttl,
            update_mode: UpdateMode::ExtendOnly,
            always_update: false,
        })
    }

    /// Renew once at most `threshold_seconds` remain
    pub fn fixed(threshold_seconds: u64, renewal_ttl: u64) -> Result<Self, PolicyError> {
        Self::new(ThresholdMode::FixedSeconds, threshold_seconds as f64, renewal_ttl)
    }

    /// Renew once at most `percent` of the original TTL remains
    pub fn percent(percent: f64, renewal_ttl: u64) -> Result<Self, PolicyError> {
        Self::new(ThresholdMode::PercentOfOriginal, percent, renewal_ttl)
    }

    pub fn with_update_mode(mut self, update_mode: UpdateMode) -> Self {
        self.update_mode = update_mode;
        self
    }

    /// Write the value on every renewal pass, even for permanent entries.
    /// Only takes effect with `UpdateMode::ReplaceValue`.
    pub fn with_always_update(mut self, always_update: bool) -> Self {
        self.always_update = always_update;
        self
    }

    pub fn threshold_mode(&self) -> ThresholdMode {
        self.threshold_mode
    }

    pub fn threshold_value(&self) -> f64 {
        self.threshold_value
    }

    pub fn renewal_ttl(&self) -> u64 {
        self.renewal_ttl
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    pub fn always_update(&self) -> bool {
        self.always_update
    }

    /// The original TTL of an entry is not stored, so percent thresholds are
    /// computed against the renewal TTL instead.
    pub fn assumed_original_ttl(&self) -> u64 {
        self.renewal_ttl
    }

    /// Remaining TTL at or below which an entry needs renewal
    pub fn threshold_seconds(&self) -> f64 {
        match self.threshold_mode {
            ThresholdMode::FixedSeconds => self.threshold_value,
            ThresholdMode::PercentOfOriginal => {
                self.assumed_original_ttl() as f64 * self.threshold_value / 100.0
            }
        }
    }

    /// Whether every pass writes the value regardless of remaining TTL
    pub fn forces_update(&self) -> bool {
        self.always_update && self.update_mode == UpdateMode::ReplaceValue
    }
}

impl TryFrom<&RenewalConfig> for RenewalPolicy {
    type Error = PolicyError;

    fn try_from(config: &RenewalConfig) -> Result<Self, Self::Error> {
        Ok(
            RenewalPolicy::new(config.threshold_mode, config.threshold_value, config.renewal_ttl)?
                .with_update_mode(config.update_mode)
                .with_always_update(config.always_update),
        )
    }
}

impl TryFrom<RenewalConfig> for RenewalPolicy {
    type Error = PolicyError;

    fn try_from(config: RenewalConfig) -> Result<Self, Self::Error> {
        RenewalPolicy::try_from(&config)
    }
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            threshold_mode: ThresholdMode::PercentOfOriginal,
            threshold_value: 30.0,
            renewal_ttl: 3600,
            update_mode: UpdateMode::ExtendOnly,
            always_update: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_threshold_uses_renewal_ttl() {
        let policy = RenewalPolicy::percent(50.0, 100).unwrap();
        assert_eq!(policy.assumed_original_ttl(), 100);
        assert_eq!(policy.threshold_seconds(), 50.0);
    }

    #[test]
    fn test_invalid_policies_are_rejected() {
        assert_eq!(
            RenewalPolicy::percent(0.0, 100).unwrap_err(),
            PolicyError::PercentOutOfRange(0.0)
        );
        assert!(RenewalPolicy::percent(100.0, 100).is_ok());
        assert!(RenewalPolicy::percent(100.5, 100).is_err());
        assert_eq!(
            RenewalPolicy::new(ThresholdMode::FixedSeconds, -1.0, 100).unwrap_err(),
            PolicyError::NegativeThreshold(-1.0)
        );
        assert!(RenewalPolicy::fixed(0, 100).is_ok());
        assert_eq!(RenewalPolicy::fixed(10, 0).unwrap_err(), PolicyError::ZeroRenewalTtl);
        assert!(RenewalPolicy::percent(f64::NAN, 100).is_err());
    }

    #[test]
    fn test_forces_update_needs_replace_mode() {
        let policy = RenewalPolicy::fixed(10, 100).unwrap().with_always_update(true);
        assert!(!policy.forces_update());
        assert!(policy.with_update_mode(UpdateMode::ReplaceValue).forces_update());
    }

    #[test]
    fn test_from_config() {
        let config = RenewalConfig {
            threshold_mode: ThresholdMode::FixedSeconds,
            threshold_value: 300.0,
            renewal_ttl: 3600,
            update_mode: UpdateMode::ReplaceValue,
            always_update: false,
        };
        let policy = RenewalPolicy::try_from(&config).unwrap();
        assert_eq!(policy.threshold_seconds(), 300.0);
        assert_eq!(policy.update_mode(), UpdateMode::ReplaceValue);

        let err: CacheError = RenewalPolicy::try_from(&RenewalConfig {
            renewal_ttl: 0,
            ..config
        })
        .unwrap_err()
        .into();
        assert!(err.is_validation());
    }

    #[test]
    fn test_deserialize_validates() {
        let err = serde_json::from_str::<RenewalPolicy>(
            r#"{"threshold_mode":"percent_of_original","threshold_value":250.0,"renewal_ttl":0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Percent threshold"));

        let zero_ttl = serde_json::from_str::<RenewalPolicy>(
            r#"{"threshold_mode":"fixed_seconds","threshold_value":10.0,"renewal_ttl":0}"#,
        );
        assert!(zero_ttl.is_err());

        let policy: RenewalPolicy = serde_json::from_str(
            r#"{"threshold_mode":"fixed_seconds","threshold_value":300.0,"renewal_ttl":3600,"update_mode":"replace_value"}"#,
        )
        .unwrap();
        assert_eq!(policy, RenewalPolicy::fixed(300, 3600).unwrap().with_update_mode(UpdateMode::ReplaceValue));

        let round_trip: RenewalPolicy =
            serde_json::from_str(&serde_json::to_string(&policy).unwrap()).unwrap();
        assert_eq!(round_trip, policy);
    }
}

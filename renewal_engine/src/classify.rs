//! TTL classification
//!
//! Pure functions from a remaining TTL and a policy to a decision. No I/O.

use crate::policy::RenewalPolicy;
use config::UpdateMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a cache entry relative to a renewal policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The entry has no expiry
    Permanent,
    /// The store reports the key missing or expired
    Absent,
    Valid,
    NeedsRenewal,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Permanent => "permanent",
            Classification::Absent => "absent",
            Classification::Valid => "valid",
            Classification::NeedsRenewal => "needs_renewal",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write-back performed by a renewal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalAction {
    /// Reset the expiry, value untouched
    ExtendTtl(u64),
    /// Write a new value; `None` keeps the entry permanent
    ReplaceValue { ttl: Option<u64> },
}

/// Classify a remaining TTL as reported by the store
///
/// `0` goes through the threshold comparison like any other remaining TTL.
pub fn classify(ttl_remaining: i64, policy: &RenewalPolicy) -> Classification {
    match ttl_remaining {
        ttl if ttl <= -2 => Classification::Absent,
        -1 if policy.forces_update() => Classification::NeedsRenewal,
        -1 => Classification::Permanent,
        ttl if ttl as f64 <= policy.threshold_seconds() => Classification::NeedsRenewal,
        _ => Classification::Valid,
    }
}

/// The write-back a renewal pass should perform, if any
pub fn plan(ttl_remaining: i64, policy: &RenewalPolicy) -> Option<RenewalAction> {
    let renewal_ttl = policy.renewal_ttl();
    match classify(ttl_remaining, policy) {
        Classification::Absent | Classification::Permanent => None,
        Classification::NeedsRenewal if ttl_remaining == -1 => {
            Some(RenewalAction::ReplaceValue { ttl: None })
        }
        Classification::NeedsRenewal => Some(match policy.update_mode() {
            UpdateMode::ExtendOnly => RenewalAction::ExtendTtl(renewal_ttl),
            UpdateMode::ReplaceValue => RenewalAction::ReplaceValue {
                ttl: Some(renewal_ttl),
            },
        }),
        Classification::Valid if policy.forces_update() => Some(RenewalAction::ReplaceValue {
            ttl: Some(renewal_ttl),
        }),
        Classification::Valid => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percent_mode() {
        let policy = RenewalPolicy::percent(50.0, 100).unwrap();
        assert_eq!(classify(30, &policy), Classification::NeedsRenewal);
        assert_eq!(classify(50, &policy), Classification::NeedsRenewal);
        assert_eq!(classify(60, &policy), Classification::Valid);
    }

    #[test]
    fn test_fixed_mode() {
        let policy = RenewalPolicy::fixed(300, 3600).unwrap();
        assert_eq!(classify(299, &policy), Classification::NeedsRenewal);
        assert_eq!(classify(300, &policy), Classification::NeedsRenewal);
        assert_eq!(classify(301, &policy), Classification::Valid);
    }

    #[test]
    fn test_sentinels() {
        let policy = RenewalPolicy::fixed(300, 3600).unwrap();
        assert_eq!(classify(-1, &policy), Classification::Permanent);
        assert_eq!(classify(-2, &policy), Classification::Absent);
        assert_eq!(classify(-7, &policy), Classification::Absent);

        let forced = policy
            .with_update_mode(UpdateMode::ReplaceValue)
            .with_always_update(true);
        assert_eq!(classify(-1, &forced), Classification::NeedsRenewal);
        assert_eq!(classify(-2, &forced), Classification::Absent);
    }

    #[test]
    fn test_zero_follows_the_threshold() {
        let fixed = RenewalPolicy::fixed(0, 60).unwrap();
        assert_eq!(classify(0, &fixed), Classification::NeedsRenewal);
        assert_eq!(classify(1, &fixed), Classification::Valid);
    }

    #[test]
    fn test_plan() {
        let extend = RenewalPolicy::fixed(300, 3600).unwrap();
        assert_eq!(plan(100, &extend), Some(RenewalAction::ExtendTtl(3600)));
        assert_eq!(plan(1000, &extend), None);
        assert_eq!(plan(-1, &extend), None);
        assert_eq!(plan(-2, &extend), None);

        let replace = extend.with_update_mode(UpdateMode::ReplaceValue);
        assert_eq!(plan(100, &replace), Some(RenewalAction::ReplaceValue { ttl: Some(3600) }));
        assert_eq!(plan(1000, &replace), None);

        let forced = replace.with_always_update(true);
        assert_eq!(plan(1000, &forced), Some(RenewalAction::ReplaceValue { ttl: Some(3600) }));
        assert_eq!(plan(-1, &forced), Some(RenewalAction::ReplaceValue { ttl: None }));
        assert_eq!(plan(-2, &forced), None);
    }

    proptest! {
        #[test]
        fn prop_classify_is_deterministic(
            ttl in -5i64..100_000,
            threshold in 0u64..10_000,
            renewal_ttl in 1u64..100_000,
        ) {
            let policy = RenewalPolicy::fixed(threshold, renewal_ttl).unwrap();
            prop_assert_eq!(classify(ttl, &policy), classify(ttl, &policy));
        }

        #[test]
        fn prop_percent_threshold_is_monotonic(
            ttl in 0i64..100_000,
            percent in 1u32..=100,
            renewal_ttl in 1u64..100_000,
        ) {
            let policy = RenewalPolicy::percent(percent as f64, renewal_ttl).unwrap();
            if classify(ttl, &policy) == Classification::NeedsRenewal {
                prop_assert_eq!(classify(ttl / 2, &policy), Classification::NeedsRenewal);
            } else {
                prop_assert_eq!(classify(ttl + 1, &policy), Classification::Valid);
            }
        }
    }
}

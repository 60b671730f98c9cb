//! Renewal execution through the operation executor

use crate::classify::{Classification, RenewalAction, classify, plan};
use crate::policy::RenewalPolicy;
use cache_system::{CacheError, OperationExecutor};
use serde::Serialize;

/// Fresh read of a key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Option<String>,
    /// `-2` absent, `-1` permanent, otherwise seconds remaining
    pub ttl: i64,
}

/// Classification of a key together with what it was based on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenewalCheck {
    pub key: String,
    pub ttl: i64,
    pub classification: Classification,
    pub threshold_seconds: f64,
    /// Only filled by reads that fetch the value
    pub value: Option<String>,
}

impl RenewalCheck {
    pub fn needs_renewal(&self) -> bool {
        self.classification == Classification::NeedsRenewal
    }
}

/// Result of a check-and-renew pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenewalOutcome {
    pub check: RenewalCheck,
    pub action: Option<RenewalAction>,
    pub ttl_after: i64,
}

impl RenewalOutcome {
    pub fn renewed(&self) -> bool {
        self.action.is_some()
    }

    pub fn value_updated(&self) -> bool {
        matches!(self.action, Some(RenewalAction::ReplaceValue { .. }))
    }
}

/// Checks and renews cache entries
#[derive(Debug, Clone)]
pub struct CacheRenewer {
    executor: OperationExecutor,
}

impl CacheRenewer {
    pub fn new(executor: OperationExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    /// TTL and string value, both read from the store
    pub async fn inspect(&self, key: &str) -> Result<CacheEntry, CacheError> {
        let ttl = self.executor.ttl(key).await?;
        let value = if ttl <= -2 {
            None
        } else {
            self.executor.get(key).await?
        };

        Ok(CacheEntry {
            key: key.to_string(),
            value,
            ttl,
        })
    }

    /// Classify a key from its current TTL; the value is not read
    pub async fn check(&self, key: &str, policy: &RenewalPolicy) -> Result<RenewalCheck, CacheError> {
        let ttl = self.executor.ttl(key).await?;
        Ok(build_check(key, ttl, None, policy))
    }

    /// Classify a string key and carry its value along
    pub async fn check_with_value(
        &self,
        key: &str,
        policy: &RenewalPolicy,
    ) -> Result<RenewalCheck, CacheError> {
        let entry = self.inspect(key).await?;
        Ok(build_check(key, entry.ttl, entry.value, policy))
    }

    /// Perform one renewal action
    ///
    /// Extending a key that no longer exists is `NotFound`. Replacing needs a
    /// value; without one nothing is written.
    pub async fn renew(
        &self,
        key: &str,
        action: RenewalAction,
        value: Option<&str>,
    ) -> Result<(), CacheError> {
        match action {
            RenewalAction::ExtendTtl(seconds) => {
                if !self.executor.expire(key, seconds).await? {
                    return Err(CacheError::NotFound(key.to_string()));
                }
            }
            RenewalAction::ReplaceValue { ttl } => {
                let value = value.ok_or_else(|| missing_value(key))?;
                match ttl {
                    Some(seconds) => self.executor.set_with_expiry(key, value, seconds).await?,
                    None => self.executor.set(key, value).await?,
                }
            }
        }

        tracing::debug!(key, action = ?action, "[RENEW] applied");
        Ok(())
    }

    /// Check a key and renew it when the policy says so
    pub async fn check_and_renew(
        &self,
        key: &str,
        policy: &RenewalPolicy,
        value: Option<&str>,
    ) -> Result<RenewalOutcome, CacheError> {
        let check = self.check(key, policy).await?;
        let action = plan(check.ttl, policy);

        let ttl_after = match action {
            Some(action) => {
                if matches!(action, RenewalAction::ReplaceValue { .. }) && value.is_none() {
                    return Err(missing_value(key));
                }
                self.renew(key, action, value).await?;
                self.executor.ttl(key).await?
            }
            None => check.ttl,
        };

        Ok(RenewalOutcome {
            check,
            action,
            ttl_after,
        })
    }
}

fn build_check(key: &str, ttl: i64, value: Option<String>, policy: &RenewalPolicy) -> RenewalCheck {
    RenewalCheck {
        key: key.to_string(),
        ttl,
        classification: classify(ttl, policy),
        threshold_seconds: policy.threshold_seconds(),
        value,
    }
}

fn missing_value(key: &str) -> CacheError {
    CacheError::Validation(format!("A replacement value is required to renew '{}'", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_system::{ConnectionConfig, ConnectionManager, MemoryConnector, RetryConfig};
    use config::UpdateMode;
    use std::sync::Arc;
    use std::time::Duration;

    async fn renewer() -> (CacheRenewer, Arc<MemoryConnector>) {
        let connector = Arc::new(MemoryConnector::new());
        let retry = RetryConfig::default();
        let manager = Arc::new(ConnectionManager::new(connector.clone(), retry.clone()));
        manager
            .initialize(ConnectionConfig::new("memory".to_string(), 6379).with_uri_fallback(false))
            .await
            .unwrap();
        (CacheRenewer::new(OperationExecutor::new(manager, &retry)), connector)
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_only_is_idempotent() {
        let (renewer, connector) = renewer().await;
        let executor = renewer.executor();
        executor.set_with_expiry("k", "original", 100).await.unwrap();

        for _ in 0..2 {
            tokio::time::advance(Duration::from_secs(30)).await;
            renewer.renew("k", RenewalAction::ExtendTtl(100), None).await.unwrap();
            assert_eq!(executor.get("k").await.unwrap().as_deref(), Some("original"));
            assert_eq!(executor.ttl("k").await.unwrap(), 100);
        }
        assert_eq!(connector.store().peek("k").as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_extend_missing_key_is_not_found() {
        let (renewer, _) = renewer().await;
        let err = renewer
            .renew("missing", RenewalAction::ExtendTtl(100), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::NotFound(key) if key == "missing"));
    }

    #[tokio::test]
    async fn test_replace_without_value_writes_nothing() {
        let (renewer, connector) = renewer().await;
        renewer.executor().set_with_expiry("k", "v", 10).await.unwrap();
        let commands = connector.store().command_count();

        let policy = RenewalPolicy::fixed(60, 100)
            .unwrap()
            .with_update_mode(UpdateMode::ReplaceValue);
        let err = renewer.check_and_renew("k", &policy, None).await.unwrap_err();
        assert!(err.is_validation());
        // Only the TTL read went out
        assert_eq!(connector.store().command_count(), commands + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_and_renew_replaces_value() {
        let (renewer, _) = renewer().await;
        renewer.executor().set_with_expiry("k", "old", 100).await.unwrap();
        tokio::time::advance(Duration::from_secs(80)).await;

        let policy = RenewalPolicy::percent(30.0, 100)
            .unwrap()
            .with_update_mode(UpdateMode::ReplaceValue);
        let outcome = renewer.check_and_renew("k", &policy, Some("new")).await.unwrap();

        assert_eq!(outcome.check.ttl, 20);
        assert!(outcome.check.needs_renewal());
        assert!(outcome.value_updated());
        assert_eq!(outcome.ttl_after, 100);
        assert_eq!(renewer.executor().get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_forced_update_keeps_permanent_entry_permanent() {
        let (renewer, _) = renewer().await;
        renewer.executor().set("k", "old").await.unwrap();

        let policy = RenewalPolicy::fixed(10, 100)
            .unwrap()
            .with_update_mode(UpdateMode::ReplaceValue)
            .with_always_update(true);
        let outcome = renewer.check_and_renew("k", &policy, Some("new")).await.unwrap();

        assert_eq!(outcome.action, Some(RenewalAction::ReplaceValue { ttl: None }));
        assert_eq!(outcome.ttl_after, -1);
        assert_eq!(renewer.executor().get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_valid_and_absent_entries_are_left_alone() {
        let (renewer, _) = renewer().await;
        renewer.executor().set_with_expiry("k", "v", 1000).await.unwrap();
        let policy = RenewalPolicy::fixed(60, 100).unwrap();

        let valid = renewer.check_and_renew("k", &policy, None).await.unwrap();
        assert_eq!(valid.check.classification, Classification::Valid);
        assert!(!valid.renewed());

        let absent = renewer.check_and_renew("gone", &policy, None).await.unwrap();
        assert_eq!(absent.check.classification, Classification::Absent);
        assert_eq!(absent.ttl_after, -2);
    }

    #[tokio::test]
    async fn test_check_with_value() {
        let (renewer, _) = renewer().await;
        renewer.executor().set_with_expiry("k", "{\"a\":1}", 100).await.unwrap();

        let check = renewer
            .check_with_value("k", &RenewalPolicy::percent(50.0, 100).unwrap())
            .await
            .unwrap();
        assert_eq!(check.classification, Classification::Valid);
        assert_eq!(check.value.as_deref(), Some("{\"a\":1}"));
    }
}

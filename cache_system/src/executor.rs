//! Resilient operation executor
//!
//! Runs store commands through the shared connection, retrying
//! connection-related failures after a reconnect and surfacing everything
//! else immediately.

use crate::backoff;
use backon::ExponentialBuilder;
use crate::errors::CacheError;
use crate::manager::ConnectionManager;
use crate::store::{StoreConnection, StoreError, StoreErrorKind};
use config::RetryConfig;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::timeout;
use type_mapping::{validate_hash_fields, validate_key};

/// Executes store operations with reconnect-and-retry
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    manager: Arc<ConnectionManager>,
    max_retries: u32,
    backoff: ExponentialBuilder,
}

impl OperationExecutor {
    /// Retry ceiling and backoff come from the operation half of `retry`
    pub fn new(manager: Arc<ConnectionManager>, retry: &RetryConfig) -> Self {
        Self {
            manager,
            max_retries: retry.operation_retries,
            backoff: backoff::exponential(
                retry.operation_base_delay_ms,
                retry.operation_max_delay_ms,
                retry.operation_retries,
            ),
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `f` against a ready connection
    ///
    /// Connection-related failures invalidate the handle, back off and try
    /// again on a fresh handle, up to `max_retries` extra attempts, so a
    /// command runs at most `1 + max_retries` times and that is the
    /// `attempts` count an exhausted `OperationFailed` reports. Any other
    /// failure is returned at once.
    pub async fn execute<T, F, Fut>(&self, op: &'static str, key: &str, f: F) -> Result<T, CacheError>
    where
        F: Fn(Arc<dyn StoreConnection>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut handle = match self.manager.ready_handle().await {
            Some(handle) => handle,
            None => self.manager.acquire().await?,
        };

        let mut delays = backoff::delays(self.backoff);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let wait = handle.command_timeout();
            let result = match timeout(wait, f(handle.connection())).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::new(
                    StoreErrorKind::Timeout,
                    format!("command timed out after {}ms", wait.as_millis()),
                )),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let delay = match delays.next() {
                Some(delay) if err.is_connection_related() => delay,
                _ => {
                    return Err(CacheError::OperationFailed {
                        op,
                        key: key.to_string(),
                        attempts: attempt,
                        cause: err,
                    });
                }
            };
            tracing::warn!(
                op,
                key,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "[EXECUTE] connection failure, retrying: {}",
                err
            );
            self.manager.invalidate(&handle, &err).await;
            tokio::time::sleep(delay).await;
            handle = self.manager.acquire().await?;
        }
    }

    pub async fn ping(&self) -> Result<String, CacheError> {
        self.execute("ping", "", |conn| async move { conn.ping().await })
            .await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        validate_key(key)?;
        self.execute("get", key, |conn| async move { conn.get(key).await })
            .await
    }

    /// Plain write; the key becomes permanent
    pub async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        validate_key(key)?;
        self.execute("set", key, |conn| async move { conn.set(key, value).await })
            .await
    }

    /// Value and expiry in a single command; `seconds` must be positive
    pub async fn set_with_expiry(&self, key: &str, value: &str, seconds: u64) -> Result<(), CacheError> {
        validate_key(key)?;
        if seconds == 0 {
            return Err(CacheError::Validation(
                "Expiry must be greater than 0 seconds".to_string(),
            ));
        }
        self.execute("set_with_expiry", key, |conn| async move {
            conn.set_with_expiry(key, value, seconds).await
        })
        .await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        self.execute("exists", key, |conn| async move { conn.exists(key).await })
            .await
    }

    /// Remaining TTL, fetched fresh: `-2` absent, `-1` permanent
    pub async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        validate_key(key)?;
        self.execute("ttl", key, |conn| async move { conn.ttl(key).await })
            .await
    }

    pub async fn expire(&self, key: &str, seconds: u64) -> Result<bool, CacheError> {
        validate_key(key)?;
        self.execute("expire", key, |conn| async move { conn.expire(key, seconds).await })
            .await
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        self.execute("hset", key, |conn| async move { conn.hset(key, field, value).await })
            .await
    }

    pub async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<(), CacheError> {
        validate_key(key)?;
        validate_hash_fields(fields)?;
        self.execute("hset_multiple", key, |conn| async move {
            conn.hset_multiple(key, fields).await
        })
        .await
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        validate_key(key)?;
        self.execute("hgetall", key, |conn| async move { conn.hgetall(key).await })
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        self.execute("delete", key, |conn| async move { conn.del(key).await })
            .await
    }
}

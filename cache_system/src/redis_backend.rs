//! Redis backend built on the `redis` crate's multiplexed tokio connection

use crate::store::{ConnectTarget, StoreConnection, StoreConnector, StoreError, StoreErrorKind};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, ErrorKind, IntoConnectionInfo, RedisConnectionInfo};
use std::collections::HashMap;
use std::sync::Arc;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        let kind = if err.kind() == ErrorKind::AuthenticationFailed
            || matches!(err.code(), Some("WRONGPASS") | Some("NOAUTH"))
        {
            StoreErrorKind::Auth
        } else if err.is_timeout() {
            StoreErrorKind::Timeout
        } else if err.is_connection_refusal() {
            StoreErrorKind::Refused
        } else if err.is_connection_dropped() || err.is_io_error() {
            StoreErrorKind::ConnectionLost
        } else if err.kind() == ErrorKind::InvalidClientConfig {
            StoreErrorKind::InvalidTarget
        } else if err.kind() == ErrorKind::TypeError || err.code() == Some("WRONGTYPE") {
            StoreErrorKind::WrongType
        } else {
            StoreErrorKind::Command
        };

        StoreError::new(kind, err.to_string())
    }
}

/// Connector for a real Redis server
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

impl RedisConnector {
    pub fn new() -> Self {
        Self
    }
}

fn connection_info(target: &ConnectTarget) -> Result<ConnectionInfo, StoreError> {
    match target {
        ConnectTarget::Uri(uri) => Ok(uri.as_str().into_connection_info()?),
        ConnectTarget::Structured(t) if !t.tls => Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(t.host.clone(), t.port),
            redis: RedisConnectionInfo {
                db: t.database,
                username: t.username.clone(),
                password: t.password.clone(),
                ..Default::default()
            },
        }),
        ConnectTarget::Structured(t) => {
            // TLS parameters come from the rediss scheme
            let host = if t.host.contains(':') && !t.host.starts_with('[') {
                format!("[{}]", t.host)
            } else {
                t.host.clone()
            };
            let mut info = format!("rediss://{}:{}", host, t.port).into_connection_info()?;
            info.redis.db = t.database;
            info.redis.username = t.username.clone();
            info.redis.password = t.password.clone();
            Ok(info)
        }
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn StoreConnection>, StoreError> {
        let info = connection_info(target)?;
        let client = Client::open(info)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Arc::new(RedisConnection { connection }))
    }
}

/// An open multiplexed Redis connection
#[derive(Clone)]
pub struct RedisConnection {
    connection: MultiplexedConnection,
}

impl std::fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn ping(&self) -> Result<String, StoreError> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &str, seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection.clone();
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let seconds = i64::try_from(seconds)
            .map_err(|_| StoreError::new(StoreErrorKind::Command, "expire seconds out of range"))?;
        let mut conn = self.connection.clone();
        let applied: bool = conn.expire(key, seconds).await?;
        Ok(applied)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let added: i64 = conn.hset(key, field, value).await?;
        Ok(added > 0)
    }

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.connection.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn quit(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("QUIT").query_async(&mut conn).await?;
        Ok(())
    }
}

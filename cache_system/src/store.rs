//! Store client abstraction
//!
//! The connection manager and executor only talk to the key-value store
//! through these traits, so the Redis backend and the in-memory backend are
//! interchangeable.

use async_trait::async_trait;
use config::ConnectionConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure category reported by a store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    /// Credentials rejected
    Auth,
    Timeout,
    /// Connection refused by the remote end
    Refused,
    /// Connection reset, closed or otherwise dropped
    ConnectionLost,
    /// The address or client configuration cannot be used
    InvalidTarget,
    /// Operation against a key holding the wrong kind of value
    WrongType,
    /// The store rejected the command
    Command,
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorKind::Auth => "auth",
            StoreErrorKind::Timeout => "timeout",
            StoreErrorKind::Refused => "refused",
            StoreErrorKind::ConnectionLost => "connection lost",
            StoreErrorKind::InvalidTarget => "invalid target",
            StoreErrorKind::WrongType => "wrong type",
            StoreErrorKind::Command => "command",
            StoreErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

const CONNECTION_MARKERS: [&str; 6] = [
    "connection",
    "closed",
    "reset",
    "timeout",
    "timed out",
    "broken pipe",
];

/// Error returned by a store backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether reconnecting and retrying may help
    ///
    /// Uncategorized errors are matched on their message, the same way the
    /// protocol client reports socket failures as plain text.
    pub fn is_connection_related(&self) -> bool {
        match self.kind {
            StoreErrorKind::Timeout | StoreErrorKind::Refused | StoreErrorKind::ConnectionLost => {
                true
            }
            StoreErrorKind::Other => {
                let message = self.message.to_ascii_lowercase();
                CONNECTION_MARKERS.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind == StoreErrorKind::Auth
    }
}

/// Discrete address fields of a connection target
#[derive(Clone, PartialEq, Eq)]
pub struct StructuredTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: i64,
    pub tls: bool,
}

impl fmt::Debug for StructuredTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "(set)"))
            .field("database", &self.database)
            .field("tls", &self.tls)
            .finish()
    }
}

/// One way of addressing the store
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    Structured(StructuredTarget),
    Uri(String),
}

impl ConnectTarget {
    /// Address strategies for a configuration, in the order they are tried
    ///
    /// A URI host is used on its own. Otherwise the structured fields come
    /// first, followed by the constructed URI when fallback is enabled.
    pub fn strategies(config: &ConnectionConfig) -> Vec<ConnectTarget> {
        if config.is_uri() {
            return vec![ConnectTarget::Uri(config.host.trim().to_string())];
        }

        let mut targets = vec![ConnectTarget::Structured(StructuredTarget {
            host: config.host.trim().to_string(),
            port: config.port,
            username: config.effective_username().map(str::to_string),
            password: config.effective_password().map(str::to_string),
            database: config.database,
            tls: config.use_tls,
        })];

        if config.uri_fallback {
            match config.build_uri() {
                Ok(uri) => targets.push(ConnectTarget::Uri(uri)),
                Err(err) => tracing::debug!("[CONNECT] skipping URI fallback: {}", err),
            }
        }

        targets
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            ConnectTarget::Structured(_) => "structured",
            ConnectTarget::Uri(_) => "uri",
        }
    }

    /// Target description safe for logs
    pub fn redacted(&self) -> String {
        match self {
            ConnectTarget::Structured(t) => format!("{}:{}/{}", t.host, t.port, t.database),
            ConnectTarget::Uri(uri) => config::redact_uri(uri),
        }
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Structured(t) => f.debug_tuple("Structured").field(t).finish(),
            ConnectTarget::Uri(_) => f.debug_tuple("Uri").field(&self.redacted()).finish(),
        }
    }
}

/// Opens connections to the store
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Open a connection and complete the handshake (auth, database selection)
    async fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn StoreConnection>, StoreError>;
}

/// Commands available on an open store connection
#[async_trait]
pub trait StoreConnection: Send + Sync {
    async fn ping(&self) -> Result<String, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Plain write; clears any previous expiry
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Value and expiry written in one command
    async fn set_with_expiry(&self, key: &str, value: &str, seconds: u64) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remaining TTL: `-2` absent, `-1` no expiry, otherwise seconds
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Returns `false` when the key does not exist
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError>;

    /// Returns `true` when the field was newly created
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError>;

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    async fn quit(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_related_kinds() {
        assert!(StoreError::new(StoreErrorKind::ConnectionLost, "reset").is_connection_related());
        assert!(StoreError::new(StoreErrorKind::Timeout, "slow").is_connection_related());
        assert!(!StoreError::new(StoreErrorKind::Auth, "WRONGPASS").is_connection_related());
        assert!(!StoreError::new(StoreErrorKind::WrongType, "WRONGTYPE").is_connection_related());
    }

    #[test]
    fn test_command_errors_are_not_matched_by_message() {
        let err = StoreError::new(StoreErrorKind::Command, "ERR unknown command 'connection'");
        assert!(!err.is_connection_related());

        let err = StoreError::new(StoreErrorKind::Other, "Connection closed by server");
        assert!(err.is_connection_related());
    }

    #[test]
    fn test_strategies_for_structured_config() {
        let config = ConnectionConfig::new("cache.internal".to_string(), 6379)
            .with_auth(None, Some("pw".to_string()));
        let targets = ConnectTarget::strategies(&config);

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].strategy(), "structured");
        assert_eq!(targets[1].strategy(), "uri");
        assert!(!format!("{:?}", targets).contains("pw"));
    }

    #[test]
    fn test_strategies_for_uri_config() {
        let config = ConnectionConfig::from_uri("redis://cache.internal:6379/1");
        let targets = ConnectTarget::strategies(&config);
        assert_eq!(targets, vec![ConnectTarget::Uri("redis://cache.internal:6379/1".to_string())]);

        let no_fallback = ConnectionConfig::new("localhost".to_string(), 6379).with_uri_fallback(false);
        assert_eq!(ConnectTarget::strategies(&no_fallback).len(), 1);
    }
}

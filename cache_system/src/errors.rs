//! Error types for cache operations
//!
//! This module defines all error types that can occur
//! while connecting to the store and running operations against it.

use crate::store::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use type_mapping::ValueError;

/// Why a connection could not be established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionFailureReason {
    /// Credentials rejected, never retried
    Auth,
    /// Retry budget used up
    Exhausted,
    /// Every address strategy was rejected for a reason retrying cannot fix
    Refused,
}

impl fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionFailureReason::Auth => "auth",
            ConnectionFailureReason::Exhausted => "exhausted",
            ConnectionFailureReason::Refused => "refused",
        })
    }
}

/// Cache system errors
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Timed out connecting to {target} after {waited_ms}ms")]
    ConnectionTimeout { target: String, waited_ms: u64 },

    #[error("Connection to {target} failed ({reason}) after {attempts} attempt(s): {cause}")]
    ConnectionFailed {
        target: String,
        reason: ConnectionFailureReason,
        attempts: u32,
        cause: String,
    },

    #[error("Operation '{op}' on key '{key}' failed after {attempts} attempt(s): {cause}")]
    OperationFailed {
        op: &'static str,
        key: String,
        attempts: u32,
        cause: StoreError,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Connection manager not initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CacheError::Validation(_))
    }

    /// Errors raised while establishing the connection itself
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            CacheError::ConnectionTimeout { .. } | CacheError::ConnectionFailed { .. }
        )
    }
}

impl From<ValueError> for CacheError {
    fn from(err: ValueError) -> Self {
        CacheError::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for CacheError {
    fn from(err: config::ConfigError) -> Self {
        CacheError::Config(err.to_string())
    }
}

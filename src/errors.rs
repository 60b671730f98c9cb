//! Error types for the cachewarden crate
//!
//! This module contains all error types that can be returned by cachewarden operations.

use cache_system::CacheError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheWardenError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid renewal policy: {0}")]
    Policy(#[from] renewal_engine::PolicyError),

    /// A single batch item failed; the whole batch is aborted
    #[error("Item {index}{} failed: {source}", key_suffix(.key))]
    Item {
        index: usize,
        key: Option<String>,
        #[source]
        source: CacheError,
    },
}

impl CacheWardenError {
    pub(crate) fn item(index: usize, key: Option<&str>, source: CacheError) -> Self {
        CacheWardenError::Item {
            index,
            key: key.map(str::to_string),
            source,
        }
    }

    /// Underlying cache error, if any
    pub fn cache_error(&self) -> Option<&CacheError> {
        match self {
            CacheWardenError::Cache(err) => Some(err),
            CacheWardenError::Item { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CacheWardenError::Policy(_))
            || self.cache_error().is_some_and(CacheError::is_validation)
    }
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        Some(key) => format!(" (key '{}')", key),
        None => String::new(),
    }
}

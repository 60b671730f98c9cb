//! Cache system for resilient store access
//!
//! This crate owns the shared store connection and runs operations
//! through it, with a Redis backend and an in-memory backend.

pub mod backoff;
pub mod errors;
pub mod executor;
pub mod manager;
pub mod memory;
pub mod prelude;
pub mod redis_backend;
pub mod store;

// Re-export centralized config
pub use config::{ConnectionConfig, RetryConfig};

pub use errors::{CacheError, ConnectionFailureReason};
pub use executor::OperationExecutor;
pub use manager::{ConnectionHandle, ConnectionManager};
pub use memory::{MemoryConnector, MemoryStore};
pub use redis_backend::RedisConnector;
pub use store::{ConnectTarget, StoreConnection, StoreConnector, StoreError, StoreErrorKind};

//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::errors::{CacheError, ConnectionFailureReason};
pub use crate::executor::OperationExecutor;
pub use crate::manager::{ConnectionHandle, ConnectionManager};
pub use crate::memory::MemoryConnector;
pub use crate::redis_backend::RedisConnector;
pub use crate::store::{StoreConnection, StoreConnector, StoreError, StoreErrorKind};

// Re-export centralized config
pub use config::{ConnectionConfig, RetryConfig};

// Common external dependencies
pub use async_trait::async_trait;
pub use signal_system::{ConnectionEvent, ConnectionState, EventType};
pub use tokio;

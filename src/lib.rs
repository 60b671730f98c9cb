//! # cachewarden
//!
//! Connection-resilient cache renewal for Redis: a shared, self-healing
//! store connection, operations that retry across reconnects, and TTL-driven
//! renewal decisions, exposed as batch operations over JSON records.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cachewarden::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let warden = CacheWarden::new(config).await?;
//!
//!     let records = vec![json!({"id": "user:1"}).as_object().cloned().unwrap_or_default()];
//!     let params = GetParams::new(KeySource::field("id"), DataType::Json)
//!         .with_policy(RenewalPolicy::percent(30.0, 3600)?);
//!
//!     let output = operations::get::execute(&warden, &records, &params).await?;
//!     println!("{} entries need renewal", output.channel("needs_renewal").len());
//!
//!     warden.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod operations;
pub mod prelude;
pub mod records;

// Re-export the main public types for convenience
pub use core::CacheWarden;
pub use errors::CacheWardenError;
pub use records::{BatchOutput, KeySource, Record, ValueSource};

// Re-export centralized config
pub use config::{AppConfig, ConnectionConfig, RenewalConfig, RetryConfig};

// Re-export internal crates
pub use cache_system;
pub use renewal_engine;
pub use signal_system;
pub use type_mapping;

// Re-export external dependencies used in public API
pub use async_trait;
pub use serde_json;

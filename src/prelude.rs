//! Convenience re-exports for common cachewarden usage
//!
//! This prelude module re-exports the most commonly used items from the cachewarden ecosystem,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use cachewarden::prelude::*;
//!
//! let policy = RenewalPolicy::fixed(300, 3600).unwrap();
//! assert_eq!(classify(120, &policy), Classification::NeedsRenewal);
//! ```

// Core cachewarden components
pub use crate::core::CacheWarden;
pub use crate::errors::CacheWardenError;
pub use crate::operations;
pub use crate::operations::get::GetParams;
pub use crate::operations::manipulate::{ManipulateParams, Manipulation};
pub use crate::operations::renew::RenewParams;
pub use crate::operations::set::SetParams;
pub use crate::records::{BatchOutput, KeySource, Record, ValueSource};

// Re-export centralized config
pub use config::{AppConfig, ConnectionConfig, RenewalConfig, RetryConfig, ThresholdMode, UpdateMode};

// Re-export signal system for event handling
pub use signal_system::prelude::*;

// Re-export cache system
pub use cache_system::prelude::*;

// Renewal decisions
pub use renewal_engine::{
    CacheRenewer, Classification, RenewalAction, RenewalCheck, RenewalOutcome, RenewalPolicy,
    classify, plan,
};

// Value representation
pub use type_mapping::{CacheValue, DataType};

// Common external dependencies
pub use async_trait;
pub use tokio;

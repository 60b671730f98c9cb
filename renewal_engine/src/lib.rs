//! Renewal decision engine
//!
//! Classifies cache entries by remaining TTL against a [`RenewalPolicy`]
//! and performs renewals through the cache-system executor.

pub mod classify;
pub mod policy;
pub mod renewer;

pub use classify::{Classification, RenewalAction, classify, plan};
pub use policy::{PolicyError, RenewalPolicy};
pub use renewer::{CacheEntry, CacheRenewer, RenewalCheck, RenewalOutcome};

//! Signal system for connection lifecycle events
//!
//! This crate provides the event types and subscriber registry used to
//! observe the store connection in the cachewarden ecosystem.

pub mod event;
pub mod manager;
pub mod prelude;
pub mod types;

pub use event::{ConnectionEvent, EventType};
pub use manager::SignalManager;
pub use types::{ConnectionState, EventCallback};

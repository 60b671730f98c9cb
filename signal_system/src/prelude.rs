//! Convenience re-exports for common signal-system usage

// Core signal system components
pub use crate::event::{ConnectionEvent, EventType};
pub use crate::manager::SignalManager;
pub use crate::types::{ConnectionState, EventCallback};

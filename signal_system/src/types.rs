//! Type definitions for signal system
//!
//! This module contains the connection lifecycle states and the
//! callback type used by subscribers.

use crate::event::ConnectionEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Synchronous event callback
pub type EventCallback = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Lifecycle state of the shared store connection
///
/// `Uninitialized -> Connecting -> Ready -> (Error | Closing) -> Ended`, with
/// `Ready -> Connecting` on a detected drop and `Ended -> Connecting` on a
/// forced reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Ready,
    Error,
    Closing,
    Ended,
}

impl ConnectionState {
    /// Whether a transition from `self` to `next` is part of the lifecycle
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Uninitialized, Connecting)
                | (Connecting, Ready)
                | (Connecting, Error)
                | (Connecting, Ended)
                | (Ready, Connecting)
                | (Ready, Error)
                | (Ready, Closing)
                | (Error, Connecting)
                | (Error, Closing)
                | (Error, Ended)
                | (Closing, Ended)
                | (Ended, Connecting)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Error => "error",
            ConnectionState::Closing => "closing",
            ConnectionState::Ended => "ended",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Connection event types and definitions
//!
//! This module defines the structure of connection lifecycle events
//! that flow through the signal system.

use serde::{Deserialize, Serialize};

use crate::types::ConnectionState;

/// Connection event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Socket established, handshake pending
    Connect,
    /// Handshake finished and liveness confirmed
    Ready,
    Error,
    Reconnecting,
    /// Handle closed for good
    End,
    /// Handle handed off for teardown after an identity change
    Close,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Connect => "connect",
            EventType::Ready => "ready",
            EventType::Error => "error",
            EventType::Reconnecting => "reconnecting",
            EventType::End => "end",
            EventType::Close => "close",
        }
    }
}

/// Connection lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub event_type: EventType,
    /// State the manager moved into
    pub state: ConnectionState,
    /// Redacted connection target
    pub target: String,
    /// Handle generation, if a handle is involved
    pub handle_id: Option<u64>,
    /// Connect attempt number within the current reconnect sequence
    pub attempt: Option<u32>,
    pub message: Option<String>,
    /// Event timestamp (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ConnectionEvent {
    pub fn new(event_type: EventType, state: ConnectionState, target: String) -> Self {
        Self {
            event_type,
            state,
            target,
            handle_id: None,
            attempt: None,
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_handle_id(mut self, handle_id: u64) -> Self {
        self.handle_id = Some(handle_id);
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

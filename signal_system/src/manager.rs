use crate::event::{ConnectionEvent, EventType};
use crate::types::EventCallback;
use std::sync::Arc;

/// Signal manager for connection lifecycle notifications
///
/// Every emitted event is logged through `tracing` before subscribers run,
/// so observability does not depend on anyone being subscribed.
pub struct SignalManager {
    callbacks: std::sync::RwLock<Vec<EventCallback>>,
}

impl std::fmt::Debug for SignalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalManager")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

impl SignalManager {
    pub fn new() -> Self {
        Self {
            callbacks: std::sync::RwLock::new(Vec::new()),
        }
    }

    /// Add event callback
    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.push(Arc::new(callback));
        }
    }

    /// Emit event to all subscribers
    pub fn emit(&self, event: ConnectionEvent) {
        log_event(&event);

        // Snapshot so a callback may register further callbacks without deadlocking
        let callbacks: Vec<EventCallback> = match self.callbacks.read() {
            Ok(callbacks) => callbacks.clone(),
            Err(_) => return,
        };
        for callback in callbacks.iter() {
            callback(&event);
        }
    }

    /// Clear all callbacks
    pub fn clear_callbacks(&self) {
        if let Ok(mut callbacks) = self.callbacks.write() {
            callbacks.clear();
        }
    }

    /// Get number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new()
    }
}

fn log_event(event: &ConnectionEvent) {
    let message = event.message.as_deref().unwrap_or("");
    match event.event_type {
        EventType::Error => tracing::warn!(
            endpoint = %event.target,
            handle_id = ?event.handle_id,
            attempt = ?event.attempt,
            "[CONNECTION] error: {}",
            message
        ),
        EventType::Reconnecting => tracing::info!(
            endpoint = %event.target,
            attempt = ?event.attempt,
            "[CONNECTION] reconnecting {}",
            message
        ),
        EventType::Ready => tracing::info!(
            endpoint = %event.target,
            handle_id = ?event.handle_id,
            "[CONNECTION] ready"
        ),
        _ => tracing::debug!(
            endpoint = %event.target,
            handle_id = ?event.handle_id,
            state = %event.state,
            "[CONNECTION] {} {}",
            event.event_type.as_str(),
            message
        ),
    }
}

//! Connection lifecycle manager
//!
//! This module owns the single shared store connection: it creates it on
//! demand, drives it to `Ready`, probes it before reuse, replaces it when the
//! connection identity changes and tears it down on shutdown.

use crate::backoff;
use crate::errors::{CacheError, ConnectionFailureReason};
use crate::store::{ConnectTarget, StoreConnection, StoreConnector, StoreError, StoreErrorKind};
use config::{ConnectionConfig, ConnectionIdentity, RetryConfig};
use signal_system::{ConnectionEvent, ConnectionState, EventType, SignalManager};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

/// An established, ready connection shared by all callers
#[derive(Clone)]
pub struct ConnectionHandle {
    id: u64,
    identity: ConnectionIdentity,
    strategy: &'static str,
    connection: Arc<dyn StoreConnection>,
    command_timeout: Duration,
}

impl ConnectionHandle {
    /// Generation number, unique per manager
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    /// Address strategy that produced this connection
    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    pub fn connection(&self) -> Arc<dyn StoreConnection> {
        self.connection.clone()
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }
}

impl Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("strategy", &self.strategy)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

struct Slot {
    config: Option<ConnectionConfig>,
    handle: Option<ConnectionHandle>,
    state: ConnectionState,
    /// Bumped whenever a connect round finishes or the identity changes
    sequence: u64,
    last_outcome: Option<Result<ConnectionHandle, CacheError>>,
}

impl Slot {
    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            tracing::debug!(from = %self.state, to = %next, "[CONNECTION] unusual state transition");
        }
        self.state = next;
    }

    fn target(&self) -> String {
        self.config
            .as_ref()
            .map(|c| c.redacted_target())
            .unwrap_or_else(|| "<unconfigured>".to_string())
    }

    fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.handle.as_ref().map(|h| h.id) == Some(handle.id)
    }

    /// Outcome of the round that finished while a caller was waiting
    fn shared_outcome(&self) -> Option<Result<ConnectionHandle, CacheError>> {
        match self.last_outcome.as_ref()? {
            Ok(handle) if self.state == ConnectionState::Ready && self.is_current(handle) => {
                Some(Ok(handle.clone()))
            }
            Ok(_) => None,
            Err(err) => Some(Err(err.clone())),
        }
    }
}

/// Owner of the shared store connection
pub struct ConnectionManager {
    connector: Arc<dyn StoreConnector>,
    retry: RetryConfig,
    signals: Arc<SignalManager>,
    slot: RwLock<Slot>,
    connect_guard: Mutex<()>,
    next_handle_id: AtomicU64,
}

impl Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.slot.try_read() {
            Ok(slot) => slot.state.as_str(),
            Err(_) => "lock_busy",
        };

        f.debug_struct("ConnectionManager")
            .field("retry", &self.retry)
            .field("state", &state)
            .finish()
    }
}

impl ConnectionManager {
    /// Create a manager; no connection is opened until the first `acquire()`
    pub fn new(connector: Arc<dyn StoreConnector>, retry: RetryConfig) -> Self {
        Self::with_signals(connector, retry, Arc::new(SignalManager::new()))
    }

    pub fn with_signals(
        connector: Arc<dyn StoreConnector>,
        retry: RetryConfig,
        signals: Arc<SignalManager>,
    ) -> Self {
        Self {
            connector,
            retry,
            signals,
            slot: RwLock::new(Slot {
                config: None,
                handle: None,
                state: ConnectionState::Uninitialized,
                sequence: 0,
                last_outcome: None,
            }),
            connect_guard: Mutex::new(()),
            next_handle_id: AtomicU64::new(1),
        }
    }

    pub fn signals(&self) -> &Arc<SignalManager> {
        &self.signals
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub async fn state(&self) -> ConnectionState {
        self.slot.read().await.state
    }

    pub async fn config(&self) -> Option<ConnectionConfig> {
        self.slot.read().await.config.clone()
    }

    /// Store the connection parameters
    ///
    /// Identical identity keeps the current handle and only refreshes
    /// timeouts. A different identity retires the current handle; its
    /// teardown runs in the background.
    pub async fn initialize(&self, config: ConnectionConfig) -> Result<(), CacheError> {
        config.validate()?;
        self.retry.validate()?;

        let _guard = self.connect_guard.lock().await;
        let retired = {
            let mut slot = self.slot.write().await;
            let same_identity = slot
                .config
                .as_ref()
                .map(|current| current.identity() == config.identity());

            match same_identity {
                Some(true) => {
                    if let Some(handle) = slot.handle.as_mut() {
                        handle.command_timeout = config.command_timeout();
                    }
                    slot.config = Some(config);
                    return Ok(());
                }
                None => {
                    tracing::debug!(endpoint = %config.redacted_target(), "[CONNECTION] configured");
                    slot.config = Some(config);
                    return Ok(());
                }
                Some(false) => {}
            }

            let previous_target = slot.target();
            let retired = slot.handle.take();
            if retired.is_some() || slot.state == ConnectionState::Error {
                slot.transition(ConnectionState::Closing);
                slot.transition(ConnectionState::Ended);
            }
            tracing::info!(
                from = %previous_target,
                to = %config.redacted_target(),
                "[CONNECTION] identity changed"
            );
            slot.config = Some(config);
            slot.sequence += 1;
            slot.last_outcome = None;
            retired.map(|handle| (handle, previous_target))
        };

        if let Some((handle, target)) = retired {
            self.signals.emit(
                ConnectionEvent::new(EventType::Close, ConnectionState::Ended, target.clone())
                    .with_handle_id(handle.id)
                    .with_message("identity changed"),
            );
            self.spawn_teardown(handle, target);
        }
        Ok(())
    }

    /// Current handle when `Ready`, without a liveness probe
    pub async fn ready_handle(&self) -> Option<ConnectionHandle> {
        let slot = self.slot.read().await;
        match slot.state {
            ConnectionState::Ready => slot.handle.clone(),
            _ => None,
        }
    }

    /// A ready handle, reusing the current one when it answers a probe
    pub async fn acquire(&self) -> Result<ConnectionHandle, CacheError> {
        let (current, observed, ready_timeout) = {
            let slot = self.slot.read().await;
            let config = slot.config.as_ref().ok_or(CacheError::NotInitialized)?;
            let current = match slot.state {
                ConnectionState::Ready => slot.handle.clone(),
                _ => None,
            };
            (current, slot.sequence, config.ready_timeout())
        };

        if let Some(handle) = current {
            let probe = match timeout(ready_timeout, handle.connection.ping()).await {
                Ok(Ok(_)) => return Ok(handle),
                Ok(Err(err)) => err,
                Err(_) => StoreError::new(
                    StoreErrorKind::Timeout,
                    format!("liveness probe timed out after {}ms", ready_timeout.as_millis()),
                ),
            };
            self.mark_dropped(&handle, &probe).await;
        }

        self.reconnect(observed).await
    }

    /// Handles are shared; idle connections stay open for reuse
    pub fn release(&self, _handle: ConnectionHandle) {}

    /// Report a failure on `handle`; only the current handle changes state
    pub async fn invalidate(&self, handle: &ConnectionHandle, err: &StoreError) {
        let target = {
            let mut slot = self.slot.write().await;
            if !slot.is_current(handle) || slot.state != ConnectionState::Ready {
                return;
            }
            slot.transition(ConnectionState::Error);
            slot.target()
        };

        self.signals.emit(
            ConnectionEvent::new(EventType::Error, ConnectionState::Error, target)
                .with_handle_id(handle.id)
                .with_message(err.to_string()),
        );
    }

    /// Open a new handle even if the current one looks healthy
    pub async fn force_reconnect(&self) -> Result<ConnectionHandle, CacheError> {
        let (observed, target) = {
            let slot = self.slot.read().await;
            if slot.config.is_none() {
                return Err(CacheError::NotInitialized);
            }
            (slot.sequence, slot.target())
        };

        self.signals.emit(
            ConnectionEvent::new(EventType::Reconnecting, ConnectionState::Connecting, target)
                .with_message("forced"),
        );
        self.reconnect(observed).await
    }

    /// Close the connection: `Closing`, bounded `QUIT`, `Ended`
    ///
    /// Teardown failures are logged and swallowed.
    pub async fn shutdown(&self) {
        let _guard = self.connect_guard.lock().await;
        let (handle, target, wait) = {
            let mut slot = self.slot.write().await;
            let wait = slot
                .config
                .as_ref()
                .map(|c| c.ready_timeout())
                .unwrap_or(Duration::from_secs(5));
            let handle = slot.handle.take();
            if handle.is_none() && slot.state != ConnectionState::Error {
                return;
            }
            slot.transition(ConnectionState::Closing);
            (handle, slot.target(), wait)
        };

        let handle_id = handle.as_ref().map(|h| h.id);
        if let Some(handle) = handle {
            self.signals.emit(
                ConnectionEvent::new(EventType::Close, ConnectionState::Closing, target.clone())
                    .with_handle_id(handle.id)
                    .with_message("shutdown"),
            );
            quit_quietly(&handle, wait, &target).await;
        }

        {
            let mut slot = self.slot.write().await;
            slot.transition(ConnectionState::Ended);
            slot.sequence += 1;
            slot.last_outcome = None;
        }

        let mut event = ConnectionEvent::new(EventType::End, ConnectionState::Ended, target);
        if let Some(id) = handle_id {
            event = event.with_handle_id(id);
        }
        self.signals.emit(event);
    }

    async fn mark_dropped(&self, handle: &ConnectionHandle, err: &StoreError) {
        let target = {
            let mut slot = self.slot.write().await;
            if !slot.is_current(handle) || slot.state != ConnectionState::Ready {
                return;
            }
            slot.transition(ConnectionState::Connecting);
            slot.target()
        };

        self.signals.emit(
            ConnectionEvent::new(EventType::Error, ConnectionState::Connecting, target)
                .with_handle_id(handle.id)
                .with_message(format!("liveness probe failed: {}", err)),
        );
    }

    /// Single-flight connect round
    ///
    /// `observed` is the sequence the caller saw before deciding to
    /// reconnect. If another round finished in the meantime its outcome is
    /// returned instead of connecting again.
    async fn reconnect(&self, observed: u64) -> Result<ConnectionHandle, CacheError> {
        let _guard = self.connect_guard.lock().await;

        let config = {
            let mut slot = self.slot.write().await;
            if slot.sequence != observed {
                if let Some(outcome) = slot.shared_outcome() {
                    return outcome;
                }
            }
            let config = slot.config.clone().ok_or(CacheError::NotInitialized)?;
            slot.transition(ConnectionState::Connecting);
            config
        };

        let target = config.redacted_target();
        let outcome = self
            .connect_with_retry(&config)
            .await
            .map(|(connection, strategy)| ConnectionHandle {
                id: self.next_handle_id.fetch_add(1, Ordering::SeqCst),
                identity: config.identity(),
                strategy,
                connection,
                command_timeout: config.command_timeout(),
            });

        let replaced = {
            let mut slot = self.slot.write().await;
            slot.sequence += 1;
            slot.last_outcome = Some(outcome.clone());
            match &outcome {
                Ok(handle) => {
                    slot.transition(ConnectionState::Ready);
                    slot.handle.replace(handle.clone())
                }
                Err(_) => {
                    slot.transition(ConnectionState::Error);
                    slot.handle.take()
                }
            }
        };

        match &outcome {
            Ok(handle) => self.signals.emit(
                ConnectionEvent::new(EventType::Ready, ConnectionState::Ready, target.clone())
                    .with_handle_id(handle.id)
                    .with_message(handle.strategy),
            ),
            Err(err) => self.signals.emit(
                ConnectionEvent::new(EventType::Error, ConnectionState::Error, target.clone())
                    .with_message(err.to_string()),
            ),
        }

        if let Some(old) = replaced {
            self.spawn_teardown(old, target);
        }

        outcome
    }

    async fn connect_with_retry(
        &self,
        config: &ConnectionConfig,
    ) -> Result<(Arc<dyn StoreConnection>, &'static str), CacheError> {
        let targets = ConnectTarget::strategies(config);
        let target = config.redacted_target();
        let budget = self.retry.connect_attempts.max(1);
        let mut delays = backoff::delays(backoff::exponential(
            self.retry.connect_base_delay_ms,
            self.retry.connect_max_delay_ms,
            budget - 1,
        ));

        let mut last_error: Option<StoreError> = None;
        let mut last_wait_ms = 0u64;

        for attempt in 1..=budget {
            if attempt > 1 {
                let delay = delays
                    .next()
                    .unwrap_or(Duration::from_millis(self.retry.connect_max_delay_ms));
                self.signals.emit(
                    ConnectionEvent::new(EventType::Reconnecting, ConnectionState::Connecting, target.clone())
                        .with_attempt(attempt)
                        .with_message(format!("in {}ms", delay.as_millis())),
                );
                tokio::time::sleep(delay).await;
            }

            let mut rejected = 0usize;
            for candidate in &targets {
                self.signals.emit(
                    ConnectionEvent::new(EventType::Connect, ConnectionState::Connecting, target.clone())
                        .with_attempt(attempt)
                        .with_message(candidate.strategy()),
                );

                match self.connect_once(config, candidate).await {
                    Ok(connection) => return Ok((connection, candidate.strategy())),
                    Err((err, waited_ms)) => {
                        tracing::warn!(
                            endpoint = %target,
                            strategy = candidate.strategy(),
                            attempt,
                            "[CONNECT] attempt failed: {}",
                            err
                        );

                        if err.is_auth() {
                            return Err(CacheError::ConnectionFailed {
                                target,
                                reason: ConnectionFailureReason::Auth,
                                attempts: attempt,
                                cause: err.to_string(),
                            });
                        }
                        if matches!(
                            err.kind,
                            StoreErrorKind::InvalidTarget
                                | StoreErrorKind::Command
                                | StoreErrorKind::WrongType
                        ) {
                            rejected += 1;
                        }
                        if let Some(waited) = waited_ms {
                            last_wait_ms = waited;
                        }
                        last_error = Some(err);
                    }
                }
            }

            if rejected == targets.len() {
                return Err(CacheError::ConnectionFailed {
                    target,
                    reason: ConnectionFailureReason::Refused,
                    attempts: attempt,
                    cause: last_error.map(|e| e.to_string()).unwrap_or_default(),
                });
            }
        }

        match last_error {
            Some(err) if err.kind == StoreErrorKind::Timeout => Err(CacheError::ConnectionTimeout {
                target,
                waited_ms: last_wait_ms,
            }),
            other => Err(CacheError::ConnectionFailed {
                target,
                reason: ConnectionFailureReason::Exhausted,
                attempts: budget,
                cause: other
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no address strategies".to_string()),
            }),
        }
    }

    /// One strategy: bounded connect, then bounded ready probe
    ///
    /// A timeout error carries the wait that elapsed.
    async fn connect_once(
        &self,
        config: &ConnectionConfig,
        candidate: &ConnectTarget,
    ) -> Result<Arc<dyn StoreConnection>, (StoreError, Option<u64>)> {
        let connect_wait = config.connect_timeout();
        let connection = match timeout(connect_wait, self.connector.connect(candidate)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(err)) => return Err((err, None)),
            Err(_) => {
                return Err((
                    StoreError::new(
                        StoreErrorKind::Timeout,
                        format!("connect timed out after {}ms", connect_wait.as_millis()),
                    ),
                    Some(config.connect_timeout_ms),
                ));
            }
        };

        let ready_wait = config.ready_timeout();
        match timeout(ready_wait, connection.ping()).await {
            Ok(Ok(_)) => Ok(connection),
            Ok(Err(err)) => Err((err, None)),
            Err(_) => Err((
                StoreError::new(
                    StoreErrorKind::Timeout,
                    format!("not ready after {}ms", ready_wait.as_millis()),
                ),
                Some(config.ready_timeout_ms),
            )),
        }
    }

    fn spawn_teardown(&self, handle: ConnectionHandle, target: String) {
        let signals = self.signals.clone();
        tokio::spawn(async move {
            quit_quietly(&handle, Duration::from_secs(5), &target).await;
            signals.emit(
                ConnectionEvent::new(EventType::End, ConnectionState::Ended, target)
                    .with_handle_id(handle.id),
            );
        });
    }
}

async fn quit_quietly(handle: &ConnectionHandle, wait: Duration, target: &str) {
    match timeout(wait, handle.connection.quit()).await {
        Ok(Ok(())) => tracing::debug!(endpoint = %target, handle_id = handle.id, "[CONNECTION] closed"),
        Ok(Err(err)) => tracing::debug!(
            endpoint = %target,
            handle_id = handle.id,
            "[CONNECTION] quit failed, ignoring: {}",
            err
        ),
        Err(_) => tracing::debug!(
            endpoint = %target,
            handle_id = handle.id,
            "[CONNECTION] quit timed out after {}ms, ignoring",
            wait.as_millis()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;
    use std::sync::Mutex as StdMutex;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("memory".to_string(), 6379).with_uri_fallback(false)
    }

    fn manager(connector: &Arc<MemoryConnector>, retry: RetryConfig) -> ConnectionManager {
        ConnectionManager::new(connector.clone(), retry)
    }

    #[tokio::test]
    async fn test_acquire_before_initialize() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = manager(&connector, RetryConfig::default());
        assert!(matches!(manager.acquire().await, Err(CacheError::NotInitialized)));
        assert_eq!(manager.state().await, ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_two_acquires_share_one_connection() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = manager(&connector, RetryConfig::default());
        manager.initialize(config()).await.unwrap();

        let first = manager.acquire().await.unwrap();
        manager.release(first.clone());
        let second = manager.acquire().await.unwrap();

        assert_eq!(connector.connect_count(), 1);
        assert_eq!(first.id(), second.id());
        assert_eq!(manager.state().await, ConnectionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_after_exactly_three_attempts() {
        let connector = Arc::new(MemoryConnector::new());
        connector.fail_next_connects(4, StoreErrorKind::Refused);
        let manager = manager(&connector, RetryConfig::default().with_connect_attempts(3));
        manager.initialize(config()).await.unwrap();

        let err = manager.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::ConnectionFailed {
                reason: ConnectionFailureReason::Exhausted,
                attempts: 3,
                ..
            }
        ));
        assert_eq!(connector.connect_count(), 3);
        assert_eq!(manager.state().await, ConnectionState::Error);

        // The fourth injected failure is consumed by the next round, which then succeeds
        manager.acquire().await.unwrap();
        assert_eq!(connector.connect_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let connector = Arc::new(MemoryConnector::new());
        connector.fail_next_connects(2, StoreErrorKind::ConnectionLost);
        let manager = manager(
            &connector,
            RetryConfig::default()
                .with_connect_attempts(3)
                .with_connect_backoff(500, 5000),
        );
        manager.initialize(config()).await.unwrap();

        let started = tokio::time::Instant::now();
        manager.acquire().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_is_not_retried() {
        let connector = Arc::new(MemoryConnector::new().with_required_password("right"));
        let manager = manager(&connector, RetryConfig::default());
        manager
            .initialize(config().with_auth(None, Some("wrong".to_string())))
            .await
            .unwrap();

        let err = manager.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::ConnectionFailed {
                reason: ConnectionFailureReason::Auth,
                attempts: 1,
                ..
            }
        ));
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_handshake_is_not_retried() {
        let connector = Arc::new(MemoryConnector::new());
        connector.fail_next_connects(1, StoreErrorKind::InvalidTarget);
        let manager = manager(&connector, RetryConfig::default());
        manager.initialize(config()).await.unwrap();

        let err = manager.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::ConnectionFailed {
                reason: ConnectionFailureReason::Refused,
                ..
            }
        ));
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_connect_surfaces_timeout() {
        let connector = Arc::new(MemoryConnector::new());
        connector.set_connect_delay(Some(Duration::from_secs(60)));
        let manager = manager(&connector, RetryConfig::default().with_connect_attempts(2));
        manager
            .initialize(config().with_timeouts(1000, 1000, 1000))
            .await
            .unwrap();

        let err = manager.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::ConnectionTimeout { waited_ms: 1000, .. }
        ));
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_structured_then_uri_strategy() {
        let connector = Arc::new(MemoryConnector::new());
        connector.fail_next_connects(1, StoreErrorKind::ConnectionLost);
        let manager = manager(&connector, RetryConfig::default());
        manager
            .initialize(ConnectionConfig::new("memory".to_string(), 6379))
            .await
            .unwrap();

        let handle = manager.acquire().await.unwrap();
        assert_eq!(handle.strategy(), "uri");
        assert_eq!(connector.strategies(), vec!["structured", "uri"]);
    }

    #[tokio::test]
    async fn test_dropped_connection_is_replaced_on_acquire() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = manager(&connector, RetryConfig::default());
        manager.initialize(config()).await.unwrap();

        let first = manager.acquire().await.unwrap();
        connector.drop_connections();
        let second = manager.acquire().await.unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(manager.state().await, ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_identity_change_replaces_handle() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = manager(&connector, RetryConfig::default());
        manager.initialize(config()).await.unwrap();
        let first = manager.acquire().await.unwrap();

        // Same identity, new timeouts: handle kept
        manager
            .initialize(config().with_timeouts(2000, 2000, 2000))
            .await
            .unwrap();
        let same = manager.acquire().await.unwrap();
        assert_eq!(same.id(), first.id());
        assert_eq!(same.command_timeout(), Duration::from_millis(2000));

        manager.initialize(config().with_database(4)).await.unwrap();
        assert_eq!(manager.state().await, ConnectionState::Ended);
        let replaced = manager.acquire().await.unwrap();
        assert_ne!(replaced.id(), first.id());
        assert_eq!(replaced.identity().database, 4);
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_acquires_connect_once() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = Arc::new(manager(&connector, RetryConfig::default()));
        manager.initialize(config()).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.acquire().await.map(|h| h.id()) })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_and_forced_reconnect() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = manager(&connector, RetryConfig::default());
        let events = Arc::new(StdMutex::new(Vec::new()));
        {
            let events = events.clone();
            manager
                .signals()
                .add_callback(move |event| events.lock().unwrap().push(event.event_type));
        }
        manager.initialize(config()).await.unwrap();
        manager.acquire().await.unwrap();

        manager.shutdown().await;
        assert_eq!(manager.state().await, ConnectionState::Ended);
        assert!(manager.ready_handle().await.is_none());

        manager.force_reconnect().await.unwrap();
        assert_eq!(manager.state().await, ConnectionState::Ready);

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                EventType::Connect,
                EventType::Ready,
                EventType::Close,
                EventType::End,
                EventType::Reconnecting,
                EventType::Connect,
                EventType::Ready,
            ]
        );
    }

    #[tokio::test]
    async fn test_invalidate_ignores_stale_handles() {
        let connector = Arc::new(MemoryConnector::new());
        let manager = manager(&connector, RetryConfig::default());
        manager.initialize(config()).await.unwrap();

        let stale = manager.acquire().await.unwrap();
        let current = manager.force_reconnect().await.unwrap();
        assert_ne!(stale.id(), current.id());

        let err = StoreError::new(StoreErrorKind::ConnectionLost, "reset");
        manager.invalidate(&stale, &err).await;
        assert_eq!(manager.state().await, ConnectionState::Ready);

        manager.invalidate(&current, &err).await;
        assert_eq!(manager.state().await, ConnectionState::Error);
    }
}

//! In-memory store backend
//!
//! Behaves like a single Redis node for the commands the executor uses.
//! Expiry is measured with `tokio::time::Instant`, so a paused tokio clock
//! drives TTLs deterministically. Connect and command failures can be
//! injected, and connect/command counters make reuse and retry behavior
//! observable.

use crate::store::{ConnectTarget, StoreConnection, StoreConnector, StoreError, StoreErrorKind};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
enum Stored {
    Str(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

fn wrong_type() -> StoreError {
    StoreError::new(
        StoreErrorKind::WrongType,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared keyspace of the in-memory backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    command_failures: Mutex<VecDeque<StoreError>>,
    commands: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` commands fail with an error of `kind`
    pub fn fail_next_commands(&self, count: usize, kind: StoreErrorKind) {
        let mut failures = lock(&self.command_failures);
        for _ in 0..count {
            failures.push_back(StoreError::new(kind, format!("injected {} failure", kind)));
        }
    }

    /// Commands received so far, including pings
    pub fn command_count(&self) -> u64 {
        self.commands.load(Ordering::SeqCst)
    }

    /// Reset the expiry of a live key; `None` makes it permanent
    pub fn set_ttl(&self, key: &str, seconds: Option<u64>) -> bool {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        match live_entry(&mut entries, key, now) {
            Some(entry) => {
                entry.expires_at = seconds.map(|s| now + Duration::from_secs(s));
                true
            }
            None => false,
        }
    }

    /// Read a string value without going through a connection
    pub fn peek(&self, key: &str) -> Option<String> {
        let mut entries = lock(&self.entries);
        match live_entry(&mut entries, key, Instant::now()).map(|e| &e.value) {
            Some(Stored::Str(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        entries.retain(|_, e| !is_expired(e, now));
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin_command(&self) -> Result<(), StoreError> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        match lock(&self.command_failures).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn is_expired(entry: &Entry, now: Instant) -> bool {
    entry.expires_at.is_some_and(|at| at <= now)
}

fn live_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| is_expired(e, now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

/// Connector handing out connections to a shared `MemoryStore`
#[derive(Debug)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    connects: AtomicU32,
    connect_failures: Mutex<VecDeque<StoreError>>,
    connect_delay: Mutex<Option<Duration>>,
    required_password: Option<String>,
    strategies: Mutex<Vec<&'static str>>,
    issued: Mutex<Vec<Arc<AtomicBool>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            connects: AtomicU32::new(0),
            connect_failures: Mutex::new(VecDeque::new()),
            connect_delay: Mutex::new(None),
            required_password: None,
            strategies: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Reject connections whose password differs
    pub fn with_required_password(mut self, password: impl Into<String>) -> Self {
        self.required_password = Some(password.into());
        self
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    /// The next `count` connect calls fail with an error of `kind`
    pub fn fail_next_connects(&self, count: usize, kind: StoreErrorKind) {
        let mut failures = lock(&self.connect_failures);
        for _ in 0..count {
            failures.push_back(StoreError::new(kind, format!("injected {} failure", kind)));
        }
    }

    /// Every connect call waits this long before answering
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *lock(&self.connect_delay) = delay;
    }

    /// Number of connect calls so far
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Address strategies seen by connect calls, in order
    pub fn strategies(&self) -> Vec<&'static str> {
        lock(&self.strategies).clone()
    }

    /// Sever every connection handed out so far
    pub fn drop_connections(&self) {
        for alive in lock(&self.issued).iter() {
            alive.store(false, Ordering::SeqCst);
        }
    }

    fn password_of(target: &ConnectTarget) -> Option<String> {
        match target {
            ConnectTarget::Structured(t) => t.password.clone(),
            ConnectTarget::Uri(uri) => url::Url::parse(uri)
                .ok()
                .and_then(|u| u.password().map(str::to_string)),
        }
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn StoreConnection>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        lock(&self.strategies).push(target.strategy());

        let delay = *lock(&self.connect_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let injected = lock(&self.connect_failures).pop_front();
        if let Some(err) = injected {
            return Err(err);
        }

        if let Some(required) = &self.required_password {
            let given = Self::password_of(target);
            if given.as_deref() != Some(required.as_str()) {
                return Err(StoreError::new(
                    StoreErrorKind::Auth,
                    "WRONGPASS invalid username-password pair or user is disabled.",
                ));
            }
        }

        let alive = Arc::new(AtomicBool::new(true));
        lock(&self.issued).push(alive.clone());

        Ok(Arc::new(MemoryConnection {
            store: self.store.clone(),
            alive,
        }))
    }
}

/// Connection to a `MemoryStore`
#[derive(Debug)]
pub struct MemoryConnection {
    store: Arc<MemoryStore>,
    alive: Arc<AtomicBool>,
}

impl MemoryConnection {
    fn begin(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(StoreError::new(
                StoreErrorKind::ConnectionLost,
                "connection reset by peer",
            ));
        }
        self.store.begin_command()?;
        Ok(lock(&self.store.entries))
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn ping(&self) -> Result<String, StoreError> {
        let _entries = self.begin()?;
        Ok("PONG".to_string())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.begin()?;
        match live_entry(&mut entries, key, Instant::now()).map(|e| &e.value) {
            Some(Stored::Str(value)) => Ok(Some(value.clone())),
            Some(Stored::Hash(_)) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.begin()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Stored::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &str, seconds: u64) -> Result<(), StoreError> {
        let mut entries = self.begin()?;
        if seconds == 0 {
            return Err(StoreError::new(
                StoreErrorKind::Command,
                "ERR invalid expire time in 'set' command",
            ));
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Stored::Str(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(seconds)),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.begin()?;
        Ok(live_entry(&mut entries, key, Instant::now()).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut entries = self.begin()?;
        let now = Instant::now();
        Ok(match live_entry(&mut entries, key, now) {
            None => -2,
            Some(Entry { expires_at: None, .. }) => -1,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                // Rounded to the nearest second like the server does
                let remaining = at.saturating_duration_since(now).as_millis();
                ((remaining + 500) / 1000) as i64
            }
        })
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let mut entries = self.begin()?;
        let now = Instant::now();
        if live_entry(&mut entries, key, now).is_none() {
            return Ok(false);
        }
        if seconds == 0 {
            entries.remove(key);
        } else if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(now + Duration::from_secs(seconds));
        }
        Ok(true)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.begin()?;
        let now = Instant::now();
        if live_entry(&mut entries, key, now).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Stored::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Stored::Hash(fields)) => Ok(fields
                .insert(field.to_string(), value.to_string())
                .is_none()),
            _ => Err(wrong_type()),
        }
    }

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut entries = self.begin()?;
        let now = Instant::now();
        if live_entry(&mut entries, key, now).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Stored::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Stored::Hash(existing)) => {
                existing.extend(fields.iter().cloned());
                Ok(())
            }
            _ => Err(wrong_type()),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut entries = self.begin()?;
        match live_entry(&mut entries, key, Instant::now()).map(|e| &e.value) {
            Some(Stored::Hash(fields)) => Ok(fields.clone()),
            Some(Stored::Str(_)) => Err(wrong_type()),
            None => Ok(HashMap::new()),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.begin()?;
        let live = live_entry(&mut entries, key, Instant::now()).is_some();
        entries.remove(key);
        Ok(live)
    }

    async fn quit(&self) -> Result<(), StoreError> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

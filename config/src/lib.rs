//! # Configuration Management for cachewarden
//!
//! This crate provides centralized configuration structures for all cachewarden components:
//! the store connection, the retry/backoff budgets and the default renewal policy.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{ConnectionConfig, RetryConfig};
//!
//! let connection = ConnectionConfig::new("localhost".to_string(), 6379)
//!     .with_auth(None, Some("secret".to_string()))
//!     .with_database(2);
//!
//! let retry = RetryConfig::default().with_connect_attempts(5);
//! assert_eq!(retry.connect_attempts, 5);
//! assert_eq!(connection.database, 2);
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [connection]
//! host = "localhost"
//! port = 6379
//! password = "secret"
//! database = 0
//! use_tls = false
//! connect_timeout_ms = 15000
//!
//! [retry]
//! connect_attempts = 3
//! connect_base_delay_ms = 500
//! connect_max_delay_ms = 5000
//! operation_retries = 3
//!
//! [renewal]
//! threshold_mode = "percent_of_original"
//! threshold_value = 30.0
//! renewal_ttl = 3600
//! update_mode = "extend_only"
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from cachewarden.toml (or the path in CACHEWARDEN_CONFIG)
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{env, fmt, path::Path, time::Duration};
use thiserror::Error;
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "./cachewarden.toml";
const CONFIG_PATH_ENV: &str = "CACHEWARDEN_CONFIG";

/// Upper bound for the connect retry budget
pub const MAX_CONNECT_ATTEMPTS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub retry: RetryConfig,
    pub renewal: RenewalConfig,
}

/// Store connection configuration
///
/// `host` may be a full `redis://` / `rediss://` URI. In that case the URI is
/// authoritative and `port`, `username`, `password`, `database` and `use_tls`
/// are ignored.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: i64,
    pub use_tls: bool,
    pub connect_timeout_ms: u64,
    pub ready_timeout_ms: u64,
    pub command_timeout_ms: u64,
    /// Try a constructed URI when the structured address fails
    pub uri_fallback: bool,
}

/// Retry and backoff budgets for connecting and for individual operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub connect_attempts: u32,
    pub connect_base_delay_ms: u64,
    pub connect_max_delay_ms: u64,
    pub operation_retries: u32,
    pub operation_base_delay_ms: u64,
    pub operation_max_delay_ms: u64,
}

/// How the renewal threshold is interpreted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Renew when remaining TTL is at or below a fixed number of seconds
    FixedSeconds,
    /// Renew when remaining TTL is at or below a percentage of the original TTL
    PercentOfOriginal,
}

/// What a renewal writes back
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Refresh the TTL only, the stored value is untouched
    ExtendOnly,
    /// Write a new value together with the new TTL
    ReplaceValue,
}

/// Default renewal policy settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenewalConfig {
    pub threshold_mode: ThresholdMode,
    pub threshold_value: f64,
    pub renewal_ttl: u64,
    pub update_mode: UpdateMode,
    pub always_update: bool,
}

/// The part of a connection configuration that decides whether an existing
/// handle can be reused.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionIdentity {
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: i64,
    pub tls: bool,
}

impl fmt::Debug for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionIdentity")
            .field("address", &redact_uri(&self.address))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "(set)"))
            .field("database", &self.database)
            .field("tls", &self.tls)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from TOML file specified in .env or defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = {
            // A missing .env file is fine, a malformed one is not
            match dotenvy::dotenv() {
                Ok(_) => {}
                Err(err) if err.not_found() => {}
                Err(err) => return Err(err.into()),
            }

            if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
                Self::from_file(&config_path)
            } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
                Self::from_file(DEFAULT_CONFIG_PATH)
            } else {
                Err(ConfigError::Invalid(format!(
                    "Config path must be specified in .env file as {} or in {} file",
                    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH
                )))
            }
        }?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()?;
        self.retry.validate()?;
        self.renewal.validate()?;
        Ok(())
    }
}

impl ConnectionConfig {
    /// Create a new connection configuration with default timeouts
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            ..Self::default()
        }
    }

    /// Create a configuration from a full connection URI
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            host: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_auth(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_uri_fallback(mut self, enabled: bool) -> Self {
        self.uri_fallback = enabled;
        self
    }

    pub fn with_timeouts(mut self, connect_ms: u64, ready_ms: u64, command_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.ready_timeout_ms = ready_ms;
        self.command_timeout_ms = command_ms;
        self
    }

    /// Whether `host` carries a full connection URI
    pub fn is_uri(&self) -> bool {
        self.host.contains("://")
    }

    /// Username with the `DEFAULT` placeholder and blank values treated as unset
    pub fn effective_username(&self) -> Option<&str> {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty() && *u != "DEFAULT")
    }

    /// Password with blank values treated as unset
    pub fn effective_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.trim().is_empty())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Identity used to decide handle reuse
    pub fn identity(&self) -> ConnectionIdentity {
        if self.is_uri() {
            return ConnectionIdentity {
                address: self.host.trim().to_string(),
                username: None,
                password: None,
                database: 0,
                tls: self.host.trim_start().starts_with("rediss://"),
            };
        }

        ConnectionIdentity {
            address: format!("{}:{}", self.host.trim(), self.port),
            username: self.effective_username().map(str::to_string),
            password: self.effective_password().map(str::to_string),
            database: self.database,
            tls: self.use_tls,
        }
    }

    /// Build a connection URI from the discrete fields, credentials percent-encoded.
    ///
    /// Returns the configured URI unchanged when `host` already is one.
    pub fn build_uri(&self) -> Result<String, ConfigError> {
        if self.is_uri() {
            return Ok(self.host.trim().to_string());
        }

        let scheme = if self.use_tls { "rediss" } else { "redis" };
        let host = self.host.trim();
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };

        let mut url = Url::parse(&format!("{}://{}:{}/{}", scheme, host, self.port, self.database))
            .map_err(|e| ConfigError::Invalid(format!("Cannot build connection URI: {}", e)))?;

        if let Some(username) = self.effective_username() {
            url.set_username(username)
                .map_err(|_| ConfigError::Invalid("Username cannot be encoded".to_string()))?;
        }
        if let Some(password) = self.effective_password() {
            url.set_password(Some(password))
                .map_err(|_| ConfigError::Invalid("Password cannot be encoded".to_string()))?;
        }

        Ok(url.to_string())
    }

    /// Target description safe for logs
    pub fn redacted_target(&self) -> String {
        if self.is_uri() {
            redact_uri(self.host.trim())
        } else {
            format!("{}:{}/{}", self.host.trim(), self.port, self.database)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Connection host cannot be empty".to_string(),
            ));
        }
        if self.is_uri() {
            let url = Url::parse(self.host.trim())
                .map_err(|e| ConfigError::Invalid(format!("Invalid connection URI: {}", e)))?;
            if !matches!(url.scheme(), "redis" | "rediss" | "redis+unix" | "unix") {
                return Err(ConfigError::Invalid(format!(
                    "Unsupported connection URI scheme: {}",
                    url.scheme()
                )));
            }
        } else if self.port == 0 {
            return Err(ConfigError::Invalid(
                "Connection port cannot be zero".to_string(),
            ));
        }
        if self.database < 0 {
            return Err(ConfigError::Invalid(
                "Connection database index cannot be negative".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Connection connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.ready_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Connection ready_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Connection command_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("target", &self.redacted_target())
            .field("username", &self.effective_username())
            .field("password", &self.effective_password().map(|_| "(set)"))
            .field("use_tls", &self.use_tls)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("ready_timeout_ms", &self.ready_timeout_ms)
            .field("command_timeout_ms", &self.command_timeout_ms)
            .field("uri_fallback", &self.uri_fallback)
            .finish()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            use_tls: false,
            connect_timeout_ms: 15_000,
            ready_timeout_ms: 5_000,
            command_timeout_ms: 10_000,
            uri_fallback: true,
        }
    }
}

impl RetryConfig {
    pub fn new(connect_attempts: u32, operation_retries: u32) -> Self {
        Self {
            connect_attempts,
            operation_retries,
            ..Self::default()
        }
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts;
        self
    }

    pub fn with_operation_retries(mut self, retries: u32) -> Self {
        self.operation_retries = retries;
        self
    }

    pub fn with_connect_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.connect_base_delay_ms = base_ms;
        self.connect_max_delay_ms = max_ms;
        self
    }

    pub fn with_operation_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.operation_base_delay_ms = base_ms;
        self.operation_max_delay_ms = max_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_attempts == 0 || self.connect_attempts > MAX_CONNECT_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "Retry connect_attempts must be between 1 and {}",
                MAX_CONNECT_ATTEMPTS
            )));
        }
        if self.connect_base_delay_ms > self.connect_max_delay_ms {
            return Err(ConfigError::Invalid(
                "Retry connect_base_delay_ms cannot be greater than connect_max_delay_ms"
                    .to_string(),
            ));
        }
        if self.operation_base_delay_ms > self.operation_max_delay_ms {
            return Err(ConfigError::Invalid(
                "Retry operation_base_delay_ms cannot be greater than operation_max_delay_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            connect_base_delay_ms: 500,
            connect_max_delay_ms: 5_000,
            operation_retries: 3,
            operation_base_delay_ms: 200,
            operation_max_delay_ms: 2_000,
        }
    }
}

impl RenewalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold_value.is_finite() {
            return Err(ConfigError::Invalid(
                "Renewal threshold_value must be a finite number".to_string(),
            ));
        }
        match self.threshold_mode {
            ThresholdMode::PercentOfOriginal => {
                if self.threshold_value <= 0.0 || self.threshold_value > 100.0 {
                    return Err(ConfigError::Invalid(
                        "Renewal threshold_value must be in (0, 100] for percent mode".to_string(),
                    ));
                }
            }
            ThresholdMode::FixedSeconds => {
                if self.threshold_value < 0.0 {
                    return Err(ConfigError::Invalid(
                        "Renewal threshold_value cannot be negative".to_string(),
                    ));
                }
            }
        }
        if self.renewal_ttl == 0 {
            return Err(ConfigError::Invalid(
                "Renewal renewal_ttl must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            threshold_mode: ThresholdMode::PercentOfOriginal,
            threshold_value: 30.0,
            renewal_ttl: 3600,
            update_mode: UpdateMode::ExtendOnly,
            always_update: false,
        }
    }
}

/// Strip credentials from a connection URI for logging
pub fn redact_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<invalid uri>".to_string(),
    }
}

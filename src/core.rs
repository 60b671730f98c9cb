//! Core cachewarden functionality
//!
//! This module contains the main CacheWarden struct, which wires the
//! connection manager, the operation executor and the renewer together.

use std::sync::Arc;

use cache_system::{
    ConnectionManager, OperationExecutor, RedisConnector, StoreConnector,
};
use config::{AppConfig, ConnectionConfig};
use renewal_engine::{CacheRenewer, RenewalPolicy};
use signal_system::{ConnectionState, SignalManager};

use crate::errors::CacheWardenError;

/// Main coordinator shared by the batch operations
#[derive(Debug, Clone)]
pub struct CacheWarden {
    config: Arc<AppConfig>,
    manager: Arc<ConnectionManager>,
    executor: OperationExecutor,
    renewer: CacheRenewer,
    default_policy: RenewalPolicy,
}

impl CacheWarden {
    /// Create a coordinator backed by a real Redis server
    ///
    /// No connection is opened until the first operation.
    pub async fn new(config: AppConfig) -> Result<Self, CacheWardenError> {
        Self::with_connector(config, Arc::new(RedisConnector::new())).await
    }

    /// Create a coordinator over any store backend
    pub async fn with_connector(
        config: AppConfig,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<Self, CacheWardenError> {
        config.validate()?;
        let default_policy = RenewalPolicy::try_from(&config.renewal)?;

        let manager = Arc::new(ConnectionManager::with_signals(
            connector,
            config.retry.clone(),
            Arc::new(SignalManager::new()),
        ));
        manager.initialize(config.connection.clone()).await?;

        let executor = OperationExecutor::new(manager.clone(), &config.retry);
        let renewer = CacheRenewer::new(executor.clone());

        Ok(Self {
            config: Arc::new(config),
            manager,
            executor,
            renewer,
            default_policy,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    pub fn renewer(&self) -> &CacheRenewer {
        &self.renewer
    }

    /// Policy built from the `[renewal]` configuration section
    pub fn default_policy(&self) -> &RenewalPolicy {
        &self.default_policy
    }

    /// Subscribe to connection lifecycle events here
    pub fn signals(&self) -> &Arc<SignalManager> {
        self.manager.signals()
    }

    /// Point the shared connection at new connection settings
    ///
    /// Meant to be called between batches. Same identity keeps the open
    /// connection.
    pub async fn reconnect_with(&self, connection: ConnectionConfig) -> Result<(), CacheWardenError> {
        self.manager.initialize(connection).await?;
        Ok(())
    }

    /// Round-trip a PING through the executor
    pub async fn health_check(&self) -> Result<String, CacheWardenError> {
        Ok(self.executor.ping().await?)
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.manager.state().await
    }

    /// Close the shared connection; errors are logged, not returned
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}

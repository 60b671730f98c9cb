//! Integration tests for connection reuse, reconnect budgets and retry
//! isolation, driven through the public coordinator.

use cachewarden::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex};

async fn setup(retry: RetryConfig) -> (CacheWarden, Arc<MemoryConnector>) {
    let connector = Arc::new(MemoryConnector::new());
    let config = AppConfig {
        connection: ConnectionConfig::new("memory".to_string(), 6379).with_uri_fallback(false),
        retry,
        ..AppConfig::default()
    };
    let warden = CacheWarden::with_connector(config, connector.clone())
        .await
        .expect("in-memory setup cannot fail");
    (warden, connector)
}

#[tokio::test]
async fn test_connection_is_reused_across_operations() {
    let (warden, connector) = setup(RetryConfig::default()).await;

    let first = warden.manager().acquire().await.unwrap();
    let second = warden.manager().acquire().await.unwrap();
    assert_eq!(first.id(), second.id());

    warden.health_check().await.unwrap();
    warden.executor().set("k", "v").await.unwrap();
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(warden.connection_state().await, ConnectionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_connect_budget_is_exact() {
    let (warden, connector) = setup(RetryConfig::default().with_connect_attempts(3)).await;
    connector.fail_next_connects(4, StoreErrorKind::Refused);

    let err = warden.health_check().await.unwrap_err();
    assert!(matches!(
        err.cache_error(),
        Some(CacheError::ConnectionFailed {
            reason: ConnectionFailureReason::Exhausted,
            attempts: 3,
            ..
        })
    ));
    assert_eq!(connector.connect_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_json_never_reconnects() {
    let (warden, connector) = setup(RetryConfig::default()).await;
    warden.executor().set("doc", "{\"a\":1}").await.unwrap();

    let params = SetParams::new(
        KeySource::literal("doc"),
        DataType::Json,
        ValueSource::literal("{broken"),
    );
    let input = vec![json!({}).as_object().cloned().unwrap_or_default()];
    let err = operations::set::execute(&warden, &input, &params)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(warden.connection_state().await, ConnectionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_operations_survive_a_dropped_connection() {
    let (warden, connector) = setup(RetryConfig::default()).await;
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = events.clone();
        warden
            .signals()
            .add_callback(move |event| events.lock().unwrap().push(event.event_type));
    }

    warden.executor().set("k", "v").await.unwrap();
    connector.drop_connections();
    assert_eq!(warden.executor().get("k").await.unwrap().as_deref(), Some("v"));

    assert_eq!(connector.connect_count(), 2);
    let events = events.lock().unwrap();
    assert!(events.contains(&EventType::Error));
    assert_eq!(events.iter().filter(|e| **e == EventType::Ready).count(), 2);
}

#[tokio::test]
async fn test_identity_change_between_batches() {
    let (warden, connector) = setup(RetryConfig::default()).await;
    warden.health_check().await.unwrap();

    warden
        .reconnect_with(
            ConnectionConfig::new("memory".to_string(), 6379)
                .with_uri_fallback(false)
                .with_database(1),
        )
        .await
        .unwrap();
    warden.health_check().await.unwrap();
    assert_eq!(connector.connect_count(), 2);

    warden.shutdown().await;
    assert_eq!(warden.connection_state().await, ConnectionState::Ended);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let config = AppConfig {
        retry: RetryConfig::default().with_connect_attempts(11),
        ..AppConfig::default()
    };
    let err = CacheWarden::with_connector(config, Arc::new(MemoryConnector::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheWardenError::Config(_)));
}

//! Integration tests for the set -> get -> renew flow
//!
//! Runs the batch operations against the in-memory backend with a paused
//! clock, so TTLs move only when the test advances time.

use cachewarden::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

async fn setup() -> (CacheWarden, Arc<MemoryConnector>) {
    let connector = Arc::new(MemoryConnector::new());
    let config = AppConfig {
        connection: ConnectionConfig::new("memory".to_string(), 6379).with_uri_fallback(false),
        ..AppConfig::default()
    };
    let warden = CacheWarden::with_connector(config, connector.clone())
        .await
        .expect("in-memory setup cannot fail");
    (warden, connector)
}

fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|value| value.as_object().cloned())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_set_get_renew_end_to_end() {
    let (warden, connector) = setup().await;
    let input = records(vec![json!({"id": "k1"})]);
    let policy = RenewalPolicy::percent(50.0, 100).unwrap();

    let set = SetParams::new(
        KeySource::field("id"),
        DataType::Json,
        ValueSource::literal(json!({"a": 1})),
    )
    .with_expiration(100);
    operations::set::execute(&warden, &input, &set).await.unwrap();

    let get = GetParams::new(KeySource::field("id"), DataType::Json).with_policy(policy);
    let fresh = operations::get::execute(&warden, &input, &get).await.unwrap();
    assert_eq!(fresh.channel("valid").len(), 1);
    assert_eq!(fresh.channel("valid")[0]["value"], json!({"a": 1}));
    assert_eq!(fresh.channel("valid")[0]["classification"], json!("valid"));

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(warden.executor().ttl("k1").await.unwrap(), 40);

    let stale = operations::get::execute(&warden, &input, &get).await.unwrap();
    assert!(stale.channel("valid").is_empty());
    assert_eq!(stale.channel("needs_renewal").len(), 1);
    assert_eq!(stale.channel("needs_renewal")[0]["ttl"], json!(40));

    let renew = RenewParams::new(KeySource::field("id")).with_policy(policy);
    let renewed = operations::renew::execute(&warden, &input, &renew).await.unwrap();
    assert_eq!(renewed.channel("renewed").len(), 1);
    assert_eq!(renewed.channel("renewed")[0]["ttl_after"], json!(100));

    assert_eq!(warden.executor().ttl("k1").await.unwrap(), 100);
    assert_eq!(connector.store().peek("k1").as_deref(), Some("{\"a\":1}"));

    // Everything above went through the one connection
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_lands_in_invalid() {
    let (warden, _) = setup().await;
    warden.executor().set_with_expiry("short", "v", 5).await.unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;

    let get = GetParams::new(KeySource::literal("short"), DataType::String);
    let output = operations::get::execute(&warden, &records(vec![json!({})]), &get)
        .await
        .unwrap();
    assert_eq!(output.channel("invalid").len(), 1);

    let arrays = output.into_arrays();
    assert_eq!(arrays.len(), 3);
    assert!(arrays[0].is_empty());
    assert!(arrays[2].is_empty());
}

#[tokio::test]
async fn test_batch_error_names_the_failing_item() {
    let (warden, connector) = setup().await;
    let input = records(vec![
        json!({"id": "a", "payload": "{\"ok\": true}"}),
        json!({"id": "b", "payload": "{not json"}),
        json!({"id": "c", "payload": "{\"ok\": true}"}),
    ]);
    let set = SetParams::new(
        KeySource::field("id"),
        DataType::Json,
        ValueSource::field("payload"),
    );

    let err = operations::set::execute(&warden, &input, &set)
        .await
        .unwrap_err();
    match &err {
        CacheWardenError::Item { index, key, source } => {
            assert_eq!(*index, 1);
            assert_eq!(key.as_deref(), Some("b"));
            assert!(source.is_validation());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("key 'b'"));

    // Items before the failure were written, the rest were not
    assert!(connector.store().peek("a").is_some());
    assert!(connector.store().peek("c").is_none());
}

#[tokio::test]
async fn test_default_policy_comes_from_config() {
    let (warden, _) = setup().await;
    let policy = warden.default_policy();
    assert_eq!(policy.threshold_mode(), ThresholdMode::PercentOfOriginal);
    assert_eq!(policy.renewal_ttl(), 3600);
    assert_eq!(policy.threshold_seconds(), 1080.0);
}

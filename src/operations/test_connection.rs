//! Connectivity check annotating every input record

use serde_json::json;

use crate::core::CacheWarden;
use crate::errors::CacheWardenError;
use crate::records::{BatchOutput, Record, merge, timestamp};

pub const TESTED: &str = "tested";

/// Channel: `tested`
///
/// One PING for the whole batch; a failure aborts it.
pub async fn execute(warden: &CacheWarden, records: &[Record]) -> Result<BatchOutput, CacheWardenError> {
    let response = warden.health_check().await?;
    let connection = &warden.config().connection;
    let host = match connection.is_uri() {
        true => connection.redacted_target(),
        false => connection.host.trim().to_string(),
    };

    let mut output = BatchOutput::new(&[TESTED]);
    for record in records {
        let mut annotation = Record::new();
        annotation.insert(
            "connection_test".to_string(),
            json!({
                "success": true,
                "response": response,
                "host": host,
                "port": connection.port,
                "database": connection.database,
                "timestamp": timestamp(),
            }),
        );
        output.push(TESTED, merge(record, annotation));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::{records, warden};
    use cache_system::StoreErrorKind;

    #[tokio::test]
    async fn test_annotates_each_record() {
        let (warden, _) = warden().await;
        let output = execute(&warden, &records(vec![json!({"a": 1}), json!({"b": 2})]))
            .await
            .unwrap();

        let tested = output.channel(TESTED);
        assert_eq!(tested.len(), 2);
        assert_eq!(tested[0]["a"], json!(1));
        assert_eq!(tested[1]["connection_test"]["response"], json!("PONG"));
        assert_eq!(tested[1]["connection_test"]["port"], json!(6379));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_store_fails_the_batch() {
        let (warden, connector) = warden().await;
        connector.fail_next_connects(10, StoreErrorKind::Refused);

        let err = execute(&warden, &records(vec![json!({})])).await.unwrap_err();
        assert!(err.cache_error().is_some_and(|e| e.is_connection()));
    }
}

//! Connection behaviour of the MongoDB store
//!
//! The live test expects a MongoDB restored from the LifeSnaps dump on
//! localhost:27017 and is ignored by default.

use lifesnaps_query::{
    Condition, ConnectionConfig, DataError, DocumentQuery, DocumentStore, Filter,
};
use lifesnaps_query_mongodb::MongoStore;
use std::time::{Duration, Instant};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("lifesnaps_query_mongodb=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_unreachable_server_fails_within_timeout() {
    init_tracing();

    // Nothing listens on port 1
    let config = ConnectionConfig::new("127.0.0.1", 1, "rais_anonymized")
        .with_connect_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let result = MongoStore::connect(&config).await;

    assert!(
        matches!(result, Err(DataError::ConnectionFailed(_))),
        "Unreachable server should fail with ConnectionFailed"
    );
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "Connection attempt should be bounded by the connect timeout"
    );
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_before_connecting() {
    let config = ConnectionConfig::new("", 27017, "rais_anonymized");
    let result = MongoStore::connect(&config).await;
    assert!(matches!(result, Err(DataError::InvalidConfiguration(_))));

    let config = ConnectionConfig::new("localhost", 27017, "");
    let result = MongoStore::connect(&config).await;
    assert!(matches!(result, Err(DataError::InvalidConfiguration(_))));
}

#[tokio::test]
#[ignore = "requires a running MongoDB with the LifeSnaps dataset"]
async fn test_live_dataset_user_ids_and_records() {
    init_tracing();

    let config = ConnectionConfig::from_env().expect("valid environment configuration");
    let store = MongoStore::connect(&config).await.expect("MongoDB reachable");
    assert_eq!(store.source_type(), "mongodb");

    let users = store
        .distinct("fitbit", "id", &Filter::new())
        .await
        .expect("distinct succeeds");
    assert!(!users.is_empty(), "Dataset should contain users");

    let query = DocumentQuery::new("fitbit").with_filter(
        Filter::new()
            .and(Condition::eq("id", users[0].clone()))
            .and(Condition::eq("type", "Profile")),
    );
    let documents = store.find(&query).await.expect("aggregate succeeds");
    assert!(!documents.is_empty());

    store.close().await.expect("close succeeds");
}

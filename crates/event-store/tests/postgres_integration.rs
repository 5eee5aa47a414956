//! PostgreSQL integration tests.
//!
//! These tests use a shared PostgreSQL container and need a local
//! Docker daemon. Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    AggregateId, AppendOptions, EventEnvelope, EventStore, EventStoreError, PostgresEventStore,
    Snapshot, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - the container stays alive for all tests.
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn store() -> PostgresEventStore {
    let info = get_container_info().await;
    let pool = PgPool::connect(&info.connection_string).await.unwrap();
    let store = PostgresEventStore::new(pool);
    store.run_migrations().await.unwrap();
    store
}

fn create_test_event(
    aggregate_id: AggregateId,
    version: Version,
    event_type: &str,
) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("TestAggregate")
        .event_type(event_type)
        .version(version)
        .payload_raw(serde_json::json!({"test": true}))
        .build()
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn append_and_load_roundtrip() {
    let store = store().await;
    let aggregate_id = AggregateId::new();

    let events = vec![
        create_test_event(aggregate_id, Version::new(1), "Event1"),
        create_test_event(aggregate_id, Version::new(2), "Event2"),
    ];
    let version = store
        .append(events, AppendOptions::expect_new())
        .await
        .unwrap();
    assert_eq!(version, Version::new(2));

    let loaded = store.get_events_for_aggregate(aggregate_id).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].event_type, "Event1");
    assert_eq!(loaded[1].version, Version::new(2));
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn concurrency_conflict_on_stale_version() {
    let store = store().await;
    let aggregate_id = AggregateId::new();

    store
        .append(
            vec![create_test_event(aggregate_id, Version::first(), "Event1")],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let result = store
        .append(
            vec![create_test_event(aggregate_id, Version::new(2), "Event2")],
            AppendOptions::expect_version(Version::initial()),
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn load_from_version() {
    let store = store().await;
    let aggregate_id = AggregateId::new();

    let events = vec![
        create_test_event(aggregate_id, Version::new(1), "Event1"),
        create_test_event(aggregate_id, Version::new(2), "Event2"),
        create_test_event(aggregate_id, Version::new(3), "Event3"),
    ];
    store
        .append(events, AppendOptions::expect_new())
        .await
        .unwrap();

    let tail = store
        .get_events_for_aggregate_from_version(aggregate_id, Version::new(2))
        .await
        .unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].version, Version::new(2));
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn snapshot_upsert_and_retrieve() {
    let store = store().await;
    let aggregate_id = AggregateId::new();

    store
        .save_snapshot(Snapshot::new(
            aggregate_id,
            "TestAggregate",
            Version::new(5),
            serde_json::json!({"state": "v5"}),
        ))
        .await
        .unwrap();

    // Replace with a newer snapshot.
    store
        .save_snapshot(Snapshot::new(
            aggregate_id,
            "TestAggregate",
            Version::new(10),
            serde_json::json!({"state": "v10"}),
        ))
        .await
        .unwrap();

    let snapshot = store.get_snapshot(aggregate_id).await.unwrap().unwrap();
    assert_eq!(snapshot.version, Version::new(10));
    assert_eq!(snapshot.state["state"], "v10");
}

#[tokio::test]
#[serial]
#[ignore = "requires a local Docker daemon"]
async fn aggregate_version_tracks_max() {
    let store = store().await;
    let aggregate_id = AggregateId::new();

    assert!(
        store
            .get_aggregate_version(aggregate_id)
            .await
            .unwrap()
            .is_none()
    );

    store
        .append(
            vec![
                create_test_event(aggregate_id, Version::new(1), "Event1"),
                create_test_event(aggregate_id, Version::new(2), "Event2"),
            ],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    assert_eq!(
        store.get_aggregate_version(aggregate_id).await.unwrap(),
        Some(Version::new(2))
    );
}

//! Integration tests for the policy store and key-value stores

use std::{sync::Arc, time::Duration};

use ratewatch::{
    channels::ChannelRegistry,
    engine::{AlertEngine, AlertOutcome},
    models::{AlertEvent, ChannelKind, Severity},
    persistence::{
        InMemoryKeyValueStore, SqlitePolicyStore, error::PersistenceError,
        traits::{KeyValueStore, PolicyStore},
    },
    test_helpers::{ManualClock, PolicyBuilder, RecordingChannel},
};
use tempfile::TempDir;

async fn setup_db() -> SqlitePolicyStore {
    let store = SqlitePolicyStore::new("sqlite::memory:")
        .await
        .expect("Failed to set up in-memory database");
    store.run_migrations().await.expect("Failed to run migrations");
    store
}

#[tokio::test]
async fn test_policies_survive_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("policies.db").display());

    let store = SqlitePolicyStore::new(&url).await.unwrap();
    store.run_migrations().await.unwrap();
    let policy = PolicyBuilder::new("login")
        .severity(Severity::Critical)
        .cooldown_ms(60_000)
        .channel(ChannelKind::Email)
        .channel(ChannelKind::from("pager"))
        .build();
    store.upsert_policy(&policy).await.unwrap();
    store.close().await;

    let reopened = SqlitePolicyStore::new(&url).await.unwrap();
    reopened.run_migrations().await.unwrap();
    assert_eq!(reopened.fetch_enabled_policies().await.unwrap(), vec![policy]);
}

#[tokio::test]
async fn test_engine_reads_policies_from_sqlite() {
    let store = Arc::new(setup_db().await);
    store
        .upsert_policy(&PolicyBuilder::new("login").channel(ChannelKind::Slack).build())
        .await
        .unwrap();
    store
        .upsert_policy(
            &PolicyBuilder::new("signup").channel(ChannelKind::Slack).disabled().build(),
        )
        .await
        .unwrap();

    let clock = ManualClock::default();
    let slack = RecordingChannel::new();
    let mut registry = ChannelRegistry::new();
    registry.register(ChannelKind::Slack, Arc::new(slack.clone()));
    let engine = AlertEngine::builder()
        .policy_store(store.clone())
        .kv_store(Arc::new(InMemoryKeyValueStore::new(Arc::new(clock.clone()))))
        .channels(registry)
        .clock(Arc::new(clock.clone()))
        .build()
        .unwrap();

    assert!(matches!(
        engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await,
        AlertOutcome::Dispatched(_)
    ));
    // Disabled rows are not loaded, so the group has no policy at all.
    assert_eq!(engine.send_alert(AlertEvent::new("signup", "ip-1", 6)).await, AlertOutcome::NoPolicy);

    store.delete_policy("login").await.unwrap();
    clock.advance(Duration::from_secs(60));
    assert_eq!(engine.send_alert(AlertEvent::new("login", "ip-2", 6)).await, AlertOutcome::NoPolicy);
    assert_eq!(slack.call_count(), 1);
}

#[tokio::test]
async fn test_delete_missing_policy_is_not_found() {
    let store = setup_db().await;
    assert!(matches!(store.delete_policy("nope").await, Err(PersistenceError::NotFound(_))));
}

#[tokio::test]
async fn test_in_memory_store_history_semantics() {
    let clock = ManualClock::default();
    let store = InMemoryKeyValueStore::new(Arc::new(clock.clone()));

    for i in 0..150 {
        store.push_front("alert_history:login", &i.to_string()).await.unwrap();
        store.trim("alert_history:login", 0, 99).await.unwrap();
    }
    store.expire("alert_history:login", Duration::from_secs(604_800)).await.unwrap();

    let entries = store.range("alert_history:login", 0, 49).await.unwrap();
    assert_eq!(entries.len(), 50);
    assert_eq!(entries[0], "149");
    assert_eq!(store.range("alert_history:login", 0, -1).await.unwrap().len(), 100);

    clock.advance(Duration::from_secs(604_800));
    assert!(store.range("alert_history:login", 0, -1).await.unwrap().is_empty());
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! JetStream KV backend against a live server
//!
//! Run with a local `nats-server -js`:
//!
//! ```text
//! cargo test --test nats_kv_tests -- --ignored
//! ```

use serde_json::json;
use std::sync::Arc;

use powerapp_sdk::model::{Document, ResourceKey, ResourceType};
use powerapp_sdk::storage::{
    KvStoreConfig, NatsKvBackend, ResourceLocks, StorageBackend, StorageError, StorageOperation,
    StorageType,
};
use powerapp_sdk::{ActionStorage, NatsClient, NatsConfig};

async fn backend() -> Arc<NatsKvBackend> {
    let client = NatsClient::connect(&NatsConfig::default())
        .await
        .expect("NATS server with JetStream on localhost:4222");
    let config = KvStoreConfig {
        bucket: format!("POWERAPP_TEST_{}", uuid::Uuid::now_v7().simple()),
        storage: StorageType::Memory,
        ..Default::default()
    };
    Arc::new(NatsKvBackend::connect(client.jetstream(), config).await.unwrap())
}

fn document(value: serde_json::Value) -> Document {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
#[ignore = "requires NATS server"]
async fn test_create_then_get() {
    let backend = backend().await;
    let key = ResourceKey::new(ResourceType::PowerItem, "op-1");

    backend
        .create(&key, document(json!({"version": "1.0.0", "storage": {}})))
        .await
        .unwrap();
    let record = backend.get(&key).await.unwrap().unwrap();

    assert_eq!(record["version"], json!("1.0.0"));
    assert_eq!(record["type"], json!("power-item"));
    assert!(record.contains_key("createdAt"));
}

#[tokio::test]
#[ignore = "requires NATS server"]
async fn test_create_twice_fails() {
    let backend = backend().await;
    let key = ResourceKey::new(ResourceType::PowerItem, "op-1");

    backend.create(&key, Document::new()).await.unwrap();
    let second = backend.create(&key, Document::new()).await;

    assert!(matches!(second, Err(StorageError::AlreadyExists { .. })));
}

#[tokio::test]
#[ignore = "requires NATS server"]
async fn test_mutating_missing_record_fails() {
    let backend = backend().await;
    let key = ResourceKey::new(ResourceType::PowerGlance, "missing");

    let result = backend.apply(&key, &StorageOperation::inc("n", 1)).await;

    assert!(matches!(result, Err(StorageError::NotFound { .. })));
}

#[tokio::test]
#[ignore = "requires NATS server"]
async fn test_upsert_reports_saved_version() {
    let backend = backend().await;
    let key = ResourceKey::new(ResourceType::Installation, "inst-1");

    let first = backend.upsert(&key, "1.0.0", Document::new()).await.unwrap();
    let second = backend.upsert(&key, "2.0.0", Document::new()).await.unwrap();

    assert_eq!(first.saved_version, None);
    assert_eq!(second.saved_version.as_deref(), Some("1.0.0"));
    assert_eq!(second.record["version"], json!("2.0.0"));
}

#[tokio::test]
#[ignore = "requires NATS server"]
async fn test_upsert_migrated_writes_version_and_storage_together() {
    let backend = backend().await;
    let key = ResourceKey::new(ResourceType::PowerItem, "op-1");
    backend
        .upsert(&key, "1.0.0", document(json!({"storage": {"count": 1}})))
        .await
        .unwrap();

    let upserted = backend
        .upsert_migrated(&key, "2.0.0", Document::new(), Some(json!({"total": 1})))
        .await
        .unwrap();

    let record = backend.get(&key).await.unwrap().unwrap();
    assert_eq!(record, upserted.record);
    assert_eq!(record["version"], json!("2.0.0"));
    assert_eq!(record["storage"], json!({"total": 1}));
}

#[tokio::test]
#[ignore = "requires NATS server"]
async fn test_slice_matches_file_backend() {
    let backend = backend().await;
    let key = ResourceKey::new(ResourceType::PowerItem, "op-1");
    backend
        .create(&key, document(json!({"storage": {"list": [1, 2, 3]}})))
        .await
        .unwrap();

    let storage = backend
        .apply(&key, &StorageOperation::slice("list", -2))
        .await
        .unwrap();

    assert_eq!(storage, json!({"list": [2, 3]}));
}

#[tokio::test]
#[ignore = "requires NATS server"]
async fn test_concurrent_increments_survive_compare_and_swap() {
    let backend = backend().await;
    let key = ResourceKey::new(ResourceType::PowerItem, "op-1");
    backend.upsert(&key, "1.0.0", Document::new()).await.unwrap();
    let storage = ActionStorage::new(backend.clone(), ResourceLocks::new(), key.clone(), json!(null));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let storage = storage.clone();
            tokio::spawn(async move { storage.inc("hits", 1).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let record = backend.get(&key).await.unwrap().unwrap();
    assert_eq!(record["storage"], json!({"hits": 16}));
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Handler-facing storage façade
//!
//! The only way handler code reads or mutates a resource's storage blob.
//! Reads are synchronous against the last-loaded snapshot; every mutator
//! takes the resource's lock before touching the backend and refreshes the
//! snapshot with the result.

use serde_json::{Number, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use super::{ResourceLocks, StorageBackend, StorageOperation, StorageResult};
use crate::model::ResourceKey;

/// Concurrency-guarded view of one resource's storage blob
#[derive(Clone)]
pub struct ActionStorage {
    backend: Arc<dyn StorageBackend>,
    locks: ResourceLocks,
    key: ResourceKey,
    snapshot: Arc<RwLock<Value>>,
}

impl ActionStorage {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        locks: ResourceLocks,
        key: ResourceKey,
        storage: Value,
    ) -> Self {
        Self {
            backend,
            locks,
            key,
            snapshot: Arc::new(RwLock::new(storage)),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// The whole blob as last loaded (`Null` when undefined)
    pub fn get(&self) -> Value {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One top-level key of the blob as last loaded
    pub fn get_key(&self, key: &str) -> Option<Value> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub async fn set_storage(&self, storage: Value) -> StorageResult<Value> {
        let _guard = self.locks.acquire(&self.key).await;
        let stored = self.backend.set_storage(&self.key, storage).await?;
        self.refresh(stored.clone());
        Ok(stored)
    }

    pub async fn rename(&self, from: &str, to: &str) -> StorageResult<Value> {
        self.apply(StorageOperation::rename(from, to)).await
    }

    pub async fn inc(&self, path: &str, by: impl Into<Number>) -> StorageResult<Value> {
        self.apply(StorageOperation::inc(path, by)).await
    }

    pub async fn mul(&self, path: &str, by: impl Into<Number>) -> StorageResult<Value> {
        self.apply(StorageOperation::mul(path, by)).await
    }

    pub async fn set(&self, path: &str, value: impl Into<Value>) -> StorageResult<Value> {
        self.apply(StorageOperation::set(path, value)).await
    }

    pub async fn unset(&self, path: &str) -> StorageResult<Value> {
        self.apply(StorageOperation::unset(path)).await
    }

    pub async fn slice(&self, path: &str, size: i64) -> StorageResult<Value> {
        self.apply(StorageOperation::slice(path, size)).await
    }

    pub async fn shift(&self, path: &str) -> StorageResult<Value> {
        self.apply(StorageOperation::shift(path)).await
    }

    pub async fn unshift(&self, path: &str, value: impl Into<Value>) -> StorageResult<Value> {
        self.apply(StorageOperation::unshift(path, value)).await
    }

    pub async fn pop(&self, path: &str) -> StorageResult<Value> {
        self.apply(StorageOperation::pop(path)).await
    }

    pub async fn push<I>(&self, path: &str, values: I) -> StorageResult<Value>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.apply(StorageOperation::push(path, values)).await
    }

    /// Run any operator under the resource lock
    pub async fn apply(&self, operation: StorageOperation) -> StorageResult<Value> {
        let _guard = self.locks.acquire(&self.key).await;
        let stored = self.backend.apply(&self.key, &operation).await?;
        debug!(resource = %self.key, op = operation.name(), "storage updated");
        self.refresh(stored.clone());
        Ok(stored)
    }

    fn refresh(&self, storage: Value) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = storage;
    }
}

impl std::fmt::Debug for ActionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionStorage")
            .field("key", &self.key)
            .field("snapshot", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, ResourceType};
    use crate::storage::{FileBackend, StorageBackend};
    use serde_json::json;
    use tempfile::TempDir;

    async fn storage_for(dir: &TempDir, initial: Value) -> (Arc<dyn StorageBackend>, ActionStorage) {
        let backend: Arc<dyn StorageBackend> =
            Arc::new(FileBackend::open(dir.path().join("db.json")).await.unwrap());
        let key = ResourceKey::new(ResourceType::PowerItem, "tok");
        let mut document = Document::new();
        document.insert("storage".to_string(), initial.clone());
        backend.create(&key, document).await.unwrap();

        let storage = ActionStorage::new(Arc::clone(&backend), ResourceLocks::new(), key, initial);
        (backend, storage)
    }

    #[tokio::test]
    async fn test_snapshot_follows_mutations() {
        let dir = TempDir::new().unwrap();
        let (_, storage) = storage_for(&dir, json!({"count": 1})).await;

        assert_eq!(storage.get_key("count"), Some(json!(1)));

        storage.inc("count", 2).await.unwrap();
        storage.push("log", ["a"]).await.unwrap();

        assert_eq!(storage.get(), json!({"count": 3, "log": ["a"]}));
    }

    #[tokio::test]
    async fn test_set_storage_replaces_blob() {
        let dir = TempDir::new().unwrap();
        let (backend, storage) = storage_for(&dir, json!({"old": true})).await;

        storage.set_storage(json!({"new": 1})).await.unwrap();

        let record = backend.get(storage.key()).await.unwrap().unwrap();
        assert_eq!(record["storage"], json!({"new": 1}));
        assert_eq!(storage.get_key("old"), None);
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_snapshot() {
        let dir = TempDir::new().unwrap();
        let (_, storage) = storage_for(&dir, json!({"name": "x"})).await;

        assert!(storage.inc("name", 1).await.is_err());
        assert_eq!(storage.get(), json!({"name": "x"}));
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! File-backed resource store
//!
//! A single JSON document holding one record array per resource collection
//! plus a `migrations` counter of structural store migrations already
//! applied:
//!
//! ```json
//! {
//!   "migrations": 2,
//!   "installations": [{"installation": "i-1", "version": "1.0.0", ...}],
//!   "power-items": [],
//!   ...
//! }
//! ```
//!
//! Every mutation rewrites the file atomically (temp file + rename). When the
//! write fails the in-memory record is rolled back, so memory and disk never
//! disagree.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{
    apply_to_record, matches_filter, merge_changes, prepare_new_record, replace_storage,
    StorageBackend, StorageError, StorageOperation, StorageResult,
};
use crate::model::{Document, ResourceKey, ResourceType, UserModel};

/// A structural migration of the whole store
type StoreMigration = fn(&mut StoreData);

/// Structural migrations, applied in order, each exactly once per store
const STORE_MIGRATIONS: &[(&str, StoreMigration)] = &[
    ("ensure-collections", ensure_collections),
    ("backfill-user-ids", backfill_user_ids),
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    migrations: usize,
    #[serde(flatten)]
    collections: BTreeMap<String, Vec<Document>>,
}

fn ensure_collections(data: &mut StoreData) {
    for resource_type in ResourceType::ALL {
        data.collections
            .entry(resource_type.collection().to_string())
            .or_default();
    }
}

fn backfill_user_ids(data: &mut StoreData) {
    let Some(users) = data.collections.get_mut(ResourceType::User.collection()) else {
        return;
    };

    for record in users.iter_mut().filter(|r| !r.contains_key("id")) {
        let installation = record.get("installation").and_then(Value::as_str);
        let user = record.get("user").and_then(Value::as_str);
        if let (Some(installation), Some(user)) = (installation, user) {
            let id = UserModel::composite_id(installation, user);
            record.insert("id".to_string(), Value::String(id));
        }
    }
}

/// Local JSON-file implementation of [`StorageBackend`]
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl FileBackend {
    /// Load the store at `path` (starting empty if the file does not exist)
    /// and apply any pending structural migrations.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let mut data = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str::<StoreData>(&content).map_err(|e| {
                StorageError::FileDeserialization {
                    path: path.clone(),
                    message: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(StorageError::file_io(&path, e)),
        };

        let pending = STORE_MIGRATIONS.len().saturating_sub(data.migrations);
        for (name, migrate) in STORE_MIGRATIONS.iter().skip(data.migrations) {
            migrate(&mut data);
            data.migrations += 1;
            info!(path = %path.display(), migration = name, "applied store migration");
        }

        let backend = Self {
            path,
            data: Mutex::new(data),
        };

        if pending > 0 {
            let data = backend.data.lock().await;
            backend.persist(&data).await?;
        }

        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of structural migrations applied to this store
    pub async fn applied_migrations(&self) -> usize {
        self.data.lock().await.migrations
    }

    async fn persist(&self, data: &StoreData) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::file_io(parent, e))?;
        }

        let content = serde_json::to_vec_pretty(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)
            .await
            .map_err(|e| StorageError::file_io(&temp_path, e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StorageError::file_io(&self.path, e))?;

        Ok(())
    }

    /// Run `change` on a copy of the record, then swap it in and persist.
    async fn mutate<T>(
        &self,
        key: &ResourceKey,
        change: impl FnOnce(&mut Document) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let collection = key.resource_type.collection();
        let mut data = self.data.lock().await;

        let records = data.collections.entry(collection.to_string()).or_default();
        let index = records
            .iter()
            .position(|record| key.matches(record))
            .ok_or_else(|| StorageError::not_found(key))?;

        let mut record = records[index].clone();
        let result = change(&mut record)?;
        let previous = std::mem::replace(&mut records[index], record);

        if let Err(e) = self.persist(&data).await {
            if let Some(records) = data.collections.get_mut(collection) {
                records[index] = previous;
            }
            return Err(e);
        }

        debug!(resource = %key, "record written");
        Ok(result)
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn get(&self, key: &ResourceKey) -> StorageResult<Option<Document>> {
        let data = self.data.lock().await;
        Ok(data
            .collections
            .get(key.resource_type.collection())
            .and_then(|records| records.iter().find(|record| key.matches(record)))
            .cloned())
    }

    async fn list(
        &self,
        resource_type: ResourceType,
        filter: &Document,
    ) -> StorageResult<Vec<Document>> {
        let data = self.data.lock().await;
        Ok(data
            .collections
            .get(resource_type.collection())
            .map(|records| {
                records
                    .iter()
                    .filter(|record| matches_filter(record, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, key: &ResourceKey, document: Document) -> StorageResult<Document> {
        let collection = key.resource_type.collection();
        let mut data = self.data.lock().await;

        let records = data.collections.entry(collection.to_string()).or_default();
        if records.iter().any(|record| key.matches(record)) {
            return Err(StorageError::already_exists(key));
        }

        let record = prepare_new_record(key, document);
        records.push(record.clone());

        if let Err(e) = self.persist(&data).await {
            if let Some(records) = data.collections.get_mut(collection) {
                records.pop();
            }
            return Err(e);
        }

        debug!(resource = %key, "record created");
        Ok(record)
    }

    async fn update(&self, key: &ResourceKey, changes: Document) -> StorageResult<Document> {
        self.mutate(key, |record| {
            merge_changes(record, changes);
            Ok(record.clone())
        })
        .await
    }

    async fn set_storage(&self, key: &ResourceKey, storage: Value) -> StorageResult<Value> {
        self.mutate(key, |record| {
            replace_storage(record, storage.clone());
            Ok(storage)
        })
        .await
    }

    async fn apply(
        &self,
        key: &ResourceKey,
        operation: &StorageOperation,
    ) -> StorageResult<Value> {
        self.mutate(key, |record| apply_to_record(record, operation))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture is not an object"),
        }
    }

    #[tokio::test]
    async fn test_open_fresh_store_applies_all_migrations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let backend = FileBackend::open(&path).await.unwrap();
        assert_eq!(backend.applied_migrations().await, STORE_MIGRATIONS.len());

        let on_disk: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk["migrations"], json!(2));
        for resource_type in ResourceType::ALL {
            assert_eq!(on_disk[resource_type.collection()], json!([]));
        }
    }

    #[tokio::test]
    async fn test_legacy_store_backfills_user_ids_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            json!({
                "migrations": 1,
                "users": [{"installation": "i-1", "user": "u-1", "storage": {"a": 1}}]
            })
            .to_string(),
        )
        .unwrap();

        let backend = FileBackend::open(&path).await.unwrap();
        let record = backend
            .get(&ResourceKey::user("i-1", "u-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record["storage"], json!({"a": 1}));
        assert_eq!(backend.applied_migrations().await, 2);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let key = ResourceKey::new(ResourceType::PowerGlance, "tok");

        {
            let backend = FileBackend::open(&path).await.unwrap();
            backend
                .create(&key, document(json!({"clock": 3, "version": "1.0.0"})))
                .await
                .unwrap();
            backend
                .apply(&key, &StorageOperation::push("seen", [1, 2]))
                .await
                .unwrap();
        }

        let backend = FileBackend::open(&path).await.unwrap();
        let record = backend.get(&key).await.unwrap().unwrap();
        assert_eq!(record["clock"], json!(3));
        assert_eq!(record["token"], json!("tok"));
        assert_eq!(record["storage"], json!({"seen": [1, 2]}));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_identity() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path().join("store.json")).await.unwrap();
        let key = ResourceKey::installation("i-1");

        backend.create(&key, Document::new()).await.unwrap();
        let again = backend.create(&key, Document::new()).await;

        assert!(matches!(again, Err(StorageError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_upsert_migrated_bumps_version_with_storage() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path().join("store.json")).await.unwrap();
        let key = ResourceKey::new(ResourceType::PowerItem, "op-1");
        backend
            .create(&key, document(json!({"version": "1.0.0", "storage": {"count": 1}})))
            .await
            .unwrap();

        let upserted = backend
            .upsert_migrated(&key, "2.0.0", Document::new(), Some(json!({"total": 1})))
            .await
            .unwrap();

        assert_eq!(upserted.saved_version.as_deref(), Some("1.0.0"));
        assert_eq!(upserted.record["version"], json!("2.0.0"));
        assert_eq!(upserted.record["storage"], json!({"total": 1}));
        assert_eq!(backend.get(&key).await.unwrap().unwrap(), upserted.record);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path().join("store.json")).await.unwrap();

        let result = backend
            .set_storage(&ResourceKey::new(ResourceType::Page, "p-1"), json!({}))
            .await;

        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_on_top_level_fields() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::open(dir.path().join("store.json")).await.unwrap();
        for (inst, user) in [("i-1", "a"), ("i-1", "b"), ("i-2", "a")] {
            backend
                .create(
                    &ResourceKey::user(inst, user),
                    document(json!({"installation": inst, "user": user})),
                )
                .await
                .unwrap();
        }

        let found = backend
            .list(ResourceType::User, &document(json!({"installation": "i-1"})))
            .await
            .unwrap();

        let ids: Vec<_> = found.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("i-1:a"), json!("i-1:b")]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = FileBackend::open(&path).await;

        assert!(matches!(
            result,
            Err(StorageError::FileDeserialization { .. })
        ));
    }
}

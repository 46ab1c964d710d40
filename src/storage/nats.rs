// Copyright (c) 2025 - Cowboy AI, Inc.
//! Replicated document store on a NATS JetStream key-value bucket
//!
//! Each record is one JSON value under the key
//! `<collection>.<encoded identity>`. Identities are escaped so any string
//! is a valid key: bytes outside `[A-Za-z0-9_-]` become `=XX` (uppercase hex).
//!
//! Mutations are optimistic: read the entry with its revision, apply the
//! change in memory, then write back only if the revision is unchanged,
//! retrying on conflict. Together with the process-local resource locks this
//! keeps operator semantics identical to [`FileBackend`](super::FileBackend).

use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    apply_to_record, matches_filter, merge_changes, prepare_new_record, replace_storage,
    StorageBackend, StorageError, StorageOperation, StorageResult,
};
use crate::model::{Document, ResourceKey, ResourceType};

/// Compare-and-swap attempts before a mutation gives up
const MAX_UPDATE_ATTEMPTS: usize = 16;

/// Configuration for the resource bucket
#[derive(Debug, Clone)]
pub struct KvStoreConfig {
    /// Bucket name
    pub bucket: String,

    /// Revisions kept per key
    pub history: i64,

    /// Number of replicas (for clustered NATS)
    pub replicas: usize,

    /// Storage type (File or Memory)
    pub storage: StorageType,
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            bucket: "POWERAPP_RESOURCES".to_string(),
            history: 5,
            replicas: 1,
            storage: StorageType::File,
        }
    }
}

/// Storage type for the bucket's backing stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// File-based storage (persistent across restarts)
    File,
    /// Memory-based storage (faster, but lost on restart)
    Memory,
}

impl From<StorageType> for jetstream::stream::StorageType {
    fn from(storage: StorageType) -> Self {
        match storage {
            StorageType::File => jetstream::stream::StorageType::File,
            StorageType::Memory => jetstream::stream::StorageType::Memory,
        }
    }
}

/// JetStream key-value implementation of [`StorageBackend`]
pub struct NatsKvBackend {
    kv: kv::Store,
    config: KvStoreConfig,
}

impl NatsKvBackend {
    /// Bind to the configured bucket, creating it when missing
    pub async fn connect(
        jetstream: jetstream::Context,
        config: KvStoreConfig,
    ) -> StorageResult<Self> {
        let kv = match jetstream.get_key_value(&config.bucket).await {
            Ok(kv) => kv,
            Err(_) => jetstream
                .create_key_value(kv::Config {
                    bucket: config.bucket.clone(),
                    history: config.history,
                    num_replicas: config.replicas,
                    storage: config.storage.into(),
                    ..Default::default()
                })
                .await
                .map_err(|e| StorageError::KvStore(e.to_string()))?,
        };

        info!(bucket = %config.bucket, replicas = config.replicas, "resource bucket ready");
        Ok(Self { kv, config })
    }

    pub fn config(&self) -> &KvStoreConfig {
        &self.config
    }

    /// Current record and its revision; deleted or purged keys read as absent
    async fn entry(&self, key: &str) -> StorageResult<Option<(Document, u64)>> {
        let entry = self
            .kv
            .entry(key)
            .await
            .map_err(|e| StorageError::KvStore(e.to_string()))?;

        match entry {
            Some(entry) if entry.operation == kv::Operation::Put => {
                let record = decode_record(&entry.value)?;
                Ok(Some((record, entry.revision)))
            }
            _ => Ok(None),
        }
    }

    /// Optimistic read-modify-write of one record
    async fn mutate<T>(
        &self,
        key: &ResourceKey,
        change: impl Fn(&mut Document) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let kv_key = encode_key(key)?;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let (mut record, revision) = self
                .entry(&kv_key)
                .await?
                .ok_or_else(|| StorageError::not_found(key))?;

            let result = change(&mut record)?;
            let bytes = encode_record(&record)?;

            match self.kv.update(&kv_key, bytes.into(), revision).await {
                Ok(_) => {
                    debug!(resource = %key, revision, "record written");
                    return Ok(result);
                }
                Err(e) => {
                    debug!(resource = %key, attempt, error = %e, "revision moved, retrying");
                }
            }
        }

        warn!(resource = %key, "giving up after repeated write conflicts");
        Err(StorageError::Conflict {
            key: kv_key,
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }
}

#[async_trait]
impl StorageBackend for NatsKvBackend {
    async fn get(&self, key: &ResourceKey) -> StorageResult<Option<Document>> {
        let kv_key = encode_key(key)?;
        Ok(self.entry(&kv_key).await?.map(|(record, _)| record))
    }

    async fn list(
        &self,
        resource_type: ResourceType,
        filter: &Document,
    ) -> StorageResult<Vec<Document>> {
        let prefix = format!("{}.", resource_type.collection());
        let keys: Vec<String> = self
            .kv
            .keys()
            .await
            .map_err(|e| StorageError::KvStore(e.to_string()))?
            .try_filter(|key| futures::future::ready(key.starts_with(&prefix)))
            .try_collect()
            .await
            .map_err(|e| StorageError::KvStore(e.to_string()))?;

        let mut records = Vec::new();
        for key in keys {
            if let Some((record, _)) = self.entry(&key).await? {
                if matches_filter(&record, filter) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    async fn create(&self, key: &ResourceKey, document: Document) -> StorageResult<Document> {
        let kv_key = encode_key(key)?;
        let record = prepare_new_record(key, document);
        let bytes = encode_record(&record)?;

        // revision 0 only succeeds while the key has never been written
        if let Err(e) = self.kv.update(&kv_key, bytes.clone().into(), 0).await {
            let previous = self
                .kv
                .entry(&kv_key)
                .await
                .map_err(|e| StorageError::KvStore(e.to_string()))?;
            match previous {
                Some(entry) if entry.operation == kv::Operation::Put => {
                    return Err(StorageError::already_exists(key));
                }
                // deleted or purged: write over the tombstone's revision
                Some(entry) => {
                    self.kv
                        .update(&kv_key, bytes.into(), entry.revision)
                        .await
                        .map_err(|_| StorageError::already_exists(key))?;
                }
                None => return Err(StorageError::KvStore(e.to_string())),
            }
        }

        debug!(resource = %key, "record created");
        Ok(record)
    }

    async fn update(&self, key: &ResourceKey, changes: Document) -> StorageResult<Document> {
        self.mutate(key, |record| {
            merge_changes(record, changes.clone());
            Ok(record.clone())
        })
        .await
    }

    async fn set_storage(&self, key: &ResourceKey, storage: Value) -> StorageResult<Value> {
        self.mutate(key, |record| {
            replace_storage(record, storage.clone());
            Ok(storage.clone())
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

/// Bucket key of a resource: `<collection>.<escaped identity>`
pub fn encode_key(key: &ResourceKey) -> StorageResult<String> {
    if key.identity.is_empty() {
        return Err(StorageError::InvalidIdentity {
            resource_type: key.resource_type,
            reason: "identity is empty".to_string(),
        });
    }

    let mut encoded = String::with_capacity(key.resource_type.collection().len() + key.identity.len() + 1);
    encoded.push_str(key.resource_type.collection());
    encoded.push('.');
    for byte in key.identity.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("={byte:02X}"));
        }
    }
    Ok(encoded)
}

fn encode_record(record: &Document) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_record(bytes: &[u8]) -> StorageResult<Document> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

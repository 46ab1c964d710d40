// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Storage
//!
//! Durable CRUD and atomic mutation of resource records.
//!
//! # Architecture
//!
//! ```text
//! EventHandler ──upsert──▶ StorageBackend ◀──apply── ActionStorage ◀── handler code
//!                              │                          │
//!                    ┌─────────┴─────────┐          ResourceLocks
//!                    ▼                   ▼        ("<type>:<identity>")
//!              NatsKvBackend        FileBackend
//!         (replicated JetStream    (JSON file, one
//!            key-value bucket)      array per type)
//! ```
//!
//! Both backends share the operator semantics in [`operation`], so a caller
//! cannot tell them apart.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::{
    build_secure_update_data, version_of, Document, ResourceKey, ResourceType,
    CREATED_AT_FIELD, STORAGE_FIELD, TYPE_FIELD, UPDATED_AT_FIELD, VERSION_FIELD,
};

pub mod action;
pub mod file;
pub mod lock;
pub mod nats;
pub mod operation;

pub use action::ActionStorage;
pub use file::FileBackend;
pub use lock::{ResourceGuard, ResourceLocks};
pub use nats::{KvStoreConfig, NatsKvBackend, StorageType};
pub use operation::{apply_operation, StorageOperation};

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error in the file backend
    #[error("I/O error at {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File contents could not be parsed
    #[error("deserialization error at {path}: {message}")]
    FileDeserialization { path: PathBuf, message: String },

    /// Key-value bucket error
    #[error("key-value store error: {0}")]
    KvStore(String),

    /// Optimistic update kept losing the race
    #[error("concurrent modification of {key} after {attempts} attempts")]
    Conflict { key: String, attempts: usize },

    /// Record (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Update targeted a record that does not exist
    #[error("{resource_type} not found: {identity}")]
    NotFound {
        resource_type: ResourceType,
        identity: String,
    },

    /// Create targeted a record that already exists
    #[error("{resource_type} already exists: {identity}")]
    AlreadyExists {
        resource_type: ResourceType,
        identity: String,
    },

    /// Identity cannot be used as a key
    #[error("invalid identity for {resource_type}: {reason}")]
    InvalidIdentity {
        resource_type: ResourceType,
        reason: String,
    },

    /// Malformed field path
    #[error("invalid storage path '{0}'")]
    InvalidPath(String),

    /// Operator applied to a value of the wrong shape
    #[error("storage path '{path}' holds a value that is not {expected}")]
    TypeMismatch { path: String, expected: &'static str },
}

impl StorageError {
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(key: &ResourceKey) -> Self {
        Self::NotFound {
            resource_type: key.resource_type,
            identity: key.identity.clone(),
        }
    }

    pub fn already_exists(key: &ResourceKey) -> Self {
        Self::AlreadyExists {
            resource_type: key.resource_type,
            identity: key.identity.clone(),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of [`StorageBackend::upsert`]
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    /// The record as stored after the upsert
    pub record: Document,
    /// `version` before the upsert; `None` when the record was created
    pub saved_version: Option<String>,
}

/// Storage backend for resource records
///
/// Implementations must be observably identical: same operator semantics,
/// same errors for missing records, same system fields on create.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch one record
    async fn get(&self, key: &ResourceKey) -> StorageResult<Option<Document>>;

    /// List records of a type whose top-level fields equal every field of `filter`
    async fn list(
        &self,
        resource_type: ResourceType,
        filter: &Document,
    ) -> StorageResult<Vec<Document>>;

    /// Insert a new record; fails with `AlreadyExists` if the identity is taken
    async fn create(&self, key: &ResourceKey, document: Document) -> StorageResult<Document>;

    /// Merge top-level `changes` into an existing record
    async fn update(&self, key: &ResourceKey, changes: Document) -> StorageResult<Document>;

    /// Replace the whole storage blob, returning it
    async fn set_storage(&self, key: &ResourceKey, storage: Value) -> StorageResult<Value>;

    /// Apply one atomic operator to the storage blob, returning the new blob
    async fn apply(&self, key: &ResourceKey, operation: &StorageOperation)
        -> StorageResult<Value>;

    /// Create the record, or merge allow-listed fields of `document` and bump
    /// `version` when it already exists.
    async fn upsert(
        &self,
        key: &ResourceKey,
        version: &str,
        document: Document,
    ) -> StorageResult<Upserted> {
        self.upsert_migrated(key, version, document, None).await
    }

    /// [`upsert`](Self::upsert) that also replaces the storage blob.
    ///
    /// The version bump and `storage` land in one write, so a record never
    /// carries a new `version` over a blob of the old shape.
    async fn upsert_migrated(
        &self,
        key: &ResourceKey,
        version: &str,
        mut document: Document,
        storage: Option<Value>,
    ) -> StorageResult<Upserted> {
        match self.get(key).await? {
            Some(existing) => {
                let saved_version = version_of(&existing).map(str::to_string);
                let mut changes =
                    build_secure_update_data(key.resource_type, version, &document);
                if let Some(storage) = storage {
                    changes.insert(STORAGE_FIELD.to_string(), storage);
                }
                let record = self.update(key, changes).await?;
                Ok(Upserted {
                    record,
                    saved_version,
                })
            }
            None => {
                document.insert(VERSION_FIELD.to_string(), Value::String(version.to_string()));
                if let Some(storage) = storage {
                    document.insert(STORAGE_FIELD.to_string(), storage);
                }
                let record = self.create(key, document).await?;
                Ok(Upserted {
                    record,
                    saved_version: None,
                })
            }
        }
    }
}

/// Stamp system fields onto a record about to be created
pub(crate) fn prepare_new_record(key: &ResourceKey, mut document: Document) -> Document {
    let now = Value::String(Utc::now().to_rfc3339());
    document.insert(
        TYPE_FIELD.to_string(),
        Value::String(key.resource_type.as_str().to_string()),
    );
    document.insert(
        key.resource_type.identity_field().to_string(),
        Value::String(key.identity.clone()),
    );
    document.insert(CREATED_AT_FIELD.to_string(), now.clone());
    document.insert(UPDATED_AT_FIELD.to_string(), now);
    document
}

/// Merge `changes` into `record` and refresh `updatedAt`
pub(crate) fn merge_changes(record: &mut Document, changes: Document) {
    for (field, value) in changes {
        record.insert(field, value);
    }
    touch(record);
}

pub(crate) fn touch(record: &mut Document) {
    record.insert(
        UPDATED_AT_FIELD.to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
}

/// Run `operation` against the storage blob held in `record`
pub(crate) fn apply_to_record(
    record: &mut Document,
    operation: &StorageOperation,
) -> StorageResult<Value> {
    let mut storage = record.remove(STORAGE_FIELD).unwrap_or(Value::Null);
    let result = apply_operation(&mut storage, operation);
    if !storage.is_null() {
        record.insert(STORAGE_FIELD.to_string(), storage.clone());
    }
    result?;
    touch(record);
    Ok(storage)
}

/// Replace the storage blob held in `record`
pub(crate) fn replace_storage(record: &mut Document, storage: Value) {
    record.insert(STORAGE_FIELD.to_string(), storage);
    touch(record);
}

/// Whether every field of `filter` equals the same field of `record`
pub(crate) fn matches_filter(record: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| record.get(field) == Some(expected))
}

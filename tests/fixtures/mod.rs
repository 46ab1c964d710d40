// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for powerapp-sdk
//!
//! Deterministic envelopes, an in-memory platform API and a recording
//! logger. Every test gets its own file store in a temporary directory.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use powerapp_sdk::api::{ApiError, Credential, PlatformApi, PlatformApiFactory};
use powerapp_sdk::logging::{LogLevel, Logger};
use powerapp_sdk::model::{Document, ResourceKey, ResourceType};
use powerapp_sdk::storage::{StorageError, StorageOperation, StorageResult};
use powerapp_sdk::{FileBackend, PowerApp, PowerAppBuilder, StorageBackend};

pub const INSTALLATION_ID: &str = "inst-0001";
pub const ACCESS_TOKEN: &str = "access-0001";
pub const OPERATION_TOKEN: &str = "op-0001";
pub const GLANCE_TOKEN: &str = "glance-0001";
pub const PAGE_ID: &str = "page-req-0001";
pub const PLATFORM_URL: &str = "https://platform.test";
pub const SHARED_SECRET: &str = "shared-secret";

/// `source` block for `version`
pub fn source(version: &str) -> Value {
    json!({
        "token": SHARED_SECRET,
        "url": PLATFORM_URL,
        "installation": INSTALLATION_ID,
        "organization": {"id": "org-1", "name": "Acme"},
        "version": version,
    })
}

pub fn installation_event(version: &str, users: &[&str]) -> Value {
    json!({
        "source": source(version),
        "configs": {"currency": "EUR"},
        "resources": {"tags": {"approved": "tag-1"}, "procedures": {}},
        "users": users,
        "accessToken": ACCESS_TOKEN,
    })
}

pub fn operation_event(version: &str) -> Value {
    json!({
        "source": source(version),
        "token": OPERATION_TOKEN,
        "inputs": {"amount": 10},
    })
}

pub fn glance_event(version: &str, clock: u64) -> Value {
    json!({
        "source": source(version),
        "token": GLANCE_TOKEN,
        "clock": clock,
        "resources": {"tasks": [clock]},
        "configs": {"limit": 5},
    })
}

pub fn page_event(version: &str, user: Option<&str>) -> Value {
    let mut event = json!({
        "source": source(version),
        "id": PAGE_ID,
        "query": {"page": 1},
    });
    if let Some(user) = user {
        event["user"] = json!(user);
    }
    event
}

/// Captures every log line for assertions
#[derive(Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<(LogLevel, String, Vec<(String, String)>)>>,
}

impl RecordingLogger {
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .map(|(_, message, _)| message.clone())
            .collect()
    }

    pub fn field(&self, message: &str, field: &str) -> Option<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m, _)| m == message)
            .flat_map(|(_, _, fields)| fields.iter())
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.clone())
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str, fields: &[(&str, String)]) {
        self.lines.lock().unwrap().push((
            level,
            message.to_string(),
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));
    }
}

/// Platform stand-in: records calls and answers glance reinitialization
#[derive(Default)]
pub struct MockPlatform {
    /// `(path, credential)` of every call
    pub calls: Mutex<Vec<(String, Credential)>>,
    /// Credentials of every client created
    pub clients: Mutex<Vec<(Option<String>, Credential)>>,
    /// Snapshot returned by `/power-glance/initialize`; `None` fails the call
    pub glance: Mutex<Option<Value>>,
}

impl MockPlatform {
    pub fn with_glance(snapshot: Value) -> Arc<Self> {
        Arc::new(Self {
            glance: Mutex::new(Some(snapshot)),
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

struct MockClient {
    platform: Arc<MockPlatform>,
    credential: Credential,
}

#[async_trait]
impl PlatformApi for MockClient {
    fn credential(&self) -> &Credential {
        &self.credential
    }

    async fn call(&self, path: &str, _body: Value) -> Result<Value, ApiError> {
        self.platform
            .calls
            .lock()
            .unwrap()
            .push((path.to_string(), self.credential.clone()));

        match path {
            "/power-glance/initialize" => self
                .platform
                .glance
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ApiError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
            _ => Ok(json!({})),
        }
    }
}

pub struct MockPlatformFactory(pub Arc<MockPlatform>);

impl PlatformApiFactory for MockPlatformFactory {
    fn create(&self, base_url: Option<&str>, credential: Credential) -> Arc<dyn PlatformApi> {
        self.0
            .clients
            .lock()
            .unwrap()
            .push((base_url.map(str::to_string), credential.clone()));
        Arc::new(MockClient {
            platform: Arc::clone(&self.0),
            credential,
        })
    }
}

/// A file store in a fresh temporary directory
pub async fn file_store() -> (TempDir, Arc<FileBackend>) {
    let dir = TempDir::new().unwrap();
    let backend = FileBackend::open(dir.path().join("store.json")).await.unwrap();
    (dir, Arc::new(backend))
}

/// Builder wired to `backend`, `platform` and `logger`
pub fn app_builder(
    backend: Arc<FileBackend>,
    platform: Arc<MockPlatform>,
    logger: Arc<RecordingLogger>,
) -> PowerAppBuilder {
    PowerApp::builder()
        .backend(backend as Arc<dyn StorageBackend>)
        .api_factory(Arc::new(MockPlatformFactory(platform)))
        .logger(logger)
}

/// File store whose next record write fails once when armed
pub struct FlakyBackend {
    inner: Arc<FileBackend>,
    fail_next_write: AtomicBool,
}

impl FlakyBackend {
    pub fn new(inner: Arc<FileBackend>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_next_write: AtomicBool::new(false),
        })
    }

    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StorageError::KvStore("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    async fn get(&self, key: &ResourceKey) -> StorageResult<Option<Document>> {
        self.inner.get(key).await
    }

    async fn list(
        &self,
        resource_type: ResourceType,
        filter: &Document,
    ) -> StorageResult<Vec<Document>> {
        self.inner.list(resource_type, filter).await
    }

    async fn create(&self, key: &ResourceKey, document: Document) -> StorageResult<Document> {
        self.check()?;
        self.inner.create(key, document).await
    }

    async fn update(&self, key: &ResourceKey, changes: Document) -> StorageResult<Document> {
        self.check()?;
        self.inner.update(key, changes).await
    }

    async fn set_storage(&self, key: &ResourceKey, storage: Value) -> StorageResult<Value> {
        self.check()?;
        self.inner.set_storage(key, storage).await
    }

    async fn apply(
        &self,
        key: &ResourceKey,
        operation: &StorageOperation,
    ) -> StorageResult<Value> {
        self.check()?;
        self.inner.apply(key, operation).await
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Runtime configuration
//!
//! | variable                  | default                 |
//! |---------------------------|-------------------------|
//! | `POWERAPP_TOKEN`          | unset (no auth check)   |
//! | `POWERAPP_STORAGE`        | `file`                  |
//! | `POWERAPP_STORAGE_PATH`   | `powerapp-store.json`   |
//! | `NATS_URL`                | `nats://localhost:4222` |
//! | `POWERAPP_KV_BUCKET`      | `POWERAPP_RESOURCES`    |
//! | `POWERAPP_KV_REPLICAS`    | `1`                     |
//! | `POWERAPP_API_URL`        | unset (use `source.url`)|
//! | `POWERAPP_SUBJECT_PREFIX` | `powerapp`              |

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::nats::{NatsClient, NatsConfig};
use crate::storage::{FileBackend, KvStoreConfig, NatsKvBackend, StorageBackend};
use crate::transport::DEFAULT_SUBJECT_PREFIX;

/// Which storage backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// Local JSON file
    #[default]
    File,
    /// NATS JetStream key-value bucket
    Nats,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "nats" | "kv" => Ok(StorageKind::Nats),
            other => bail!("unknown storage backend '{other}' (expected 'file' or 'nats')"),
        }
    }
}

/// SDK configuration
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Shared secret expected in `source.token`
    pub token: Option<String>,
    pub storage: StorageKind,
    /// File store location
    pub storage_path: PathBuf,
    pub nats: NatsConfig,
    pub kv: KvStoreConfig,
    /// Platform base URL; overrides `source.url` when set
    pub api_url: Option<String>,
    /// Transport subject prefix
    pub subject_prefix: String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            token: None,
            storage: StorageKind::File,
            storage_path: PathBuf::from("powerapp-store.json"),
            nats: NatsConfig::default(),
            kv: KvStoreConfig::default(),
            api_url: None,
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
        }
    }
}

impl SdkConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let storage = match var("POWERAPP_STORAGE") {
            Some(value) => value
                .parse::<StorageKind>()
                .context("POWERAPP_STORAGE is invalid")?,
            None => defaults.storage,
        };

        let mut nats = defaults.nats;
        if let Some(url) = var("NATS_URL") {
            nats.servers = url.split(',').map(|s| s.trim().to_string()).collect();
        }

        let mut kv = defaults.kv;
        if let Some(bucket) = var("POWERAPP_KV_BUCKET") {
            kv.bucket = bucket;
        }
        if let Some(replicas) = var("POWERAPP_KV_REPLICAS") {
            kv.replicas = replicas
                .parse()
                .with_context(|| format!("POWERAPP_KV_REPLICAS is not a number: {replicas}"))?;
        }

        Ok(Self {
            token: var("POWERAPP_TOKEN"),
            storage,
            storage_path: var("POWERAPP_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            nats,
            kv,
            api_url: var("POWERAPP_API_URL"),
            subject_prefix: var("POWERAPP_SUBJECT_PREFIX").unwrap_or(defaults.subject_prefix),
        })
    }

    /// Open the configured storage backend
    pub async fn open_backend(&self) -> Result<Arc<dyn StorageBackend>> {
        match self.storage {
            StorageKind::File => {
                let backend = FileBackend::open(&self.storage_path)
                    .await
                    .with_context(|| {
                        format!("Failed to open file store {}", self.storage_path.display())
                    })?;
                info!(path = %self.storage_path.display(), "file store opened");
                Ok(Arc::new(backend))
            }
            StorageKind::Nats => {
                let client = NatsClient::connect(&self.nats)
                    .await
                    .context("Failed to connect to NATS")?;
                let backend = NatsKvBackend::connect(client.jetstream(), self.kv.clone())
                    .await
                    .context("Failed to open key-value bucket")?;
                Ok(Arc::new(backend))
            }
        }
    }

    /// Platform client settings derived from this configuration
    #[cfg(feature = "http")]
    pub fn http_api(&self) -> crate::api::HttpApiConfig {
        crate::api::HttpApiConfig {
            base_url: self.api_url.clone(),
            ..Default::default()
        }
    }
}

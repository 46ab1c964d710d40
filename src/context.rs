// Copyright (c) 2025 - Cowboy AI, Inc.
//! Handler contexts
//!
//! Everything author code receives besides the event payload: a platform
//! client bound to the right credential, the resource's [`ActionStorage`],
//! the installation-level `configs`, and per-type extras.
//!
//! | event          | credential            | extras                          |
//! |----------------|-----------------------|---------------------------------|
//! | installation   | access token          | `users`, `resources`            |
//! | power-item/... | operation token       |                                 |
//! | power-glance   | operation token       | glance `configs`                |
//! | page           | access token          | named user's storage (or one    |
//! |                |                       | context per installation user)  |
//! | data/field src | access token          |                                 |

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::api::{Credential, PlatformApi, PlatformApiFactory};
use crate::event::Source;
use crate::model::resources::{from_document, to_document};
use crate::model::{
    storage_of, InstallationModel, InstallationResources, PlatformUser, ResourceKey, UserModel,
};
use crate::storage::{ActionStorage, ResourceLocks, StorageBackend, StorageResult};

/// Context for `installation/*` handlers
#[derive(Clone)]
pub struct InstallationContext {
    pub api: Arc<dyn PlatformApi>,
    pub storage: ActionStorage,
    pub configs: Map<String, Value>,
    pub users: Vec<PlatformUser>,
    pub resources: InstallationResources,
}

/// Context for power-item, power-node and custom-checkable-item handlers
#[derive(Clone)]
pub struct OperationContext {
    pub api: Arc<dyn PlatformApi>,
    pub storage: ActionStorage,
    pub configs: Map<String, Value>,
}

/// Context for `power-glance/*` handlers
#[derive(Clone)]
pub struct PowerGlanceContext {
    pub api: Arc<dyn PlatformApi>,
    pub storage: ActionStorage,
    /// Installation-level configs
    pub configs: Map<String, Value>,
    /// The glance's own configs
    pub glance_configs: Map<String, Value>,
}

/// One platform user's own storage within an installation
#[derive(Clone)]
pub struct UserContext {
    pub user: PlatformUser,
    pub storage: ActionStorage,
}

/// Context for `page/*` handlers
#[derive(Clone)]
pub struct PageContext {
    pub api: Arc<dyn PlatformApi>,
    pub storage: ActionStorage,
    pub configs: Map<String, Value>,
    pub user: Option<UserContext>,
}

/// Context for data-source and field-source handlers
#[derive(Clone)]
pub struct SourceContext {
    pub api: Arc<dyn PlatformApi>,
    pub configs: Map<String, Value>,
}

/// Assembles handler contexts from stored records
#[derive(Clone)]
pub struct ContextBuilder {
    backend: Arc<dyn StorageBackend>,
    locks: ResourceLocks,
    api_factory: Arc<dyn PlatformApiFactory>,
}

impl ContextBuilder {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        locks: ResourceLocks,
        api_factory: Arc<dyn PlatformApiFactory>,
    ) -> Self {
        Self {
            backend,
            locks,
            api_factory,
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.locks
    }

    /// Storage façade over `key`, seeded with the blob just persisted
    pub fn storage_for(&self, key: ResourceKey, storage: Value) -> ActionStorage {
        ActionStorage::new(Arc::clone(&self.backend), self.locks.clone(), key, storage)
    }

    /// Platform client for `source` bound to `credential`
    pub fn api_for(&self, source: &Source, credential: Credential) -> Arc<dyn PlatformApi> {
        self.api_factory.create(source.url.as_deref(), credential)
    }

    /// Stored installation record, if the installation is known
    pub async fn installation(&self, installation: Option<&str>) -> StorageResult<Option<InstallationModel>> {
        let Some(installation) = installation else {
            return Ok(None);
        };

        match self.backend.get(&ResourceKey::installation(installation)).await? {
            Some(record) => Ok(Some(from_document(record)?)),
            None => Ok(None),
        }
    }

    pub fn build_installation_context(
        &self,
        source: &Source,
        record: &InstallationModel,
    ) -> InstallationContext {
        InstallationContext {
            api: self.api_for(source, access_credential(Some(record))),
            storage: self.storage_for(record.key(), record.storage.clone().unwrap_or(Value::Null)),
            configs: record.configs.clone(),
            users: record.users.clone(),
            resources: record.resources.clone(),
        }
    }

    pub async fn build_operation_context(
        &self,
        source: &Source,
        key: ResourceKey,
        storage: Value,
    ) -> StorageResult<OperationContext> {
        let installation = self.installation(source.installation_id()).await?;
        let credential = Credential::Operation(key.identity.clone());

        Ok(OperationContext {
            api: self.api_for(source, credential),
            storage: self.storage_for(key, storage),
            configs: installation.map(|i| i.configs).unwrap_or_default(),
        })
    }

    pub async fn build_power_glance_context(
        &self,
        source: &Source,
        key: ResourceKey,
        storage: Value,
        glance_configs: Map<String, Value>,
    ) -> StorageResult<PowerGlanceContext> {
        let installation = self.installation(source.installation_id()).await?;
        let credential = Credential::Operation(key.identity.clone());

        Ok(PowerGlanceContext {
            api: self.api_for(source, credential),
            storage: self.storage_for(key, storage),
            configs: installation.map(|i| i.configs).unwrap_or_default(),
            glance_configs,
        })
    }

    /// One page context, with the named user's storage when there is one
    pub async fn build_page_context(
        &self,
        source: &Source,
        key: ResourceKey,
        storage: Value,
        user: Option<&PlatformUser>,
        version: &str,
    ) -> StorageResult<PageContext> {
        let installation = self.installation(source.installation_id()).await?;
        self.page_context(source, installation.as_ref(), key, storage, user, version)
            .await
    }

    /// One page context per user of the installation (none without users)
    pub async fn build_page_contexts(
        &self,
        source: &Source,
        key: ResourceKey,
        storage: Value,
        version: &str,
    ) -> StorageResult<Vec<PageContext>> {
        let installation = self.installation(source.installation_id()).await?;
        let users = installation
            .as_ref()
            .map(|i| i.users.clone())
            .unwrap_or_default();

        let mut contexts = Vec::with_capacity(users.len());
        for user in &users {
            contexts.push(
                self.page_context(
                    source,
                    installation.as_ref(),
                    key.clone(),
                    storage.clone(),
                    Some(user),
                    version,
                )
                .await?,
            );
        }
        Ok(contexts)
    }

    pub async fn build_source_context(&self, source: &Source) -> StorageResult<SourceContext> {
        let installation = self.installation(source.installation_id()).await?;
        Ok(SourceContext {
            api: self.api_for(source, access_credential(installation.as_ref())),
            configs: installation.map(|i| i.configs).unwrap_or_default(),
        })
    }

    /// Fetch the user's record in `installation`, creating it on first sight.
    ///
    /// User storage is stamped with the page's version but never migrated.
    pub async fn user_context(
        &self,
        installation: &str,
        user: &PlatformUser,
        version: &str,
    ) -> StorageResult<UserContext> {
        let model = UserModel::new(installation, user);
        let key = model.key();

        let upserted = {
            let _guard = self.locks.acquire(&key).await;
            self.backend
                .upsert(&key, version, to_document(&model)?)
                .await?
        };

        if upserted.saved_version.is_none() {
            debug!(resource = %key, "user record created");
        }

        Ok(UserContext {
            user: user.clone(),
            storage: self.storage_for(key, storage_of(&upserted.record)),
        })
    }

    async fn page_context(
        &self,
        source: &Source,
        installation: Option<&InstallationModel>,
        key: ResourceKey,
        storage: Value,
        user: Option<&PlatformUser>,
        version: &str,
    ) -> StorageResult<PageContext> {
        let installation_id = installation
            .map(|i| i.installation.as_str())
            .or_else(|| source.installation_id());

        let user = match (user, installation_id) {
            (Some(user), Some(installation_id)) => {
                Some(self.user_context(installation_id, user, version).await?)
            }
            _ => None,
        };

        Ok(PageContext {
            api: self.api_for(source, access_credential(installation)),
            storage: self.storage_for(key, storage),
            configs: installation.map(|i| i.configs.clone()).unwrap_or_default(),
            user,
        })
    }
}

fn access_credential(installation: Option<&InstallationModel>) -> Credential {
    installation
        .and_then(|i| i.access_token.clone())
        .map(Credential::Access)
        .unwrap_or(Credential::Anonymous)
}

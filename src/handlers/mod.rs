// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Handlers
//!
//! [`PowerApp`] is the entry point transport shims call. It owns the version
//! registry, the route table, the storage backend and the context builder,
//! and runs every event through the same pipeline:
//!
//! ```text
//! route ──▶ route table ──▶ parse + normalize source
//!                                  │
//!              ┌── lock "<type>:<identity>" ─────────────────────┐
//!              │ get record ─▶ resolve(coming, saved)            │
//!              │   ─▶ (glance gap check) ─▶ run migrations       │
//!              │   ─▶ upsert + set_storage                       │
//!              └─────────────────────────────────────────────────┘
//!                                  │
//!                     build context ─▶ author handler ─▶ response
//! ```
//!
//! Resolution and migration run before anything is written, so a failed
//! migration or an unmatched version leaves the stored record untouched.
//! Every failure is logged with an event id and answered with `{}`.

use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::PlatformApiFactory;
use crate::context::ContextBuilder;
use crate::definition::PowerAppDefinition;
use crate::errors::{PowerAppError, PowerAppResult};
use crate::event::Source;
use crate::logging::{LogLevel, Logger, TracingLogger};
use crate::model::{storage_of, version_of, Document, ResourceKey};
use crate::route::Route;
use crate::storage::{ResourceGuard, ResourceLocks, StorageBackend};
use crate::version::{
    parse_version, MigrationChain, MigrationDirection, MigrationStep, Version, VersionRegistry,
};

mod installation;
mod operation;
mod page;
mod power_glance;
mod source;

/// A resource locked and resolved, with nothing written yet
pub(crate) struct Prepared<H> {
    guard: ResourceGuard,
    key: ResourceKey,
    version: String,
    existing: Option<Document>,
    handler: Option<H>,
    migrations: MigrationChain,
}

impl<H> Prepared<H> {
    pub(crate) fn existing(&self) -> Option<&Document> {
        self.existing.as_ref()
    }
}

/// A resource after its record was written
pub(crate) struct Committed<H> {
    pub record: Document,
    pub storage: Value,
    pub handler: Option<H>,
}

/// Versioned power-app event dispatcher
pub struct PowerApp {
    registry: VersionRegistry<PowerAppDefinition>,
    routes: HashSet<Route>,
    contexts: ContextBuilder,
    logger: Arc<dyn Logger>,
}

impl PowerApp {
    pub fn builder() -> PowerAppBuilder {
        PowerAppBuilder::default()
    }

    pub fn registry(&self) -> &VersionRegistry<PowerAppDefinition> {
        &self.registry
    }

    /// Whether any registered version handles `route`
    pub fn has_route(&self, route: &Route) -> bool {
        self.routes.contains(route)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        self.contexts.backend()
    }

    pub fn locks(&self) -> &ResourceLocks {
        self.contexts.locks()
    }

    /// Handle one event; never fails, answering `{}` when nothing applies
    pub async fn handle(&self, route: &Route, event: Value) -> Value {
        let event_id = Uuid::now_v7().to_string();

        if !self.routes.contains(route) {
            self.logger.log(
                LogLevel::Warn,
                "no handler registered for route",
                &[("event_id", event_id), ("route", route.to_string())],
            );
            return json!({});
        }

        self.logger.log(
            LogLevel::Debug,
            "event received",
            &[("event_id", event_id.clone()), ("route", route.to_string())],
        );

        match self.dispatch(route, event).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.log(
                    LogLevel::Error,
                    "event failed",
                    &[
                        ("event_id", event_id),
                        ("route", route.to_string()),
                        ("error", e.to_string()),
                    ],
                );
                json!({})
            }
        }
    }

    /// Like [`PowerApp::handle`], for routes in their canonical string form
    pub async fn handle_str(&self, route: &str, event: Value) -> Value {
        match route.parse::<Route>() {
            Ok(route) => self.handle(&route, event).await,
            Err(e) => {
                self.logger.log(
                    LogLevel::Warn,
                    "malformed route",
                    &[("route", route.to_string()), ("error", e.to_string())],
                );
                json!({})
            }
        }
    }

    async fn dispatch(&self, route: &Route, event: Value) -> PowerAppResult<Value> {
        match route {
            Route::Installation(change) => self.handle_installation(route, *change, event).await,
            Route::Operation { kind, name, change } => {
                self.handle_operation(route, *kind, name, change, event).await
            }
            Route::PowerGlance { name, change } => {
                self.handle_power_glance(route, name, *change, event).await
            }
            Route::Request { kind, name } => self.handle_request(route, *kind, name, event).await,
        }
    }

    pub(crate) fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    pub(crate) fn contexts(&self) -> &ContextBuilder {
        &self.contexts
    }

    /// Incoming version, or `None` (logged) when the event carries none
    pub(crate) fn coming_version(
        &self,
        route: &Route,
        source: &Source,
    ) -> PowerAppResult<Option<(String, Version)>> {
        match source.version.as_deref() {
            Some(raw) => Ok(Some((raw.to_string(), parse_version(raw)?))),
            None => {
                self.logger.log(
                    LogLevel::Info,
                    "event without version dropped",
                    &[("route", route.to_string())],
                );
                Ok(None)
            }
        }
    }

    /// Lock `key`, read its record and resolve the handler and migrations.
    ///
    /// `None` means the event carries no version and is dropped.
    pub(crate) async fn prepare<H>(
        &self,
        route: &Route,
        source: &Source,
        key: ResourceKey,
        pick: impl FnOnce(&PowerAppDefinition) -> Option<H>,
    ) -> PowerAppResult<Option<Prepared<H>>> {
        let Some((version, coming)) = self.coming_version(route, source)? else {
            return Ok(None);
        };

        let guard = self.contexts.locks().acquire(&key).await;
        let existing = self.contexts.backend().get(&key).await?;
        let saved = existing
            .as_ref()
            .and_then(version_of)
            .map(parse_version)
            .transpose()?;

        let migrations_for = |direction: MigrationDirection,
                              definitions: &[&PowerAppDefinition]|
         -> Vec<MigrationStep> {
            definitions
                .iter()
                .filter_map(|definition| definition.migration_for(route))
                .map(|migration| MigrationStep::new(direction, migration))
                .collect()
        };

        let resolution = self.registry.resolve(
            Some(&coming),
            saved.as_ref(),
            pick,
            Some(&migrations_for),
        )?;

        let Some(resolution) = resolution else {
            return Ok(None);
        };

        Ok(Some(Prepared {
            guard,
            key,
            version,
            existing,
            handler: resolution.change,
            migrations: MigrationChain::from(resolution.migrations),
        }))
    }

    /// Migrate the stored blob, upsert `document` and release the lock
    pub(crate) async fn commit<H>(
        &self,
        prepared: Prepared<H>,
        document: Document,
    ) -> PowerAppResult<Committed<H>> {
        let Prepared {
            guard,
            key,
            version,
            existing,
            handler,
            migrations,
        } = prepared;

        let migrated = if migrations.is_empty() {
            None
        } else {
            let storage = existing.as_ref().map(storage_of).unwrap_or(Value::Null);
            Some(migrations.run(storage)?)
        };

        let migrated_steps = migrated.as_ref().map(|_| migrations.len());
        let upserted = self
            .contexts
            .backend()
            .upsert_migrated(&key, &version, document, migrated)
            .await?;
        if let Some(steps) = migrated_steps {
            self.logger.log(
                LogLevel::Info,
                "storage migrated",
                &[
                    ("resource", key.to_string()),
                    ("steps", steps.to_string()),
                    ("from", upserted.saved_version.clone().unwrap_or_default()),
                    ("to", version.clone()),
                ],
            );
        }
        let storage = storage_of(&upserted.record);
        drop(guard);

        Ok(Committed {
            record: upserted.record,
            storage,
            handler,
        })
    }
}

/// Turn an author handler's result into a response body
pub(crate) fn respond(result: anyhow::Result<Value>) -> PowerAppResult<Value> {
    match result {
        Ok(Value::Null) => Ok(json!({})),
        Ok(value) => Ok(value),
        Err(e) => Err(PowerAppError::Handler(e)),
    }
}

/// Assembles a [`PowerApp`]
#[derive(Default)]
pub struct PowerAppBuilder {
    versions: Vec<(String, PowerAppDefinition)>,
    backend: Option<Arc<dyn StorageBackend>>,
    api_factory: Option<Arc<dyn PlatformApiFactory>>,
    logger: Option<Arc<dyn Logger>>,
    locks: Option<ResourceLocks>,
}

impl PowerAppBuilder {
    /// Register `definition` for the version `range`
    pub fn version(mut self, range: impl Into<String>, definition: PowerAppDefinition) -> Self {
        self.versions.push((range.into(), definition));
        self
    }

    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn api_factory(mut self, api_factory: Arc<dyn PlatformApiFactory>) -> Self {
        self.api_factory = Some(api_factory);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Share a lock map with other components of the process
    pub fn locks(mut self, locks: ResourceLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Validate the registrations and build the route table.
    ///
    /// Overlapping ranges and an empty registry are fatal; ancestor
    /// mismatches are logged as warnings.
    pub fn build(self) -> PowerAppResult<PowerApp> {
        let logger = self.logger.unwrap_or_else(|| Arc::new(TracingLogger));
        let backend = self
            .backend
            .ok_or_else(|| PowerAppError::Configuration("no storage backend".to_string()))?;
        let api_factory = match self.api_factory {
            Some(api_factory) => api_factory,
            None => default_api_factory()?,
        };

        let mut registry = VersionRegistry::new();
        let mut routes = HashSet::new();
        for (range, definition) in self.versions {
            routes.extend(definition.routes());
            registry.register(&range, definition)?;
        }

        for warning in registry.validate()? {
            logger.log(LogLevel::Warn, &warning, &[]);
        }

        logger.log(
            LogLevel::Info,
            "power app ready",
            &[
                ("versions", registry.len().to_string()),
                ("routes", routes.len().to_string()),
            ],
        );

        Ok(PowerApp {
            registry,
            routes,
            contexts: ContextBuilder::new(
                backend,
                self.locks.unwrap_or_default(),
                api_factory,
            ),
            logger,
        })
    }
}

#[cfg(feature = "http")]
fn default_api_factory() -> PowerAppResult<Arc<dyn PlatformApiFactory>> {
    use crate::api::{HttpApiConfig, HttpPlatformApiFactory};

    Ok(Arc::new(HttpPlatformApiFactory::new(HttpApiConfig::default())?))
}

#[cfg(not(feature = "http"))]
fn default_api_factory() -> PowerAppResult<Arc<dyn PlatformApiFactory>> {
    Err(PowerAppError::Configuration(
        "no platform API factory configured".to_string(),
    ))
}

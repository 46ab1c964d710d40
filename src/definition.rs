// Copyright (c) 2025 - Cowboy AI, Inc.
//! Handler definitions
//!
//! A [`PowerAppDefinition`] is everything an author registers for one
//! version range: lifecycle handlers per contribution, named actions, and
//! the storage migration into that range for each stored contribution.
//!
//! # Example
//!
//! ```rust
//! use powerapp_sdk::definition::{OperationDefinition, PowerAppDefinition};
//! use serde_json::json;
//!
//! let v2 = PowerAppDefinition::new()
//!     .ancestor("^1.0.0")
//!     .power_item(
//!         "invoice",
//!         OperationDefinition::new()
//!             .on_activate(|ctx, _params| async move {
//!                 ctx.storage.set("status", "active").await?;
//!                 Ok(json!({}))
//!             })
//!             .on_action("approve", |ctx, _params| async move {
//!                 ctx.storage.inc("approvals", 1).await?;
//!                 Ok(json!({"approved": true}))
//!             }),
//!     );
//! assert_eq!(v2.routes().len(), 2);
//! ```

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::{
    InstallationContext, OperationContext, PageContext, PowerGlanceContext, SourceContext,
};
use crate::event::InstallationEvent;
use crate::model::PlatformUser;
use crate::route::{
    GlanceChange, InstallationChange, OperationChange, OperationKind, RequestKind, Route,
};
use crate::version::{Migration, VersionedDefinition};

type HandlerFn<C, P> = dyn Fn(C, P) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;

/// An author-supplied async handler
pub struct Handler<C, P>(Arc<HandlerFn<C, P>>);

impl<C, P> Handler<C, P>
where
    C: Send + 'static,
    P: Send + 'static,
{
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(C, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self(Arc::new(move |context, params| f(context, params).boxed()))
    }

    pub async fn call(&self, context: C, params: P) -> anyhow::Result<Value> {
        (self.0)(context, params).await
    }
}

impl<C, P> Clone for Handler<C, P> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<C, P> fmt::Debug for Handler<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Parameters of operation handlers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationParams {
    pub inputs: Map<String, Value>,
    pub configs: Map<String, Value>,
    /// The action name for `action:<name>` routes
    pub action: Option<String>,
}

/// Parameters of glance handlers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlanceParams {
    pub resources: Value,
    pub configs: Map<String, Value>,
    pub clock: u64,
}

/// Parameters of page handlers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageParams {
    pub user: Option<PlatformUser>,
    pub payload: Map<String, Value>,
}

/// Parameters of data-source and field-source handlers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceParams {
    pub payload: Map<String, Value>,
}

pub type InstallationHandler = Handler<InstallationContext, InstallationEvent>;
pub type OperationHandler = Handler<OperationContext, OperationParams>;
pub type GlanceHandler = Handler<PowerGlanceContext, GlanceParams>;
pub type PageHandler = Handler<PageContext, PageParams>;
pub type SourceHandler = Handler<SourceContext, SourceParams>;

/// Installation lifecycle handlers
#[derive(Clone, Default)]
pub struct InstallationDefinition {
    pub activate: Option<InstallationHandler>,
    pub update: Option<InstallationHandler>,
    pub deactivate: Option<InstallationHandler>,
    pub migration: Option<Arc<dyn Migration>>,
}

impl InstallationDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_activate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(InstallationContext, InstallationEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.activate = Some(Handler::new(f));
        self
    }

    pub fn on_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(InstallationContext, InstallationEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.update = Some(Handler::new(f));
        self
    }

    pub fn on_deactivate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(InstallationContext, InstallationEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.deactivate = Some(Handler::new(f));
        self
    }

    pub fn migration(mut self, migration: impl Migration + 'static) -> Self {
        self.migration = Some(Arc::new(migration));
        self
    }

    pub fn handler(&self, change: InstallationChange) -> Option<&InstallationHandler> {
        match change {
            InstallationChange::Activate => self.activate.as_ref(),
            InstallationChange::Update => self.update.as_ref(),
            InstallationChange::Deactivate => self.deactivate.as_ref(),
        }
    }
}

/// Handlers of one power item, power node or custom checkable item
#[derive(Clone, Default)]
pub struct OperationDefinition {
    pub activate: Option<OperationHandler>,
    pub update: Option<OperationHandler>,
    pub deactivate: Option<OperationHandler>,
    /// Named actions; only reachable on power items
    pub actions: HashMap<String, OperationHandler>,
    pub migration: Option<Arc<dyn Migration>>,
}

impl OperationDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_activate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(OperationContext, OperationParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.activate = Some(Handler::new(f));
        self
    }

    pub fn on_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(OperationContext, OperationParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.update = Some(Handler::new(f));
        self
    }

    pub fn on_deactivate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(OperationContext, OperationParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.deactivate = Some(Handler::new(f));
        self
    }

    pub fn on_action<F, Fut>(mut self, action: impl Into<String>, f: F) -> Self
    where
        F: Fn(OperationContext, OperationParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.actions.insert(action.into(), Handler::new(f));
        self
    }

    pub fn migration(mut self, migration: impl Migration + 'static) -> Self {
        self.migration = Some(Arc::new(migration));
        self
    }

    pub fn handler(&self, change: &OperationChange) -> Option<&OperationHandler> {
        match change {
            OperationChange::Activate => self.activate.as_ref(),
            OperationChange::Update => self.update.as_ref(),
            OperationChange::Deactivate => self.deactivate.as_ref(),
            OperationChange::Action(action) => self.actions.get(action),
        }
    }
}

/// Handlers of one power glance
#[derive(Clone, Default)]
pub struct PowerGlanceDefinition {
    pub initialize: Option<GlanceHandler>,
    pub change: Option<GlanceHandler>,
    pub dispose: Option<GlanceHandler>,
    pub migration: Option<Arc<dyn Migration>>,
}

impl PowerGlanceDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_initialize<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PowerGlanceContext, GlanceParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.initialize = Some(Handler::new(f));
        self
    }

    pub fn on_change<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PowerGlanceContext, GlanceParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.change = Some(Handler::new(f));
        self
    }

    pub fn on_dispose<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PowerGlanceContext, GlanceParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.dispose = Some(Handler::new(f));
        self
    }

    pub fn migration(mut self, migration: impl Migration + 'static) -> Self {
        self.migration = Some(Arc::new(migration));
        self
    }

    pub fn handler(&self, change: GlanceChange) -> Option<&GlanceHandler> {
        match change {
            GlanceChange::Initialize => self.initialize.as_ref(),
            GlanceChange::Change => self.change.as_ref(),
            GlanceChange::Dispose => self.dispose.as_ref(),
        }
    }
}

/// Handler of one page
#[derive(Clone, Default)]
pub struct PageDefinition {
    pub request: Option<PageHandler>,
    pub migration: Option<Arc<dyn Migration>>,
}

impl PageDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PageContext, PageParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.request = Some(Handler::new(f));
        self
    }

    pub fn migration(mut self, migration: impl Migration + 'static) -> Self {
        self.migration = Some(Arc::new(migration));
        self
    }
}

/// Handler of one data source or field source
#[derive(Clone, Default)]
pub struct SourceDefinition {
    pub request: Option<SourceHandler>,
}

impl SourceDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SourceContext, SourceParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.request = Some(Handler::new(f));
        self
    }
}

/// Everything registered for one version range
#[derive(Clone, Default)]
pub struct PowerAppDefinition {
    /// Range this definition directly follows
    pub ancestor: Option<String>,
    pub installation: Option<InstallationDefinition>,
    pub power_items: HashMap<String, OperationDefinition>,
    pub power_nodes: HashMap<String, OperationDefinition>,
    pub power_custom_checkable_items: HashMap<String, OperationDefinition>,
    pub power_glances: HashMap<String, PowerGlanceDefinition>,
    pub pages: HashMap<String, PageDefinition>,
    pub data_sources: HashMap<String, SourceDefinition>,
    pub field_sources: HashMap<String, SourceDefinition>,
}

impl PowerAppDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ancestor(mut self, range: impl Into<String>) -> Self {
        self.ancestor = Some(range.into());
        self
    }

    pub fn installation(mut self, definition: InstallationDefinition) -> Self {
        self.installation = Some(definition);
        self
    }

    pub fn power_item(mut self, name: impl Into<String>, definition: OperationDefinition) -> Self {
        self.power_items.insert(name.into(), definition);
        self
    }

    pub fn power_node(mut self, name: impl Into<String>, definition: OperationDefinition) -> Self {
        self.power_nodes.insert(name.into(), definition);
        self
    }

    pub fn power_custom_checkable_item(
        mut self,
        name: impl Into<String>,
        definition: OperationDefinition,
    ) -> Self {
        self.power_custom_checkable_items
            .insert(name.into(), definition);
        self
    }

    pub fn power_glance(mut self, name: impl Into<String>, definition: PowerGlanceDefinition) -> Self {
        self.power_glances.insert(name.into(), definition);
        self
    }

    pub fn page(mut self, name: impl Into<String>, definition: PageDefinition) -> Self {
        self.pages.insert(name.into(), definition);
        self
    }

    pub fn data_source(mut self, name: impl Into<String>, definition: SourceDefinition) -> Self {
        self.data_sources.insert(name.into(), definition);
        self
    }

    pub fn field_source(mut self, name: impl Into<String>, definition: SourceDefinition) -> Self {
        self.field_sources.insert(name.into(), definition);
        self
    }

    pub fn operations(&self, kind: OperationKind) -> &HashMap<String, OperationDefinition> {
        match kind {
            OperationKind::PowerItem => &self.power_items,
            OperationKind::PowerNode => &self.power_nodes,
            OperationKind::PowerCustomCheckableItem => &self.power_custom_checkable_items,
        }
    }

    pub fn requests(&self, kind: RequestKind) -> Option<&HashMap<String, SourceDefinition>> {
        match kind {
            RequestKind::Page => None,
            RequestKind::DataSource => Some(&self.data_sources),
            RequestKind::FieldSource => Some(&self.field_sources),
        }
    }

    /// Every route this definition has a handler for
    pub fn routes(&self) -> Vec<Route> {
        let mut routes = Vec::new();

        if let Some(installation) = &self.installation {
            for change in [
                InstallationChange::Activate,
                InstallationChange::Update,
                InstallationChange::Deactivate,
            ] {
                if installation.handler(change).is_some() {
                    routes.push(Route::Installation(change));
                }
            }
        }

        for kind in [
            OperationKind::PowerItem,
            OperationKind::PowerNode,
            OperationKind::PowerCustomCheckableItem,
        ] {
            for (name, definition) in self.operations(kind) {
                let mut changes = vec![
                    OperationChange::Activate,
                    OperationChange::Update,
                    OperationChange::Deactivate,
                ];
                if kind == OperationKind::PowerItem {
                    changes.extend(definition.actions.keys().cloned().map(OperationChange::Action));
                }
                for change in changes {
                    if definition.handler(&change).is_some() {
                        routes.push(Route::Operation {
                            kind,
                            name: name.clone(),
                            change,
                        });
                    }
                }
            }
        }

        for (name, definition) in &self.power_glances {
            for change in [GlanceChange::Initialize, GlanceChange::Change, GlanceChange::Dispose] {
                if definition.handler(change).is_some() {
                    routes.push(Route::power_glance(name.clone(), change));
                }
            }
        }

        routes.extend(
            self.pages
                .iter()
                .filter(|(_, d)| d.request.is_some())
                .map(|(name, _)| Route::page(name.clone())),
        );
        routes.extend(
            self.data_sources
                .iter()
                .filter(|(_, d)| d.request.is_some())
                .map(|(name, _)| Route::data_source(name.clone())),
        );
        routes.extend(
            self.field_sources
                .iter()
                .filter(|(_, d)| d.request.is_some())
                .map(|(name, _)| Route::field_source(name.clone())),
        );

        routes
    }

    /// The storage migration into this version for the resource behind `route`
    pub fn migration_for(&self, route: &Route) -> Option<Arc<dyn Migration>> {
        match route {
            Route::Installation(_) => self.installation.as_ref()?.migration.clone(),
            Route::Operation { kind, name, .. } => self.operations(*kind).get(name)?.migration.clone(),
            Route::PowerGlance { name, .. } => self.power_glances.get(name)?.migration.clone(),
            Route::Request {
                kind: RequestKind::Page,
                name,
            } => self.pages.get(name)?.migration.clone(),
            Route::Request { .. } => None,
        }
    }
}

impl VersionedDefinition for PowerAppDefinition {
    fn ancestor(&self) -> Option<&str> {
        self.ancestor.as_deref()
    }
}

impl fmt::Debug for PowerAppDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<String> = self.routes().iter().map(Route::to_string).collect();
        routes.sort();
        f.debug_struct("PowerAppDefinition")
            .field("ancestor", &self.ancestor)
            .field("routes", &routes)
            .finish()
    }
}

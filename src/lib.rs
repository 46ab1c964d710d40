//! Versioned event handling for power apps
//!
//! Register one handler definition per platform contract version range;
//! the SDK routes every event to the matching definition, migrates each
//! resource's stored data between versions, and serializes storage
//! mutations per resource.
//!
//! ```rust,no_run
//! use powerapp_sdk::{FileBackend, OperationDefinition, PowerApp, PowerAppDefinition, Route};
//! use powerapp_sdk::route::OperationChange;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let app = PowerApp::builder()
//!     .backend(Arc::new(FileBackend::open("store.json").await?))
//!     .version(
//!         "^1.0.0",
//!         PowerAppDefinition::new().power_item(
//!             "counter",
//!             OperationDefinition::new().on_update(|ctx, _params| async move {
//!                 let storage = ctx.storage.inc("count", 1).await?;
//!                 Ok(storage)
//!             }),
//!         ),
//!     )
//!     .build()?;
//!
//! let response = app
//!     .handle(
//!         &Route::power_item("counter", OperationChange::Update),
//!         json!({"source": {"version": "1.2.0"}, "token": "op-1"}),
//!     )
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod definition;
pub mod errors;
pub mod event;
pub mod handlers;
pub mod logging;
pub mod model;
pub mod nats;
pub mod route;
pub mod storage;
pub mod transport;
pub mod version;

// Re-export commonly used types
pub use api::{Credential, PlatformApi, PlatformApiFactory};
pub use config::{SdkConfig, StorageKind};
pub use context::{
    ContextBuilder, InstallationContext, OperationContext, PageContext, PowerGlanceContext,
    SourceContext, UserContext,
};
pub use definition::{
    InstallationDefinition, OperationDefinition, PageDefinition, PowerAppDefinition,
    PowerGlanceDefinition, SourceDefinition,
};
pub use errors::{PowerAppError, PowerAppResult};
pub use event::{normalize_source, Source};
pub use handlers::{PowerApp, PowerAppBuilder};
pub use logging::{init_tracing, LogLevel, Logger, TracingLogger};
pub use model::{ResourceKey, ResourceType};
pub use nats::{NatsClient, NatsConfig};
pub use route::Route;
pub use storage::{ActionStorage, FileBackend, NatsKvBackend, ResourceLocks, StorageBackend};
pub use transport::EventServer;
pub use version::{Migration, MigrationFns, VersionRegistry};

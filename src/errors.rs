//! Error types for power-app event handling

use thiserror::Error;

use crate::api::ApiError;
use crate::event::EventError;
use crate::route::RouteError;
use crate::storage::StorageError;
use crate::version::{MigrationError, VersionError};

/// Errors that can occur while serving power-app events
#[derive(Debug, Error)]
pub enum PowerAppError {
    /// Version registration or resolution error
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Author-supplied migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Platform API error
    #[error("Platform API error: {0}")]
    Api(#[from] ApiError),

    /// Malformed event payload
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    /// Malformed route
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// Author-supplied handler returned an error
    #[error("Handler error: {0}")]
    Handler(#[source] anyhow::Error),

    /// NATS connection error
    #[error("NATS connection error: {0}")]
    NatsConnection(String),

    /// NATS subscribe error
    #[error("NATS subscribe error: {0}")]
    NatsSubscribe(String),

    /// NATS publish error
    #[error("NATS publish error: {0}")]
    NatsPublish(String),

    /// Shared-secret token mismatch
    #[error("Unauthorized: source token does not match")]
    Unauthorized,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for power-app operations
pub type PowerAppResult<T> = Result<T, PowerAppError>;

impl From<serde_json::Error> for PowerAppError {
    fn from(err: serde_json::Error) -> Self {
        PowerAppError::Event(EventError::Payload(err.to_string()))
    }
}

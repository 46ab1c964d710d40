// Copyright (c) 2025 - Cowboy AI, Inc.
//! Platform API client
//!
//! Handlers talk back to the platform through a [`PlatformApi`] bound to the
//! credential of the resource that triggered the event: installation-level
//! events use the installation's access token, per-operation events use the
//! operation token. The core only depends on the trait; the reqwest client
//! lives in [`http`] behind the `http` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpApiConfig, HttpPlatformApi, HttpPlatformApiFactory};

/// Path of the glance re-synchronization call
pub const INITIALIZE_POWER_GLANCE_PATH: &str = "/power-glance/initialize";

/// Errors from platform API calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Transport failure or missing endpoint
    #[error("platform request failed: {0}")]
    Request(String),

    /// Non-success HTTP status
    #[error("platform returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Platform answered with an error envelope
    #[error("platform error {code}: {message}")]
    Remote { code: String, message: String },

    /// Response body did not have the expected shape
    #[error("cannot decode platform response: {0}")]
    Decode(String),
}

/// Credential an API client is bound to
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Installation access token
    Access(String),
    /// Operation token of a power item, node, glance or checkable item
    Operation(String),
    /// No credential (installation without an access token yet)
    Anonymous,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Access(_) => f.write_str("Access(***)"),
            Credential::Operation(_) => f.write_str("Operation(***)"),
            Credential::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Fresh glance state fetched from the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlanceSnapshot {
    #[serde(default)]
    pub resources: Value,
    #[serde(default)]
    pub configs: Map<String, Value>,
    #[serde(default)]
    pub clock: u64,
}

/// Client for calls back into the platform
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// The credential this client sends
    fn credential(&self) -> &Credential;

    /// Call `path` with a JSON body, returning the response `data`
    async fn call(&self, path: &str, body: Value) -> Result<Value, ApiError>;

    /// Re-fetch a glance's resources, configs and clock
    async fn initialize_power_glance(&self) -> Result<GlanceSnapshot, ApiError> {
        let data = self.call(INITIALIZE_POWER_GLANCE_PATH, json!({})).await?;
        serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Builds clients bound to a platform URL and a credential
pub trait PlatformApiFactory: Send + Sync {
    /// `base_url` is the `source.url` of the event, when it carried one
    fn create(&self, base_url: Option<&str>, credential: Credential) -> Arc<dyn PlatformApi>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned {
        credential: Credential,
        response: Result<Value, ApiError>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PlatformApi for Canned {
        fn credential(&self) -> &Credential {
            &self.credential
        }

        async fn call(&self, path: &str, _body: Value) -> Result<Value, ApiError> {
            self.calls.lock().unwrap().push(path.to_string());
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_initialize_power_glance_decodes_snapshot() {
        let api = Canned {
            credential: Credential::Operation("op".into()),
            response: Ok(json!({"resources": {"tags": []}, "configs": {"a": 1}, "clock": 9})),
            calls: Mutex::new(Vec::new()),
        };

        let snapshot = api.initialize_power_glance().await.unwrap();

        assert_eq!(snapshot.clock, 9);
        assert_eq!(snapshot.configs["a"], json!(1));
        assert_eq!(*api.calls.lock().unwrap(), vec![INITIALIZE_POWER_GLANCE_PATH]);
    }

    #[tokio::test]
    async fn test_initialize_power_glance_rejects_bad_shape() {
        let api = Canned {
            credential: Credential::Anonymous,
            response: Ok(json!({"clock": "soon"})),
            calls: Mutex::new(Vec::new()),
        };

        assert!(matches!(
            api.initialize_power_glance().await,
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let debug = format!("{:?}", Credential::Access("secret".into()));
        assert!(!debug.contains("secret"));
    }
}

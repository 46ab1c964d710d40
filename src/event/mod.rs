// Copyright (c) 2025 - Cowboy AI, Inc.
//! Canonical event envelope
//!
//! Transport shims hand the core a JSON object: a `source` block plus a
//! payload whose shape depends on the resource type. [`parse_event`] splits
//! the two, normalizes `source`, and deserializes the payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{InstallationResources, PlatformUser};

pub mod normalize;

pub use normalize::normalize_source;

/// Errors raised while reading an incoming event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// `source` block is malformed
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// An entity reference inside `source` is malformed
    #[error("invalid reference in source.{field}: {reason}")]
    InvalidReference { field: &'static str, reason: String },

    /// A field the route needs is absent
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// Payload does not match the route's shape
    #[error("invalid payload: {0}")]
    Payload(String),
}

/// Reference to a platform entity; fields besides `id` are kept verbatim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }
}

/// Normalized `source` block
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Source {
    /// Shared secret checked at the transport boundary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Platform base URL the event came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation: Option<EntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<EntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<EntityRef>,
    /// Contract version of the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Source {
    pub fn installation_id(&self) -> Option<&str> {
        self.installation.as_ref().map(|i| i.id.as_str())
    }

    pub fn require_installation(&self) -> Result<&str, EventError> {
        self.installation_id()
            .ok_or(EventError::MissingField("source.installation"))
    }
}

/// An incoming event: normalized source plus typed payload
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P> {
    pub source: Source,
    pub payload: P,
}

/// Split `raw` into its normalized source and typed payload
pub fn parse_event<P: DeserializeOwned>(raw: Value) -> Result<Event<P>, EventError> {
    let mut object = match raw {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        _ => return Err(EventError::Payload("event must be an object".to_string())),
    };

    let source = normalize_source(&object.remove("source").unwrap_or(Value::Null))?;
    let payload = serde_json::from_value(Value::Object(object))
        .map_err(|e| EventError::Payload(e.to_string()))?;

    Ok(Event { source, payload })
}

/// `installation/*` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationEvent {
    #[serde(default)]
    pub configs: Map<String, Value>,
    #[serde(default)]
    pub resources: InstallationResources,
    #[serde(default)]
    pub users: Vec<PlatformUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// `power-item/*`, `power-node/*` and `power-custom-checkable-item/*` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationEvent {
    /// Operation token identifying the resource
    pub token: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub configs: Map<String, Value>,
}

/// `power-glance/*` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlanceEvent {
    pub token: String,
    #[serde(default)]
    pub clock: u64,
    #[serde(default)]
    pub resources: Value,
    #[serde(default)]
    pub configs: Map<String, Value>,
}

/// `page/*` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEvent {
    /// Opaque page request id
    pub id: String,
    /// Named user; absent means every installation user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PlatformUser>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// `data-source/*` and `field-source/*` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_operation_event() {
        let event: Event<OperationEvent> = parse_event(json!({
            "source": {"installation": "i-1", "version": "1.0.0"},
            "token": "op-1",
            "inputs": {"amount": 3}
        }))
        .unwrap();

        assert_eq!(event.source.installation_id(), Some("i-1"));
        assert_eq!(event.payload.token, "op-1");
        assert_eq!(event.payload.inputs["amount"], json!(3));
        assert!(event.payload.configs.is_empty());
    }

    #[test]
    fn test_parse_page_event_keeps_extra_fields() {
        let event: Event<PageEvent> = parse_event(json!({
            "source": {"installation": {"id": "i-1"}},
            "id": "req-1",
            "user": "u-1",
            "body": {"q": "search"}
        }))
        .unwrap();

        assert_eq!(event.payload.user, Some(PlatformUser::new("u-1")));
        assert_eq!(event.payload.rest.get("body"), Some(&json!({"q": "search"})));
        assert!(!event.payload.rest.contains_key("source"));
    }

    #[test]
    fn test_payload_shape_errors() {
        let missing_token = parse_event::<OperationEvent>(json!({"source": {}}));
        assert!(matches!(missing_token, Err(EventError::Payload(_))));

        let not_object = parse_event::<SourceEvent>(json!("x"));
        assert!(matches!(not_object, Err(EventError::Payload(_))));
    }

    #[test]
    fn test_require_installation() {
        let source = Source::default();
        assert_eq!(
            source.require_installation(),
            Err(EventError::MissingField("source.installation"))
        );
    }
}

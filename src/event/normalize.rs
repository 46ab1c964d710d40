// Copyright (c) 2025 - Cowboy AI, Inc.
//! Canonical `source` envelope normalization
//!
//! Platform releases have sent entity references in two shapes: a bare id
//! (`"installation": "i-1"`) and an object (`"installation": {"id": "i-1"}`).
//! Every incoming envelope passes through [`normalize_source`] exactly once,
//! before any handler runs, so nothing downstream sees the legacy shape.

use serde_json::{Map, Value};

use super::{EntityRef, EventError, Source};

/// Reference fields of the envelope
const REFERENCE_FIELDS: [&str; 3] = ["installation", "organization", "team"];

/// Normalize a raw `source` block into a [`Source`].
///
/// An absent (`null`) block yields an empty source. References accept a
/// string id, a numeric id or an object carrying `id`; anything else is
/// rejected.
pub fn normalize_source(raw: &Value) -> Result<Source, EventError> {
    let object = match raw {
        Value::Null => return Ok(Source::default()),
        Value::Object(object) => object,
        other => {
            return Err(EventError::InvalidSource(format!(
                "expected an object, got {}",
                kind_of(other)
            )))
        }
    };

    let [installation, organization, team] =
        REFERENCE_FIELDS.map(|field| normalize_reference(field, object.get(field)));

    Ok(Source {
        token: optional_string(object, "token")?,
        url: optional_string(object, "url")?,
        installation: installation?,
        organization: organization?,
        team: team?,
        version: optional_string(object, "version")?,
    })
}

fn normalize_reference(
    field: &'static str,
    raw: Option<&Value>,
) -> Result<Option<EntityRef>, EventError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(EntityRef::new(id.clone()))),
        Some(Value::Number(id)) => Ok(Some(EntityRef::new(id.to_string()))),
        Some(Value::Object(object)) => {
            let mut extra = object.clone();
            let id = match extra.remove("id") {
                Some(Value::String(id)) => id,
                Some(Value::Number(id)) => id.to_string(),
                Some(other) => {
                    return Err(EventError::InvalidReference {
                        field,
                        reason: format!("id must be a string, got {}", kind_of(&other)),
                    })
                }
                None => {
                    return Err(EventError::InvalidReference {
                        field,
                        reason: "object has no id".to_string(),
                    })
                }
            };
            Ok(Some(EntityRef { id, extra }))
        }
        Some(other) => Err(EventError::InvalidReference {
            field,
            reason: format!("expected an id or an object, got {}", kind_of(other)),
        }),
    }
}

fn optional_string(object: &Map<String, Value>, field: &'static str) -> Result<Option<String>, EventError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(EventError::InvalidSource(format!(
            "{field} must be a string, got {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! Typed views over stored resource documents

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{Document, ResourceKey, ResourceType};
use crate::storage::StorageError;

/// A platform user known to an installation.
///
/// Legacy callers send users as bare id strings; both shapes deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PlatformUserRepr")]
pub struct PlatformUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlatformUserRepr {
    Id(String),
    User {
        id: String,
        #[serde(default)]
        username: Option<String>,
    },
}

impl From<PlatformUserRepr> for PlatformUser {
    fn from(repr: PlatformUserRepr) -> Self {
        match repr {
            PlatformUserRepr::Id(id) => PlatformUser { id, username: None },
            PlatformUserRepr::User { id, username } => PlatformUser { id, username },
        }
    }
}

impl PlatformUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Tag and procedure id mappings granted to an installation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationResources {
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub procedures: BTreeMap<String, String>,
}

/// `installation` record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationModel {
    pub installation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub configs: Map<String, Value>,
    #[serde(default)]
    pub resources: InstallationResources,
    #[serde(default)]
    pub users: Vec<PlatformUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
}

impl InstallationModel {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::installation(&self.installation)
    }
}

/// `power-item`, `power-node` and `power-custom-checkable-item` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationModel {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
}

impl OperationModel {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.resource_type, &self.token)
    }
}

/// `power-glance` record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerGlanceModel {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub configs: Map<String, Value>,
    #[serde(default)]
    pub clock: u64,
    #[serde(default)]
    pub disposed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
}

impl PowerGlanceModel {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(ResourceType::PowerGlance, &self.token)
    }
}

/// `page` record, keyed by the opaque page request id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageModel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
}

impl PageModel {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(ResourceType::Page, &self.id)
    }
}

/// `user` record: per-installation storage of one platform user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserModel {
    pub id: String,
    pub installation: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
}

impl UserModel {
    pub fn new(installation: &str, user: &PlatformUser) -> Self {
        Self {
            id: Self::composite_id(installation, &user.id),
            installation: installation.to_string(),
            user: user.id.clone(),
            username: user.username.clone(),
            version: None,
            storage: None,
        }
    }

    pub fn composite_id(installation: &str, user: &str) -> String {
        format!("{installation}:{user}")
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(ResourceType::User, &self.id)
    }
}

/// Serialize a typed model into a storable document
pub fn to_document<T: Serialize>(model: &T) -> Result<Document, StorageError> {
    match serde_json::to_value(model) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err(StorageError::Serialization(
            "model did not serialize to an object".to_string(),
        )),
        Err(e) => Err(StorageError::Serialization(e.to_string())),
    }
}

/// Deserialize a stored document into a typed model
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StorageError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_platform_user_accepts_bare_id() {
        let users: Vec<PlatformUser> =
            serde_json::from_value(json!(["u-1", {"id": "u-2", "username": "bob"}])).unwrap();

        assert_eq!(users[0], PlatformUser::new("u-1"));
        assert_eq!(users[1], PlatformUser::new("u-2").with_username("bob"));
    }

    #[test]
    fn test_installation_document_uses_camel_case() {
        let model = InstallationModel {
            installation: "inst-1".to_string(),
            access_token: Some("secret".to_string()),
            ..Default::default()
        };

        let document = to_document(&model).unwrap();

        assert_eq!(document["accessToken"], json!("secret"));
        assert!(!document.contains_key("version"));
        assert!(!document.contains_key("storage"));
    }

    #[test]
    fn test_operation_model_carries_type_tag() {
        let document = to_document(&OperationModel {
            resource_type: ResourceType::PowerNode,
            token: "tok".to_string(),
            installation: None,
            version: None,
            storage: None,
        })
        .unwrap();

        assert_eq!(document["type"], json!("power-node"));

        let model: OperationModel = from_document(document).unwrap();
        assert_eq!(model.key(), ResourceKey::new(ResourceType::PowerNode, "tok"));
    }

    #[test]
    fn test_user_model_composite_identity() {
        let user = UserModel::new("inst-1", &PlatformUser::new("u-7").with_username("ann"));

        assert_eq!(user.id, "inst-1:u-7");
        assert_eq!(user.key(), ResourceKey::user("inst-1", "u-7"));
    }
}

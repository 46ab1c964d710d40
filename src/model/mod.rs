// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Models
//!
//! Every event targets one persistently tracked resource. Each resource type
//! declares, exactly once, its collection name, its primary identity field
//! and the allow-list of fields that upgrade calls may overwrite:
//!
//! ```text
//! type                          collection                     identity      allow-list
//! installation                  installations                  installation  configs resources users accessToken disabled
//! power-item                    power-items                    token         -
//! power-node                    power-nodes                    token         -
//! power-glance                  power-glances                  token         configs clock disposed
//! power-custom-checkable-item   power-custom-checkable-items   token         -
//! page                          pages                          id            -
//! user                          users                          id            username
//! ```
//!
//! Everything else (`type`, the identity field, `installation`, `storage`,
//! timestamps) is system-owned. `version` is never allow-listed but is always
//! force-set by [`build_secure_update_data`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub mod resources;

pub use resources::{
    InstallationModel, InstallationResources, OperationModel, PageModel, PlatformUser,
    PowerGlanceModel, UserModel,
};

/// A stored resource record: a flat JSON document
pub type Document = Map<String, Value>;

/// Field holding the resource type tag
pub const TYPE_FIELD: &str = "type";
/// Field holding the handler-definition version last applied
pub const VERSION_FIELD: &str = "version";
/// Field holding the opaque storage blob
pub const STORAGE_FIELD: &str = "storage";
/// Creation timestamp (system-owned)
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Last update timestamp (system-owned)
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Resource types tracked by the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Installation,
    PowerItem,
    PowerNode,
    PowerGlance,
    PowerCustomCheckableItem,
    Page,
    User,
}

/// Static description of a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTypeDefinition {
    /// Collection (document store) or record array (file store) name
    pub collection: &'static str,
    /// The single primary identity field
    pub identity_field: &'static str,
    /// Fields that upgrade calls may overwrite
    pub allow_list: &'static [&'static str],
}

const INSTALLATION: ResourceTypeDefinition = ResourceTypeDefinition {
    collection: "installations",
    identity_field: "installation",
    allow_list: &["configs", "resources", "users", "accessToken", "disabled"],
};

const POWER_ITEM: ResourceTypeDefinition = ResourceTypeDefinition {
    collection: "power-items",
    identity_field: "token",
    allow_list: &[],
};

const POWER_NODE: ResourceTypeDefinition = ResourceTypeDefinition {
    collection: "power-nodes",
    identity_field: "token",
    allow_list: &[],
};

const POWER_GLANCE: ResourceTypeDefinition = ResourceTypeDefinition {
    collection: "power-glances",
    identity_field: "token",
    allow_list: &["configs", "clock", "disposed"],
};

const POWER_CUSTOM_CHECKABLE_ITEM: ResourceTypeDefinition = ResourceTypeDefinition {
    collection: "power-custom-checkable-items",
    identity_field: "token",
    allow_list: &[],
};

const PAGE: ResourceTypeDefinition = ResourceTypeDefinition {
    collection: "pages",
    identity_field: "id",
    allow_list: &[],
};

const USER: ResourceTypeDefinition = ResourceTypeDefinition {
    collection: "users",
    identity_field: "id",
    allow_list: &["username"],
};

impl ResourceType {
    /// All resource types, in declaration order
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Installation,
        ResourceType::PowerItem,
        ResourceType::PowerNode,
        ResourceType::PowerGlance,
        ResourceType::PowerCustomCheckableItem,
        ResourceType::Page,
        ResourceType::User,
    ];

    /// The type's entry in the type→definition table
    pub const fn definition(self) -> &'static ResourceTypeDefinition {
        match self {
            ResourceType::Installation => &INSTALLATION,
            ResourceType::PowerItem => &POWER_ITEM,
            ResourceType::PowerNode => &POWER_NODE,
            ResourceType::PowerGlance => &POWER_GLANCE,
            ResourceType::PowerCustomCheckableItem => &POWER_CUSTOM_CHECKABLE_ITEM,
            ResourceType::Page => &PAGE,
            ResourceType::User => &USER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Installation => "installation",
            ResourceType::PowerItem => "power-item",
            ResourceType::PowerNode => "power-node",
            ResourceType::PowerGlance => "power-glance",
            ResourceType::PowerCustomCheckableItem => "power-custom-checkable-item",
            ResourceType::Page => "page",
            ResourceType::User => "user",
        }
    }

    pub fn collection(self) -> &'static str {
        self.definition().collection
    }

    pub fn identity_field(self) -> &'static str {
        self.definition().identity_field
    }

    /// Whether `field` may be overwritten by an upgrade call
    pub fn is_allow_listed(self, field: &str) -> bool {
        self.definition().allow_list.contains(&field)
    }

    /// Look a type up by its collection name
    pub fn from_collection(collection: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.collection() == collection)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one resource: its type plus the value of its identity field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub identity: String,
}

impl ResourceKey {
    pub fn new(resource_type: ResourceType, identity: impl Into<String>) -> Self {
        Self {
            resource_type,
            identity: identity.into(),
        }
    }

    pub fn installation(installation: impl Into<String>) -> Self {
        Self::new(ResourceType::Installation, installation)
    }

    /// Key of the per-user record: `"<installation>:<user>"`
    pub fn user(installation: &str, user: &str) -> Self {
        Self::new(ResourceType::User, UserModel::composite_id(installation, user))
    }

    /// Whether `document` is the record this key addresses
    pub fn matches(&self, document: &Document) -> bool {
        document
            .get(self.resource_type.identity_field())
            .and_then(Value::as_str)
            == Some(self.identity.as_str())
    }
}

/// Mutex name: `"<type>:<identity>"`
impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.identity)
    }
}

/// Build the only permitted change set for an existing record.
///
/// Keys of `partial` not on the type's allow-list are dropped, then `version`
/// is force-set. Identity and system fields can never pass through here.
pub fn build_secure_update_data(
    resource_type: ResourceType,
    version: &str,
    partial: &Document,
) -> Document {
    let mut data: Document = partial
        .iter()
        .filter(|(field, _)| resource_type.is_allow_listed(field))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();

    data.insert(VERSION_FIELD.to_string(), Value::String(version.to_string()));
    data
}

/// The `version` of a stored record, if any
pub fn version_of(document: &Document) -> Option<&str> {
    document.get(VERSION_FIELD).and_then(Value::as_str)
}

/// The storage blob of a stored record; `Null` when absent
pub fn storage_of(document: &Document) -> Value {
    document.get(STORAGE_FIELD).cloned().unwrap_or(Value::Null)
}

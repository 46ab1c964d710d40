// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event routes
//!
//! A route names the resource type, the author's contribution name, and the
//! change kind an event asks for. Canonical string form:
//!
//! ```text
//! installation/activate|update|deactivate
//! power-item/<name>/activate|update|deactivate|action:<action>
//! power-node/<name>/activate|update|deactivate
//! power-custom-checkable-item/<name>/activate|update|deactivate
//! power-glance/<name>/initialize|change|dispose
//! page/<name>/request
//! data-source/<name>/request
//! field-source/<name>/request
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ResourceType;

/// Malformed route
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("unknown route kind '{0}'")]
    UnknownKind(String),

    #[error("route '{route}' has an invalid change '{change}'")]
    InvalidChange { route: String, change: String },

    #[error("route '{0}' is missing segments")]
    Incomplete(String),

    #[error("route '{0}' has trailing segments")]
    TrailingSegments(String),

    #[error("route '{0}' has an empty name")]
    EmptyName(String),
}

/// Installation lifecycle change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallationChange {
    Activate,
    Update,
    Deactivate,
}

/// Power-item / node / checkable-item change
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationChange {
    Activate,
    Update,
    Deactivate,
    /// Named action; power items only
    Action(String),
}

/// Power-glance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlanceChange {
    Initialize,
    Change,
    Dispose,
}

/// Kinds of operation-style contributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    PowerItem,
    PowerNode,
    PowerCustomCheckableItem,
}

impl OperationKind {
    pub fn resource_type(self) -> ResourceType {
        match self {
            OperationKind::PowerItem => ResourceType::PowerItem,
            OperationKind::PowerNode => ResourceType::PowerNode,
            OperationKind::PowerCustomCheckableItem => ResourceType::PowerCustomCheckableItem,
        }
    }

    fn as_str(self) -> &'static str {
        self.resource_type().as_str()
    }

    fn supports_actions(self) -> bool {
        matches!(self, OperationKind::PowerItem)
    }
}

/// Request/response contribution kinds without lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Page,
    DataSource,
    FieldSource,
}

impl RequestKind {
    fn as_str(self) -> &'static str {
        match self {
            RequestKind::Page => "page",
            RequestKind::DataSource => "data-source",
            RequestKind::FieldSource => "field-source",
        }
    }
}

/// A fully identified event route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Installation(InstallationChange),
    Operation {
        kind: OperationKind,
        name: String,
        change: OperationChange,
    },
    PowerGlance {
        name: String,
        change: GlanceChange,
    },
    Request {
        kind: RequestKind,
        name: String,
    },
}

impl Route {
    pub fn power_item(name: impl Into<String>, change: OperationChange) -> Self {
        Route::Operation {
            kind: OperationKind::PowerItem,
            name: name.into(),
            change,
        }
    }

    pub fn power_node(name: impl Into<String>, change: OperationChange) -> Self {
        Route::Operation {
            kind: OperationKind::PowerNode,
            name: name.into(),
            change,
        }
    }

    pub fn power_custom_checkable_item(name: impl Into<String>, change: OperationChange) -> Self {
        Route::Operation {
            kind: OperationKind::PowerCustomCheckableItem,
            name: name.into(),
            change,
        }
    }

    pub fn power_glance(name: impl Into<String>, change: GlanceChange) -> Self {
        Route::PowerGlance {
            name: name.into(),
            change,
        }
    }

    pub fn page(name: impl Into<String>) -> Self {
        Route::Request {
            kind: RequestKind::Page,
            name: name.into(),
        }
    }

    pub fn data_source(name: impl Into<String>) -> Self {
        Route::Request {
            kind: RequestKind::DataSource,
            name: name.into(),
        }
    }

    pub fn field_source(name: impl Into<String>) -> Self {
        Route::Request {
            kind: RequestKind::FieldSource,
            name: name.into(),
        }
    }

    /// The contribution name; `None` for installation routes
    pub fn name(&self) -> Option<&str> {
        match self {
            Route::Installation(_) => None,
            Route::Operation { name, .. }
            | Route::PowerGlance { name, .. }
            | Route::Request { name, .. } => Some(name),
        }
    }

    /// Resource type whose record the route touches, if any
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self {
            Route::Installation(_) => Some(ResourceType::Installation),
            Route::Operation { kind, .. } => Some(kind.resource_type()),
            Route::PowerGlance { .. } => Some(ResourceType::PowerGlance),
            Route::Request {
                kind: RequestKind::Page,
                ..
            } => Some(ResourceType::Page),
            Route::Request { .. } => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Installation(change) => {
                let change = match change {
                    InstallationChange::Activate => "activate",
                    InstallationChange::Update => "update",
                    InstallationChange::Deactivate => "deactivate",
                };
                write!(f, "installation/{change}")
            }
            Route::Operation { kind, name, change } => {
                write!(f, "{}/{name}/", kind.as_str())?;
                match change {
                    OperationChange::Activate => f.write_str("activate"),
                    OperationChange::Update => f.write_str("update"),
                    OperationChange::Deactivate => f.write_str("deactivate"),
                    OperationChange::Action(action) => write!(f, "action:{action}"),
                }
            }
            Route::PowerGlance { name, change } => {
                let change = match change {
                    GlanceChange::Initialize => "initialize",
                    GlanceChange::Change => "change",
                    GlanceChange::Dispose => "dispose",
                };
                write!(f, "power-glance/{name}/{change}")
            }
            Route::Request { kind, name } => write!(f, "{}/{name}/request", kind.as_str()),
        }
    }
}

impl FromStr for Route {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('/');
        let kind = segments.next().unwrap_or_default();

        if kind == "installation" {
            let change = segments
                .next()
                .ok_or_else(|| RouteError::Incomplete(s.to_string()))?;
            let change = match change {
                "activate" => InstallationChange::Activate,
                "update" => InstallationChange::Update,
                "deactivate" => InstallationChange::Deactivate,
                other => return Err(invalid_change(s, other)),
            };
            ensure_end(s, segments)?;
            return Ok(Route::Installation(change));
        }

        let name = segments
            .next()
            .ok_or_else(|| RouteError::Incomplete(s.to_string()))?;
        if name.is_empty() {
            return Err(RouteError::EmptyName(s.to_string()));
        }
        let change = segments
            .next()
            .ok_or_else(|| RouteError::Incomplete(s.to_string()))?;
        let name = name.to_string();

        let route = match kind {
            "power-item" => Route::power_item(name, operation_change(s, change, OperationKind::PowerItem)?),
            "power-node" => Route::power_node(name, operation_change(s, change, OperationKind::PowerNode)?),
            "power-custom-checkable-item" => Route::power_custom_checkable_item(
                name,
                operation_change(s, change, OperationKind::PowerCustomCheckableItem)?,
            ),
            "power-glance" => {
                let change = match change {
                    "initialize" => GlanceChange::Initialize,
                    "change" => GlanceChange::Change,
                    "dispose" => GlanceChange::Dispose,
                    other => return Err(invalid_change(s, other)),
                };
                Route::power_glance(name, change)
            }
            "page" | "data-source" | "field-source" => {
                if change != "request" {
                    return Err(invalid_change(s, change));
                }
                match kind {
                    "page" => Route::page(name),
                    "data-source" => Route::data_source(name),
                    _ => Route::field_source(name),
                }
            }
            other => return Err(RouteError::UnknownKind(other.to_string())),
        };

        ensure_end(s, segments)?;
        Ok(route)
    }
}

fn operation_change(route: &str, change: &str, kind: OperationKind) -> Result<OperationChange, RouteError> {
    match change {
        "activate" => Ok(OperationChange::Activate),
        "update" => Ok(OperationChange::Update),
        "deactivate" => Ok(OperationChange::Deactivate),
        other => match other.strip_prefix("action:") {
            Some(action) if kind.supports_actions() && !action.is_empty() => {
                Ok(OperationChange::Action(action.to_string()))
            }
            _ => Err(invalid_change(route, other)),
        },
    }
}

fn invalid_change(route: &str, change: &str) -> RouteError {
    RouteError::InvalidChange {
        route: route.to_string(),
        change: change.to_string(),
    }
}

fn ensure_end<'a>(route: &str, mut rest: impl Iterator<Item = &'a str>) -> Result<(), RouteError> {
    match rest.next() {
        None => Ok(()),
        Some(_) => Err(RouteError::TrailingSegments(route.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("installation/activate", Route::Installation(InstallationChange::Activate) ; "installation")]
    #[test_case("power-item/invoice/action:approve", Route::power_item("invoice", OperationChange::Action("approve".into())) ; "item action")]
    #[test_case("power-node/n/deactivate", Route::power_node("n", OperationChange::Deactivate) ; "node")]
    #[test_case("power-custom-checkable-item/c/update", Route::power_custom_checkable_item("c", OperationChange::Update) ; "checkable")]
    #[test_case("power-glance/g/change", Route::power_glance("g", GlanceChange::Change) ; "glance")]
    #[test_case("page/home/request", Route::page("home") ; "page")]
    #[test_case("data-source/d/request", Route::data_source("d") ; "data source")]
    #[test_case("field-source/f/request", Route::field_source("f") ; "field source")]
    fn test_canonical_form(s: &str, route: Route) {
        assert_eq!(s.parse::<Route>().unwrap(), route);
        assert_eq!(route.to_string(), s);
    }

    #[test_case("power-node/n/action:go" ; "node actions unsupported")]
    #[test_case("power-item/i/action:" ; "empty action")]
    #[test_case("power-glance/g/update" ; "glance update")]
    #[test_case("page/p/activate" ; "page lifecycle")]
    #[test_case("installation/request" ; "installation request")]
    fn test_invalid_change(s: &str) {
        assert!(matches!(s.parse::<Route>(), Err(RouteError::InvalidChange { .. })));
    }

    #[test]
    fn test_malformed_routes() {
        assert!(matches!("widget/x/activate".parse::<Route>(), Err(RouteError::UnknownKind(_))));
        assert!(matches!("power-item/x".parse::<Route>(), Err(RouteError::Incomplete(_))));
        assert!(matches!("power-item//activate".parse::<Route>(), Err(RouteError::EmptyName(_))));
        assert!(matches!(
            "page/p/request/extra".parse::<Route>(),
            Err(RouteError::TrailingSegments(_))
        ));
        assert!(matches!(
            "installation/update/x".parse::<Route>(),
            Err(RouteError::TrailingSegments(_))
        ));
    }

    #[test]
    fn test_route_resource_types() {
        assert_eq!(Route::page("p").resource_type(), Some(ResourceType::Page));
        assert_eq!(Route::data_source("d").resource_type(), None);
        assert_eq!(Route::Installation(InstallationChange::Update).name(), None);
        assert_eq!(Route::power_glance("g", GlanceChange::Dispose).name(), Some("g"));
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS request/reply transport
//!
//! Maps subjects onto routes and replies with the handler response:
//!
//! ```text
//! <prefix>.installation.<change>
//! <prefix>.<type>.<name>.<change>
//! <prefix>.power-item.<name>.action.<action>
//! ```
//!
//! The shared-secret `source.token` is checked here, before the event
//! reaches [`PowerApp`]. A mismatch is answered with
//! `{"error": "unauthorized"}`.

use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::errors::{PowerAppError, PowerAppResult};
use crate::event::{normalize_source, Source};
use crate::handlers::PowerApp;
use crate::nats::NatsClient;
use crate::route::{OperationChange, Route, RouteError};

/// Default subject prefix
pub const DEFAULT_SUBJECT_PREFIX: &str = "powerapp";

/// Parse `<prefix>.<route segments>` into a route
pub fn route_from_subject(prefix: &str, subject: &str) -> Result<Route, RouteError> {
    let rest = subject
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('.'))
        .ok_or_else(|| RouteError::UnknownKind(subject.to_string()))?;

    let segments: Vec<&str> = rest.split('.').collect();
    let canonical = match segments.as_slice() {
        [kind, name, "action", action] => format!("{kind}/{name}/action:{action}"),
        segments => segments.join("/"),
    };
    canonical.parse()
}

/// Subject a route is served on
pub fn subject_for(prefix: &str, route: &Route) -> String {
    let subject = match route {
        Route::Operation {
            name,
            change: OperationChange::Action(action),
            ..
        } => {
            let kind = route
                .resource_type()
                .map(|t| t.as_str())
                .unwrap_or_default();
            format!("{kind}.{name}.action.{action}")
        }
        route => route.to_string().replace('/', "."),
    };
    format!("{prefix}.{subject}")
}

/// Check the event's shared secret against the configured one.
///
/// Without a configured token every event is accepted.
pub fn authenticate(source: &Source, expected: Option<&str>) -> PowerAppResult<()> {
    match expected {
        None => Ok(()),
        Some(expected) if source.token.as_deref() == Some(expected) => Ok(()),
        Some(_) => Err(PowerAppError::Unauthorized),
    }
}

/// Serves a [`PowerApp`] over NATS request/reply
pub struct EventServer {
    app: Arc<PowerApp>,
    client: NatsClient,
    prefix: String,
    token: Option<String>,
}

impl EventServer {
    pub fn new(
        app: Arc<PowerApp>,
        client: NatsClient,
        prefix: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            app,
            client,
            prefix: prefix.into(),
            token,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Answer one request body received on `subject`
    pub async fn process(&self, subject: &str, payload: &[u8]) -> Value {
        let route = match route_from_subject(&self.prefix, subject) {
            Ok(route) => route,
            Err(e) => {
                warn!(subject, error = %e, "rejected malformed route");
                return json!({"error": "invalid route"});
            }
        };

        let event: Value = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(subject, error = %e, "rejected malformed payload");
                return json!({"error": "invalid payload"});
            }
        };

        let source = event.get("source").cloned().unwrap_or(Value::Null);
        let authorized = normalize_source(&source)
            .map_err(PowerAppError::from)
            .and_then(|source| authenticate(&source, self.token.as_deref()));
        if let Err(e) = authorized {
            warn!(subject, error = %e, "rejected event");
            return json!({"error": "unauthorized"});
        }

        self.app.handle(&route, event).await
    }

    /// Serve until the subscription closes; each request runs on its own task
    pub async fn run(self: Arc<Self>) -> PowerAppResult<()> {
        let filter = format!("{}.>", self.prefix);
        let mut subscriber = self.client.subscribe(&filter).await?;
        info!(subject = %filter, "serving power app events");

        while let Some(message) = subscriber.next().await {
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                let subject = message.subject.to_string();
                let response = server.process(&subject, &message.payload).await;

                match &message.reply {
                    Some(reply) => {
                        if let Err(e) = server.client.publish(reply, &response).await {
                            error!(subject = %subject, error = %e, "failed to send reply");
                        }
                    }
                    None => debug!(subject = %subject, "event without reply subject"),
                }
            });
        }

        info!(subject = %filter, "subscription closed");
        Ok(())
    }
}

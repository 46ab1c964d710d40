// Copyright (c) 2025 - Cowboy AI, Inc.
//! `data-source/*` and `field-source/*` events
//!
//! Sources are stateless lookups: the version picks the handler, but there
//! is no record to lock, migrate or persist.

use serde_json::{json, Value};

use super::{respond, PowerApp};
use crate::definition::SourceParams;
use crate::errors::PowerAppResult;
use crate::event::{parse_event, Event, SourceEvent};
use crate::route::{RequestKind, Route};
use crate::version::MigrationStep;

impl PowerApp {
    pub(crate) async fn handle_request(
        &self,
        route: &Route,
        kind: RequestKind,
        name: &str,
        event: Value,
    ) -> PowerAppResult<Value> {
        if kind == RequestKind::Page {
            return self.handle_page(route, name, event).await;
        }

        let Event { source, payload } = parse_event::<SourceEvent>(event)?;
        let Some((_, coming)) = self.coming_version(route, &source)? else {
            return Ok(json!({}));
        };

        let resolution = self.registry.resolve::<_, MigrationStep>(
            Some(&coming),
            None,
            |definition| {
                definition
                    .requests(kind)
                    .and_then(|sources| sources.get(name))
                    .and_then(|source| source.request.clone())
            },
            None,
        )?;

        let Some(handler) = resolution.and_then(|resolution| resolution.change) else {
            return Ok(json!({}));
        };

        let context = self.contexts().build_source_context(&source).await?;
        let params = SourceParams {
            payload: payload.payload,
        };
        respond(handler.call(context, params).await)
    }
}

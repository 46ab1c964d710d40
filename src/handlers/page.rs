// Copyright (c) 2025 - Cowboy AI, Inc.
//! `page/*` events
//!
//! A page request naming a user runs the handler once with that user's
//! storage. Without a user it is broadcast: the handler runs once per user
//! of the installation and the response is the array of their results.

use serde_json::{json, Value};

use super::{respond, PowerApp};
use crate::definition::PageParams;
use crate::errors::PowerAppResult;
use crate::event::{parse_event, Event, PageEvent};
use crate::model::resources::to_document;
use crate::model::{PageModel, ResourceKey, ResourceType};
use crate::route::Route;

impl PowerApp {
    pub(crate) async fn handle_page(
        &self,
        route: &Route,
        name: &str,
        event: Value,
    ) -> PowerAppResult<Value> {
        let Event { source, payload } = parse_event::<PageEvent>(event)?;
        let key = ResourceKey::new(ResourceType::Page, &payload.id);

        let Some(prepared) = self
            .prepare(route, &source, key.clone(), |definition| {
                definition
                    .pages
                    .get(name)
                    .and_then(|page| page.request.clone())
            })
            .await?
        else {
            return Ok(json!({}));
        };
        let version = prepared.version.clone();

        let document = to_document(&PageModel {
            id: payload.id.clone(),
            installation: source.installation_id().map(str::to_string),
            ..Default::default()
        })?;
        let committed = self.commit(prepared, document).await?;

        let Some(handler) = committed.handler else {
            return Ok(json!({}));
        };

        if let Some(user) = &payload.user {
            let context = self
                .contexts()
                .build_page_context(&source, key, committed.storage, Some(user), &version)
                .await?;
            let params = PageParams {
                user: Some(user.clone()),
                payload: payload.rest,
            };
            return respond(handler.call(context, params).await);
        }

        let contexts = self
            .contexts()
            .build_page_contexts(&source, key, committed.storage, &version)
            .await?;
        if contexts.is_empty() {
            return Ok(json!({}));
        }

        let mut responses = Vec::with_capacity(contexts.len());
        for context in contexts {
            let params = PageParams {
                user: context.user.as_ref().map(|u| u.user.clone()),
                payload: payload.rest.clone(),
            };
            responses.push(respond(handler.call(context, params).await)?);
        }
        Ok(Value::Array(responses))
    }
}

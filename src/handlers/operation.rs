// Copyright (c) 2025 - Cowboy AI, Inc.
//! `power-item/*`, `power-node/*` and `power-custom-checkable-item/*` events

use serde_json::{json, Value};

use super::{respond, PowerApp};
use crate::definition::OperationParams;
use crate::errors::PowerAppResult;
use crate::event::{parse_event, Event, OperationEvent};
use crate::model::resources::to_document;
use crate::model::{OperationModel, ResourceKey};
use crate::route::{OperationChange, OperationKind, Route};

impl PowerApp {
    pub(crate) async fn handle_operation(
        &self,
        route: &Route,
        kind: OperationKind,
        name: &str,
        change: &OperationChange,
        event: Value,
    ) -> PowerAppResult<Value> {
        let Event { source, payload } = parse_event::<OperationEvent>(event)?;
        let key = ResourceKey::new(kind.resource_type(), &payload.token);

        let Some(prepared) = self
            .prepare(route, &source, key.clone(), |definition| {
                definition
                    .operations(kind)
                    .get(name)
                    .and_then(|operation| operation.handler(change))
                    .cloned()
            })
            .await?
        else {
            return Ok(json!({}));
        };

        let document = to_document(&OperationModel {
            resource_type: kind.resource_type(),
            token: payload.token.clone(),
            installation: source.installation_id().map(str::to_string),
            version: None,
            storage: None,
        })?;
        let committed = self.commit(prepared, document).await?;

        let Some(handler) = committed.handler else {
            return Ok(json!({}));
        };

        let context = self
            .contexts()
            .build_operation_context(&source, key, committed.storage)
            .await?;
        let params = OperationParams {
            inputs: payload.inputs,
            configs: payload.configs,
            action: match change {
                OperationChange::Action(action) => Some(action.clone()),
                _ => None,
            },
        };

        respond(handler.call(context, params).await)
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.
//! `installation/*` events

use serde_json::{json, Value};

use super::{respond, PowerApp};
use crate::errors::PowerAppResult;
use crate::event::{parse_event, Event, InstallationEvent};
use crate::model::resources::{from_document, to_document};
use crate::model::{Document, InstallationModel, ResourceKey};
use crate::route::{InstallationChange, Route};

impl PowerApp {
    pub(crate) async fn handle_installation(
        &self,
        route: &Route,
        change: InstallationChange,
        event: Value,
    ) -> PowerAppResult<Value> {
        let Event { source, payload } = parse_event::<InstallationEvent>(event)?;
        let installation = source.require_installation()?.to_string();
        let key = ResourceKey::installation(&installation);

        let Some(prepared) = self
            .prepare(route, &source, key, |definition| {
                definition
                    .installation
                    .as_ref()
                    .and_then(|installation| installation.handler(change))
                    .cloned()
            })
            .await?
        else {
            return Ok(json!({}));
        };

        let document = installation_document(&installation, change, &payload)?;
        let committed = self.commit(prepared, document).await?;

        let mut record: InstallationModel = from_document(committed.record)?;
        record.storage = Some(committed.storage);

        let Some(handler) = committed.handler else {
            return Ok(json!({}));
        };

        let context = self.contexts().build_installation_context(&source, &record);
        respond(handler.call(context, payload).await)
    }
}

/// Fields an installation event may write.
///
/// Deactivation only flips `disabled`; it never clears configs or users.
fn installation_document(
    installation: &str,
    change: InstallationChange,
    payload: &InstallationEvent,
) -> PowerAppResult<Document> {
    if change == InstallationChange::Deactivate {
        let mut document = Document::new();
        document.insert("disabled".to_string(), Value::Bool(true));
        return Ok(document);
    }

    let model = InstallationModel {
        installation: installation.to_string(),
        configs: payload.configs.clone(),
        resources: payload.resources.clone(),
        users: payload.users.clone(),
        access_token: payload.access_token.clone(),
        disabled: false,
        ..Default::default()
    };
    Ok(to_document(&model)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlatformUser;

    #[test]
    fn test_deactivate_only_disables() {
        let payload = InstallationEvent {
            users: vec![PlatformUser::new("u-1")],
            ..Default::default()
        };

        let document =
            installation_document("i-1", InstallationChange::Deactivate, &payload).unwrap();

        assert_eq!(Value::Object(document), json!({"disabled": true}));
    }

    #[test]
    fn test_activate_writes_allow_listed_fields() {
        let payload = InstallationEvent {
            access_token: Some("secret".to_string()),
            users: vec![PlatformUser::new("u-1")],
            ..Default::default()
        };

        let document = installation_document("i-1", InstallationChange::Activate, &payload).unwrap();

        assert_eq!(document["accessToken"], json!("secret"));
        assert_eq!(document["users"], json!([{"id": "u-1"}]));
        assert_eq!(document["disabled"], json!(false));
    }
}

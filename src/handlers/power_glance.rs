// Copyright (c) 2025 - Cowboy AI, Inc.
//! `power-glance/*` events
//!
//! Glances carry a clock. A `change` whose clock is not exactly one past the
//! stored clock means updates were missed: the glance is re-synchronized
//! from the platform before the handler runs. If that call fails the event
//! is dropped with `{}` and nothing is written.

use serde_json::{json, Map, Value};

use super::{respond, PowerApp};
use crate::api::{Credential, GlanceSnapshot};
use crate::definition::GlanceParams;
use crate::errors::PowerAppResult;
use crate::event::{parse_event, Event, GlanceEvent};
use crate::logging::LogLevel;
use crate::model::resources::to_document;
use crate::model::{Document, PowerGlanceModel, ResourceKey, ResourceType};
use crate::route::{GlanceChange, Route};

impl PowerApp {
    pub(crate) async fn handle_power_glance(
        &self,
        route: &Route,
        name: &str,
        change: GlanceChange,
        event: Value,
    ) -> PowerAppResult<Value> {
        let Event { source, payload } = parse_event::<GlanceEvent>(event)?;
        let key = ResourceKey::new(ResourceType::PowerGlance, &payload.token);

        let Some(prepared) = self
            .prepare(route, &source, key.clone(), |definition| {
                definition
                    .power_glances
                    .get(name)
                    .and_then(|glance| glance.handler(change))
                    .cloned()
            })
            .await?
        else {
            return Ok(json!({}));
        };

        let mut state = GlanceSnapshot {
            resources: payload.resources,
            configs: payload.configs,
            clock: payload.clock,
        };

        let saved_clock = prepared.existing().map(stored_clock);
        if change == GlanceChange::Change && has_gap(saved_clock, state.clock) {
            self.logger().log(
                LogLevel::Info,
                "glance clock gap, reinitializing",
                &[
                    ("resource", key.to_string()),
                    ("saved", saved_clock.unwrap_or_default().to_string()),
                    ("incoming", state.clock.to_string()),
                ],
            );

            let api = self
                .contexts()
                .api_for(&source, Credential::Operation(payload.token.clone()));
            match api.initialize_power_glance().await {
                Ok(snapshot) => state = snapshot,
                Err(e) => {
                    self.logger().log(
                        LogLevel::Warn,
                        "glance reinitialize failed, event dropped",
                        &[("resource", key.to_string()), ("error", e.to_string())],
                    );
                    return Ok(json!({}));
                }
            }
        }

        let document = glance_document(&payload.token, source.installation_id(), change, &state)?;
        let committed = self.commit(prepared, document).await?;

        let Some(handler) = committed.handler else {
            return Ok(json!({}));
        };

        let context = self
            .contexts()
            .build_power_glance_context(&source, key, committed.storage, state.configs.clone())
            .await?;
        let params = GlanceParams {
            resources: state.resources,
            configs: state.configs,
            clock: state.clock,
        };

        respond(handler.call(context, params).await)
    }
}

fn stored_clock(record: &Document) -> u64 {
    record.get("clock").and_then(Value::as_u64).unwrap_or_default()
}

/// Whether `incoming` does not directly follow `saved`
fn has_gap(saved: Option<u64>, incoming: u64) -> bool {
    match saved {
        Some(saved) => saved.checked_add(1) != Some(incoming),
        None => false,
    }
}

/// Fields a glance event may write; disposal only flips `disposed`
fn glance_document(
    token: &str,
    installation: Option<&str>,
    change: GlanceChange,
    state: &GlanceSnapshot,
) -> PowerAppResult<Document> {
    if change == GlanceChange::Dispose {
        let mut document = Map::new();
        document.insert("disposed".to_string(), Value::Bool(true));
        return Ok(document);
    }

    Ok(to_document(&PowerGlanceModel {
        token: token.to_string(),
        installation: installation.map(str::to_string),
        configs: state.configs.clone(),
        clock: state.clock,
        ..Default::default()
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(None, 7 => false ; "first sighting")]
    #[test_case(Some(3), 4 => false ; "next tick")]
    #[test_case(Some(3), 5 => true ; "skipped tick")]
    #[test_case(Some(3), 3 => true ; "replayed tick")]
    #[test_case(Some(3), 1 => true ; "clock went back")]
    #[test_case(Some(u64::MAX), 0 => true ; "saturated clock")]
    fn test_gap_detection(saved: Option<u64>, incoming: u64) -> bool {
        has_gap(saved, incoming)
    }

    #[test]
    fn test_dispose_only_flags() {
        let document = glance_document(
            "tok",
            Some("i-1"),
            GlanceChange::Dispose,
            &GlanceSnapshot::default(),
        )
        .unwrap();

        assert_eq!(Value::Object(document), json!({"disposed": true}));
    }

    #[test]
    fn test_change_writes_clock_and_configs() {
        let state = GlanceSnapshot {
            clock: 4,
            configs: json!({"limit": 3}).as_object().cloned().unwrap_or_default(),
            ..Default::default()
        };

        let document = glance_document("tok", None, GlanceChange::Change, &state).unwrap();

        assert_eq!(document["clock"], json!(4));
        assert_eq!(document["configs"], json!({"limit": 3}));
        assert_eq!(document["disposed"], json!(false));
    }
}

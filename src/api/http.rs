// Copyright (c) 2025 - Cowboy AI, Inc.
//! reqwest implementation of [`PlatformApi`]
//!
//! Calls are `POST {base}/api/v1{path}` with a JSON body. Responses use a
//! `{"data": ...}` envelope on success and `{"error": {"code", "message"}}`
//! on failure.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{ApiError, Credential, PlatformApi, PlatformApiFactory};

const ACCESS_TOKEN_HEADER: &str = "x-access-token";
const OPERATION_TOKEN_HEADER: &str = "x-operation-token";

/// Configuration for the HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpApiConfig {
    /// Platform base URL; overrides the `source.url` of events when set
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Shares one connection pool between all credential-bound clients
#[derive(Debug, Clone)]
pub struct HttpPlatformApiFactory {
    config: HttpApiConfig,
    client: Client,
}

impl HttpPlatformApiFactory {
    pub fn new(config: HttpApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn client_for(&self, base_url: Option<&str>, credential: Credential) -> HttpPlatformApi {
        let base_url = self
            .config
            .base_url
            .clone()
            .or_else(|| base_url.map(str::to_string));

        HttpPlatformApi {
            client: self.client.clone(),
            base_url,
            credential,
        }
    }
}

impl PlatformApiFactory for HttpPlatformApiFactory {
    fn create(&self, base_url: Option<&str>, credential: Credential) -> Arc<dyn PlatformApi> {
        Arc::new(self.client_for(base_url, credential))
    }
}

/// Platform client bound to one credential
#[derive(Debug, Clone)]
pub struct HttpPlatformApi {
    client: Client,
    base_url: Option<String>,
    credential: Credential,
}

#[async_trait]
impl PlatformApi for HttpPlatformApi {
    fn credential(&self) -> &Credential {
        &self.credential
    }

    async fn call(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| ApiError::Request("no platform URL for this event".to_string()))?;
        let url = endpoint(base_url, path);

        let mut request = self.client.post(&url).json(&body);
        request = match &self.credential {
            Credential::Access(token) => request.header(ACCESS_TOKEN_HEADER, token),
            Credential::Operation(token) => request.header(OPERATION_TOKEN_HEADER, token),
            Credential::Anonymous => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        debug!(path, status, "platform call finished");
        decode_envelope(status, &text)
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    format!("{}/api/v1/{path}", base_url.trim_end_matches('/'))
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<RemoteError>,
}

#[derive(Deserialize)]
struct RemoteError {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    message: String,
}

/// Unwrap a platform response body
fn decode_envelope(status: u16, body: &str) -> Result<Value, ApiError> {
    let envelope = serde_json::from_str::<Envelope>(body);

    if let Ok(Envelope {
        error: Some(error), ..
    }) = &envelope
    {
        let code = match &error.code {
            Value::String(code) => code.clone(),
            Value::Null => status.to_string(),
            other => other.to_string(),
        };
        return Err(ApiError::Remote {
            code,
            message: error.message.clone(),
        });
    }

    if !(200..300).contains(&status) {
        return Err(ApiError::Status {
            status,
            body: body.to_string(),
        });
    }

    envelope
        .map(|envelope| envelope.data)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("https://p.example/", "/power-glance/initialize"),
            "https://p.example/api/v1/power-glance/initialize"
        );
        assert_eq!(endpoint("https://p.example", "users"), "https://p.example/api/v1/users");
    }

    #[test]
    fn test_decode_success() {
        let data = decode_envelope(200, r#"{"data": {"clock": 3}}"#).unwrap();
        assert_eq!(data, json!({"clock": 3}));

        assert_eq!(decode_envelope(204, "{}").unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_error_envelope() {
        let err = decode_envelope(400, r#"{"error": {"code": "invalid_token", "message": "expired"}}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Remote {
                code: "invalid_token".to_string(),
                message: "expired".to_string()
            }
        );

        let err = decode_envelope(200, r#"{"error": {"code": 17, "message": "no"}}"#).unwrap_err();
        assert!(matches!(err, ApiError::Remote { code, .. } if code == "17"));
    }

    #[test]
    fn test_decode_bad_status_without_envelope() {
        let err = decode_envelope(502, "Bad Gateway").unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 502,
                body: "Bad Gateway".to_string()
            }
        );
    }

    #[test]
    fn test_decode_garbage_on_success() {
        assert!(matches!(decode_envelope(200, "<html>"), Err(ApiError::Decode(_))));
    }

    #[tokio::test]
    async fn test_missing_base_url_fails_before_sending() {
        let factory = HttpPlatformApiFactory::new(HttpApiConfig::default()).unwrap();
        let api = factory.create(None, Credential::Anonymous);

        let result = api.call("/anything", json!({})).await;
        assert!(matches!(result, Err(ApiError::Request(_))));
    }

    #[test]
    fn test_configured_base_url_wins() {
        let factory = HttpPlatformApiFactory::new(HttpApiConfig {
            base_url: Some("https://override.example".to_string()),
            timeout_secs: 5,
        })
        .unwrap();

        let api = factory.client_for(Some("https://event.example"), Credential::Access("t".into()));
        assert_eq!(api.base_url.as_deref(), Some("https://override.example"));

        let factory = HttpPlatformApiFactory::new(HttpApiConfig::default()).unwrap();
        let api = factory.client_for(Some("https://event.example"), Credential::Anonymous);
        assert_eq!(api.base_url.as_deref(), Some("https://event.example"));
    }
}

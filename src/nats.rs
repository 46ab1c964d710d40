// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS connection for the event transport and the key-value store

use async_nats::{jetstream, Client, ConnectOptions, Subscriber};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{PowerAppError, PowerAppResult};

/// Configuration for NATS connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    #[serde(with = "secs")]
    pub connect_timeout: Duration,
    /// Request timeout
    #[serde(with = "secs")]
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "powerapp".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Connected NATS client
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    pub async fn connect(config: &NatsConfig) -> PowerAppResult<Self> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| PowerAppError::NatsConnection(e.to_string()))?;

        info!(servers = ?config.servers, "connected to NATS");
        Ok(Self { client })
    }

    /// Publish a JSON message, e.g. a reply to a request
    pub async fn publish<T: Serialize>(&self, subject: &str, message: &T) -> PowerAppResult<()> {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| PowerAppError::NatsPublish(e.to_string()))?;

        debug!(subject, "published");
        Ok(())
    }

    pub async fn subscribe(&self, subject: &str) -> PowerAppResult<Subscriber> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| PowerAppError::NatsSubscribe(e.to_string()))?;

        info!(subject, "subscribed");
        Ok(subscriber)
    }

    /// Send a JSON request and decode the JSON reply
    pub async fn request<T, R>(&self, subject: &str, request: &T) -> PowerAppResult<R>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let payload = serde_json::to_vec(request)?;

        let response = self
            .client
            .request(subject.to_string(), payload.into())
            .await
            .map_err(|e| PowerAppError::NatsPublish(e.to_string()))?;

        Ok(serde_json::from_slice(&response.payload)?)
    }

    /// JetStream context on this connection, for the key-value backend
    pub fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = NatsConfig::default();
        assert_eq!(config.servers, vec!["nats://localhost:4222"]);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_config_timeouts_are_seconds() {
        let config: NatsConfig = serde_json::from_value(json!({
            "servers": ["nats://a:4222", "nats://b:4222"],
            "name": "svc",
            "connect_timeout": 3,
            "request_timeout": 1
        }))
        .unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(1));
        assert_eq!(serde_json::to_value(&config).unwrap()["connect_timeout"], json!(3));
    }

    #[tokio::test]
    #[ignore] // Requires NATS server
    async fn test_connect_and_jetstream() {
        let client = NatsClient::connect(&NatsConfig::default()).await.unwrap();
        let _ = client.jetstream();
    }
}

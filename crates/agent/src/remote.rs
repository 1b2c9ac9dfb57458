use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use farmlink_core::config::AgentConfig;
use farmlink_core::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemoteQuery {
    pub user_id: String,
    pub session_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn stream_query(&self, query: &RemoteQuery) -> Result<String, ApplicationError>;
}

/// Client for a hosted reasoning engine that answers with one JSON event per
/// line.
pub struct RemoteReasoningEngine {
    client: Client,
    url: String,
}

impl RemoteReasoningEngine {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ApplicationError> {
        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            ApplicationError::Configuration(format!("reasoning engine http client: {error}"))
        })?;
        Ok(Self { client, url: url.into() })
    }

    /// `None` when no engine URL is configured.
    pub fn from_config(config: &AgentConfig) -> Result<Option<Self>, ApplicationError> {
        config
            .engine_url
            .as_deref()
            .map(|url| Self::new(url, Duration::from_secs(config.timeout_secs)))
            .transpose()
    }
}

#[async_trait]
impl ReasoningEngine for RemoteReasoningEngine {
    async fn stream_query(&self, query: &RemoteQuery) -> Result<String, ApplicationError> {
        let response = self.client.post(&self.url).json(query).send().await.map_err(|error| {
            warn!(
                event_name = "agent.remote.request_failed",
                user_id = %query.user_id,
                error = %error,
                "reasoning engine request failed"
            );
            ApplicationError::Upstream(format!("reasoning engine request failed: {error}"))
        })?;

        if !response.status().is_success() {
            return Err(ApplicationError::Upstream(format!(
                "reasoning engine returned {}",
                response.status()
            )));
        }

        let body = response.text().await.map_err(|error| {
            ApplicationError::Upstream(format!("failed to read reasoning engine stream: {error}"))
        })?;
        let reply = aggregate_events(&body)?;
        info!(
            event_name = "agent.remote.completed",
            user_id = %query.user_id,
            session_id = %query.session_id,
            "reasoning engine replied"
        );
        Ok(reply)
    }
}

/// Concatenates the text parts of every streamed event in arrival order.
/// Lines that are not JSON objects are skipped.
pub fn aggregate_events(body: &str) -> Result<String, ApplicationError> {
    let mut reply = String::new();

    for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let event: Value = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(error) => {
                warn!(
                    event_name = "agent.remote.bad_event",
                    error = %error,
                    "skipping undecodable stream event"
                );
                continue;
            }
        };

        let parts = event
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for text in parts.iter().filter_map(|part| part.get("text").and_then(Value::as_str)) {
            reply.push_str(text);
        }
    }

    if reply.trim().is_empty() {
        return Err(ApplicationError::Upstream("reasoning engine returned no text".to_string()));
    }
    Ok(reply)
}

//! Outbound HTTP adapters for community chat: translation and push fan-out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};

use farmlink_core::community::{NoopNotifier, NoopTranslator, Notifier, Translator};
use farmlink_core::config::CommunityConfig;
use farmlink_core::domain::community::CommunityMessage;
use farmlink_core::errors::ApplicationError;

fn http_client(timeout_secs: u64) -> Result<Client, ApplicationError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|error| ApplicationError::Configuration(format!("community http client: {error}")))
}

/// Translation endpoint speaking the `{q, target, format}` request shape and
/// answering with `data.translations[0].translatedText`.
pub struct HttpTranslator {
    client: Client,
    url: String,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'static str,
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApplicationError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&TranslateRequest { q: text, target: target_language, format: "text" });
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.expose_secret())]);
        }

        let response = request.send().await.map_err(|error| {
            ApplicationError::Upstream(format!("translation request failed: {error}"))
        })?;
        if !response.status().is_success() {
            return Err(ApplicationError::Upstream(format!(
                "translation service returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(|error| {
            ApplicationError::Upstream(format!("failed to decode translation response: {error}"))
        })?;
        translated_text(&body).ok_or_else(|| {
            ApplicationError::Upstream("translation response carried no text".to_string())
        })
    }
}

fn translated_text(body: &Value) -> Option<String> {
    body.pointer("/data/translations/0/translatedText")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Push gateway that fans a message out to every device subscribed to a
/// topic.
pub struct HttpPushNotifier {
    client: Client,
    url: String,
    api_key: Option<SecretString>,
}

#[async_trait]
impl Notifier for HttpPushNotifier {
    async fn notify(&self, topic: &str, message: &CommunityMessage) -> Result<(), ApplicationError> {
        let mut request = self.client.post(&self.url).json(&push_payload(topic, message));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| ApplicationError::Upstream(format!("push request failed: {error}")))?;
        if !response.status().is_success() {
            return Err(ApplicationError::Upstream(format!(
                "push gateway returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

fn push_payload(topic: &str, message: &CommunityMessage) -> Value {
    let body = if message.text.trim().is_empty() { "Sent a voice message" } else { &message.text };
    json!({
        "topic": topic,
        "notification": {
            "title": format!("New message from {}", message.sender_name),
            "body": body,
        },
        "data": {
            "id": message.id.0,
            "senderId": message.sender_id.0,
            "senderName": message.sender_name,
            "text": message.text,
            "text_ta": message.text_ta,
            "text_hi": message.text_hi,
            "audio_url": message.audio_url,
        },
    })
}

/// Builds the configured adapters, falling back to no-ops for endpoints that
/// are not configured.
pub fn community_adapters(
    config: &CommunityConfig,
) -> Result<(Arc<dyn Translator>, Arc<dyn Notifier>), ApplicationError> {
    let translator: Arc<dyn Translator> = match &config.translation_url {
        Some(url) => Arc::new(HttpTranslator {
            client: http_client(config.timeout_secs)?,
            url: url.clone(),
            api_key: config.translation_api_key.clone(),
        }),
        None => Arc::new(NoopTranslator),
    };
    let notifier: Arc<dyn Notifier> = match &config.push_url {
        Some(url) => Arc::new(HttpPushNotifier {
            client: http_client(config.timeout_secs)?,
            url: url.clone(),
            api_key: config.push_api_key.clone(),
        }),
        None => Arc::new(NoopNotifier),
    };
    Ok((translator, notifier))
}

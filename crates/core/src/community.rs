//! Community chat: persistence plus best-effort translation and push fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::community::{CommunityMessage, CommunityMessageId};
use crate::domain::session::UserId;
use crate::errors::ApplicationError;
use crate::market::store::StoreError;

pub const TAMIL: &str = "ta";
pub const HINDI: &str = "hi";

#[async_trait]
pub trait CommunityStore: Send + Sync {
    async fn insert_message(&self, message: &CommunityMessage) -> Result<(), StoreError>;

    /// The newest `limit` messages, oldest first.
    async fn recent_messages(&self, limit: u32) -> Result<Vec<CommunityMessage>, StoreError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ApplicationError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, topic: &str, message: &CommunityMessage) -> Result<(), ApplicationError>;
}

/// Translator used when no translation endpoint is configured.
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, _text: &str, target_language: &str) -> Result<String, ApplicationError> {
        Err(ApplicationError::Upstream(format!("no translator configured for `{target_language}`")))
    }
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _topic: &str, _message: &CommunityMessage) -> Result<(), ApplicationError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCommunityMessage {
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    pub audio_url: Option<String>,
}

#[derive(Clone)]
pub struct CommunityService {
    store: Arc<dyn CommunityStore>,
    translator: Arc<dyn Translator>,
    notifier: Arc<dyn Notifier>,
    topic: String,
    history_limit: u32,
}

impl CommunityService {
    pub fn new(
        store: Arc<dyn CommunityStore>,
        translator: Arc<dyn Translator>,
        notifier: Arc<dyn Notifier>,
        topic: impl Into<String>,
        history_limit: u32,
    ) -> Self {
        Self { store, translator, notifier, topic: topic.into(), history_limit }
    }

    pub async fn recent(&self) -> Result<Vec<CommunityMessage>, ApplicationError> {
        Ok(self.store.recent_messages(self.history_limit).await?)
    }

    /// Translates, stores and then announces a message. Translation and push
    /// failures are logged; only the store write can fail the call.
    pub async fn post(
        &self,
        message: NewCommunityMessage,
    ) -> Result<CommunityMessage, ApplicationError> {
        if message.sender_id.0.trim().is_empty() || message.sender_name.trim().is_empty() {
            return Err(ApplicationError::validation("senderId and senderName are required."));
        }
        let has_audio = message.audio_url.as_deref().is_some_and(|url| !url.trim().is_empty());
        if message.text.trim().is_empty() && !has_audio {
            return Err(ApplicationError::validation("Message text or audio_url is required."));
        }

        let (text_ta, text_hi) = if message.text.trim().is_empty() {
            (None, None)
        } else {
            (self.translated(&message.text, TAMIL).await, self.translated(&message.text, HINDI).await)
        };

        let stored = CommunityMessage {
            id: CommunityMessageId(Uuid::new_v4().to_string()),
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            text: message.text,
            text_ta,
            text_hi,
            audio_url: message.audio_url.filter(|url| !url.trim().is_empty()),
            created_at: Utc::now(),
        };
        self.store.insert_message(&stored).await?;
        info!(
            event_name = "community.message.created",
            message_id = %stored.id.0,
            sender_id = %stored.sender_id.0,
            "community message stored"
        );

        if let Err(error) = self.notifier.notify(&self.topic, &stored).await {
            warn!(
                event_name = "community.push.failed",
                message_id = %stored.id.0,
                topic = %self.topic,
                error = %error,
                "push notification failed"
            );
        }

        Ok(stored)
    }

    async fn translated(&self, text: &str, language: &str) -> Option<String> {
        match self.translator.translate(text, language).await {
            Ok(translation) => Some(translation),
            Err(error) => {
                warn!(
                    event_name = "community.translation.failed",
                    language,
                    error = %error,
                    "translation failed; storing message without it"
                );
                None
            }
        }
    }
}

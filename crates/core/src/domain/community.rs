use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::session::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommunityMessageId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityMessage {
    pub id: CommunityMessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    pub text_ta: Option<String>,
    pub text_hi: Option<String>,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

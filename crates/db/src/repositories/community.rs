use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use farmlink_core::community::CommunityStore;
use farmlink_core::domain::community::{CommunityMessage, CommunityMessageId};
use farmlink_core::domain::session::UserId;
use farmlink_core::market::StoreError;

use super::{backend, column, format_timestamp, parse_timestamp};
use crate::DbPool;

pub struct SqlCommunityStore {
    pool: DbPool,
}

impl SqlCommunityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommunityStore for SqlCommunityStore {
    async fn insert_message(&self, message: &CommunityMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO community_message (
                id, sender_id, sender_name, text, text_ta, text_hi, audio_url, created_at, seq
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM community_message))",
        )
        .bind(&message.id.0)
        .bind(&message.sender_id.0)
        .bind(&message.sender_name)
        .bind(&message.text)
        .bind(message.text_ta.as_deref())
        .bind(message.text_hi.as_deref())
        .bind(message.audio_url.as_deref())
        .bind(format_timestamp(&message.created_at))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn recent_messages(&self, limit: u32) -> Result<Vec<CommunityMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, sender_id, sender_name, text, text_ta, text_hi, audio_url, created_at
             FROM (
                SELECT * FROM community_message ORDER BY seq DESC LIMIT ?
             )
             ORDER BY seq ASC",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(message_from_row).collect()
    }
}

fn message_from_row(row: &SqliteRow) -> Result<CommunityMessage, StoreError> {
    let created_at: String = column(row, "created_at")?;
    Ok(CommunityMessage {
        id: CommunityMessageId(column(row, "id")?),
        sender_id: UserId(column(row, "sender_id")?),
        sender_name: column(row, "sender_name")?,
        text: column(row, "text")?,
        text_ta: column(row, "text_ta")?,
        text_hi: column(row, "text_hi")?,
        audio_url: column(row, "audio_url")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

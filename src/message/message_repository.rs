use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::message_models::{AuthoredMessage, Message};
use crate::error::Result;

/// Durable storage, ordered retrieval and status transitions of messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a message with status `sent`.
    async fn append_message(
        &self,
        conversation_id: i64,
        user_id: Uuid,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Message>;

    /// Non-deleted messages with their authors, ordered by `(sent_at, id)`
    /// ascending.
    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<AuthoredMessage>>;

    async fn latest_message(&self, conversation_id: i64) -> Result<Option<AuthoredMessage>>;

    /// Moves every `sent` message not authored by `reader_id` to `read` in a
    /// single statement and returns how many rows changed.
    async fn mark_others_read(&self, conversation_id: i64, reader_id: Uuid) -> Result<u64>;

    /// Live count of `sent` messages authored by someone other than `for_user`.
    async fn count_unread(&self, conversation_id: i64, for_user: Uuid) -> Result<i64>;
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, user_id, content, image_url, sent_at, status";

const AUTHORED_SELECT: &str = "SELECT m.id, m.conversation_id, m.user_id, m.content, m.image_url,
            m.sent_at, m.status,
            COALESCE(u.username, '') AS sender_name, u.avatar_ref AS sender_avatar_ref
     FROM messages m
     LEFT JOIN users u ON u.id = m.user_id";

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn append_message(
        &self,
        conversation_id: i64,
        user_id: Uuid,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (conversation_id, user_id, content, image_url)
             VALUES ($1, $2, $3, $4)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(conversation_id)
        .bind(user_id)
        .bind(content)
        .bind(image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<AuthoredMessage>> {
        let messages = sqlx::query_as::<_, AuthoredMessage>(&format!(
            "{AUTHORED_SELECT}
             WHERE m.conversation_id = $1 AND m.status <> 'deleted'
             ORDER BY m.sent_at ASC, m.id ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn latest_message(&self, conversation_id: i64) -> Result<Option<AuthoredMessage>> {
        let message = sqlx::query_as::<_, AuthoredMessage>(&format!(
            "{AUTHORED_SELECT}
             WHERE m.conversation_id = $1 AND m.status <> 'deleted'
             ORDER BY m.sent_at DESC, m.id DESC
             LIMIT 1"
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn mark_others_read(&self, conversation_id: i64, reader_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages
             SET status = 'read'
             WHERE conversation_id = $1 AND user_id <> $2 AND status = 'sent'",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_unread(&self, conversation_id: i64, for_user: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = $1 AND user_id <> $2 AND status = 'sent'",
        )
        .bind(conversation_id)
        .bind(for_user)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

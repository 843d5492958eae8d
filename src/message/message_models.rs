use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::user::{AvatarResolver, PublicProfile};

/// Lifecycle of a message. Starts at `Sent`; `Read` and `Deleted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "message_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Read,
    Deleted,
}

// Postgres enforces the same rule through `WHERE status = 'sent'` guards.
#[cfg(test)]
impl MessageStatus {
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (MessageStatus::Sent, MessageStatus::Read) | (MessageStatus::Sent, MessageStatus::Deleted)
        )
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Read => write!(f, "read"),
            MessageStatus::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub user_id: Uuid,
    pub content: String,
    /// Attachment reference handed over by the media subsystem.
    pub image_url: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub status: MessageStatus,
}

/// A message row joined with its author from the user directory.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AuthoredMessage {
    #[sqlx(flatten)]
    pub message: Message,
    pub sender_name: String,
    pub sender_avatar_ref: Option<String>,
}

impl AuthoredMessage {
    pub fn into_view(self, avatars: &dyn AvatarResolver) -> MessageView {
        MessageView {
            sender: PublicProfile {
                id: self.message.user_id,
                name: self.sender_name,
                avatar_url: avatars.resolve(self.sender_avatar_ref.as_deref()),
            },
            message: self.message,
        }
    }
}

/// What listings return: the message plus who wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender: PublicProfile,
}

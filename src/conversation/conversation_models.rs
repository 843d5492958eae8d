use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{message::MessageView, user::PublicProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "conversation_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Individual,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "participant_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Active,
    Left,
    Banned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Conversation {
    pub id: i64,
    pub name: Option<String>,
    pub kind: ConversationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Participant {
    pub conversation_id: i64,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub status: ParticipantStatus,
}

impl Participant {
    pub fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active
    }
}

/// Result of the race-safe individual creation in the store.
#[derive(Debug, Clone)]
pub struct IndividualConversation {
    pub conversation: Conversation,
    /// False when another request won the insert and its row was re-fetched.
    pub created: bool,
}

/// One row of a user's conversation list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationSummary {
    pub id: i64,
    pub name: Option<String>,
    pub kind: ConversationKind,
    pub created_at: DateTime<Utc>,
    pub other_user: Option<PublicProfile>,
    pub last_message: Option<MessageView>,
    pub unread_count: i64,
}

/// Orders two user ids the way the individual-pair unique index stores them.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::conversation_models::{ordered_pair, Conversation, IndividualConversation, Participant};
use crate::error::{AppError, Result};

/// Durable storage of conversations and their participants.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_by_id(&self, conversation_id: i64) -> Result<Option<Conversation>>;

    async fn find_participant(&self, conversation_id: i64, user_id: Uuid)
        -> Result<Option<Participant>>;

    /// The individual conversation between the pair in which both are active.
    async fn find_individual_conversation(&self, a: Uuid, b: Uuid)
        -> Result<Option<Conversation>>;

    /// Creates the individual conversation for the pair with both users as
    /// active participants, in one transaction. Under a concurrent create for
    /// the same pair exactly one insert wins; the loser returns the winner's
    /// row with `created = false`.
    async fn create_individual_conversation(&self, a: Uuid, b: Uuid)
        -> Result<IndividualConversation>;

    /// Creates a group and its active participants in one transaction: either
    /// every member is added or nothing is persisted.
    async fn create_group_conversation(&self, name: Option<&str>, members: &[Uuid])
        -> Result<Conversation>;

    /// Adds an active participant. An existing row for the pair is returned
    /// unchanged, whatever its status.
    async fn add_participant(&self, conversation_id: i64, user_id: Uuid) -> Result<Participant>;

    /// Conversations in which the user is active, newest first.
    async fn list_conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>>;

    /// Some other active participant, used to title individual conversations.
    async fn find_other_participant(&self, conversation_id: i64, user_id: Uuid)
        -> Result<Option<Uuid>>;
}

const CONVERSATION_COLUMNS: &str = "id, name, kind, created_at";

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_pair<'e, E>(executor: E, low: Uuid, high: Uuid) -> Result<Option<Conversation>>
    where
        E: PgExecutor<'e>,
    {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE kind = 'individual' AND pair_low = $1 AND pair_high = $2"
        ))
        .bind(low)
        .bind(high)
        .fetch_optional(executor)
        .await?;

        Ok(conversation)
    }

    async fn insert_participant<'e, E>(
        executor: E,
        conversation_id: i64,
        user_id: Uuid,
    ) -> Result<Option<Participant>>
    where
        E: PgExecutor<'e>,
    {
        let participant = sqlx::query_as::<_, Participant>(
            "INSERT INTO participants (conversation_id, user_id)
             VALUES ($1, $2)
             ON CONFLICT (conversation_id, user_id) DO NOTHING
             RETURNING conversation_id, user_id, joined_at, status",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(participant)
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    async fn find_by_id(&self, conversation_id: i64) -> Result<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn find_participant(
        &self,
        conversation_id: i64,
        user_id: Uuid,
    ) -> Result<Option<Participant>> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT conversation_id, user_id, joined_at, status
             FROM participants
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(participant)
    }

    async fn find_individual_conversation(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<Conversation>> {
        let (low, high) = ordered_pair(a, b);
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT c.id, c.name, c.kind, c.created_at
             FROM conversations c
             JOIN participants p1
               ON p1.conversation_id = c.id AND p1.user_id = $1 AND p1.status = 'active'
             JOIN participants p2
               ON p2.conversation_id = c.id AND p2.user_id = $2 AND p2.status = 'active'
             WHERE c.kind = 'individual' AND c.pair_low = $1 AND c.pair_high = $2",
        )
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn create_individual_conversation(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> Result<IndividualConversation> {
        let (low, high) = ordered_pair(a, b);
        let mut tx = self.pool.begin().await?;

        // A concurrent insert for the same pair blocks here until the other
        // transaction settles, then resolves to DO NOTHING.
        let inserted = sqlx::query_as::<_, Conversation>(&format!(
            "INSERT INTO conversations (kind, pair_low, pair_high)
             VALUES ('individual', $1, $2)
             ON CONFLICT (pair_low, pair_high) WHERE kind = 'individual' DO NOTHING
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(low)
        .bind(high)
        .fetch_optional(&mut *tx)
        .await?;

        match inserted {
            Some(conversation) => {
                Self::insert_participant(&mut *tx, conversation.id, low).await?;
                Self::insert_participant(&mut *tx, conversation.id, high).await?;
                tx.commit().await?;

                Ok(IndividualConversation {
                    conversation,
                    created: true,
                })
            }
            None => {
                tx.rollback().await?;
                tracing::debug!("Individual conversation insert lost the race, re-fetching");

                let conversation = Self::find_by_pair(&self.pool, low, high)
                    .await?
                    .ok_or(AppError::InternalError)?;

                Ok(IndividualConversation {
                    conversation,
                    created: false,
                })
            }
        }
    }

    async fn create_group_conversation(
        &self,
        name: Option<&str>,
        members: &[Uuid],
    ) -> Result<Conversation> {
        let mut tx = self.pool.begin().await?;

        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "INSERT INTO conversations (name, kind)
             VALUES ($1, 'group')
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        for user_id in members {
            Self::insert_participant(&mut *tx, conversation.id, *user_id).await?;
        }

        // Dropping `tx` on an early return above rolls the group back.
        tx.commit().await?;

        Ok(conversation)
    }

    async fn add_participant(&self, conversation_id: i64, user_id: Uuid) -> Result<Participant> {
        if let Some(participant) =
            Self::insert_participant(&self.pool, conversation_id, user_id).await?
        {
            return Ok(participant);
        }

        self.find_participant(conversation_id, user_id)
            .await?
            .ok_or(AppError::InternalError)
    }

    async fn list_conversations_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let conversations = sqlx::query_as::<_, Conversation>(
            "SELECT c.id, c.name, c.kind, c.created_at
             FROM conversations c
             JOIN participants p ON p.conversation_id = c.id
             WHERE p.user_id = $1 AND p.status = 'active'
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    async fn find_other_participant(
        &self,
        conversation_id: i64,
        user_id: Uuid,
    ) -> Result<Option<Uuid>> {
        let other = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM participants
             WHERE conversation_id = $1 AND user_id <> $2 AND status = 'active'
             ORDER BY joined_at ASC
             LIMIT 1",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(other)
    }
}

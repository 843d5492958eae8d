use std::sync::Arc;

use uuid::Uuid;

use crate::{
    conversation::{
        conversation_dto::{CreateConversationRequest, CreatedConversation},
        conversation_models::{ConversationKind, ConversationSummary, Participant},
        conversation_repository::ConversationStore,
        membership::MembershipGuard,
    },
    error::{AppError, Result},
    message::MessageStore,
    resilience::StorePolicy,
    user::{AvatarResolver, User, UserDirectory},
};

#[derive(Clone)]
pub struct ConversationService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
    avatars: Arc<dyn AvatarResolver>,
    guard: MembershipGuard,
    policy: StorePolicy,
}

impl ConversationService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        avatars: Arc<dyn AvatarResolver>,
        guard: MembershipGuard,
        policy: StorePolicy,
    ) -> Self {
        Self {
            conversations,
            messages,
            directory,
            avatars,
            guard,
            policy,
        }
    }

    /// Dispatches on the requested kind.
    pub async fn create(
        &self,
        requester: Uuid,
        request: CreateConversationRequest,
    ) -> Result<CreatedConversation> {
        match request.kind.unwrap_or(ConversationKind::Individual) {
            ConversationKind::Individual => {
                let other = request.other_user_id.ok_or_else(|| {
                    AppError::Validation("other_user_id is required".to_string())
                })?;
                self.create_or_get_individual(requester, other).await
            }
            ConversationKind::Group => {
                self.create_group(requester, request.name.as_deref(), &request.member_ids)
                    .await
            }
        }
    }

    /// At most one individual conversation exists per unordered user pair.
    #[tracing::instrument(skip(self))]
    pub async fn create_or_get_individual(
        &self,
        requester: Uuid,
        other: Uuid,
    ) -> Result<CreatedConversation> {
        if requester.is_nil() || other.is_nil() {
            return Err(AppError::Validation("Both user ids are required".to_string()));
        }
        if requester == other {
            return Err(AppError::Validation(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }

        self.require_user(other).await?;

        let existing = self
            .policy
            .read("find_individual_conversation", || {
                self.conversations.find_individual_conversation(requester, other)
            })
            .await?;

        if let Some(conversation) = existing {
            return Ok(CreatedConversation {
                id: conversation.id,
                existed: true,
            });
        }

        let outcome = self
            .policy
            .write(
                "create_individual_conversation",
                self.conversations.create_individual_conversation(requester, other),
            )
            .await?;

        if outcome.created {
            tracing::info!(conversation_id = outcome.conversation.id, "individual conversation created");
        }

        Ok(CreatedConversation {
            id: outcome.conversation.id,
            existed: !outcome.created,
        })
    }

    #[tracing::instrument(skip(self, member_ids))]
    pub async fn create_group(
        &self,
        requester: Uuid,
        name: Option<&str>,
        member_ids: &[Uuid],
    ) -> Result<CreatedConversation> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        let mut members = vec![requester];
        for id in member_ids {
            if !members.contains(id) {
                members.push(*id);
            }
        }
        for id in &members[1..] {
            self.require_user(*id).await?;
        }

        let conversation = self
            .policy
            .write(
                "create_group_conversation",
                self.conversations.create_group_conversation(name, &members),
            )
            .await?;

        tracing::info!(conversation_id = conversation.id, "group conversation created");

        Ok(CreatedConversation {
            id: conversation.id,
            existed: false,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_participant(
        &self,
        conversation_id: i64,
        requester: Uuid,
        user_id: Uuid,
    ) -> Result<Participant> {
        self.guard.require_active(conversation_id, requester).await?;

        let conversation = self
            .policy
            .read("find_conversation", || self.conversations.find_by_id(conversation_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        if conversation.kind != ConversationKind::Group {
            return Err(AppError::Validation(
                "Only group conversations accept new participants".to_string(),
            ));
        }

        self.require_user(user_id).await?;

        self.policy
            .write(
                "add_participant",
                self.conversations.add_participant(conversation_id, user_id),
            )
            .await
    }

    /// Summaries of every conversation the user is active in, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let conversations = self
            .policy
            .read("list_conversations_for_user", || {
                self.conversations.list_conversations_for_user(user_id)
            })
            .await?;

        let mut summaries = Vec::with_capacity(conversations.len());

        for conversation in conversations {
            let other_user = match conversation.kind {
                ConversationKind::Individual => self
                    .other_profile(conversation.id, user_id)
                    .await?
                    .map(|user| user.to_public(self.avatars.as_ref())),
                ConversationKind::Group => None,
            };

            let last_message = self
                .policy
                .read("latest_message", || self.messages.latest_message(conversation.id))
                .await?
                .map(|m| m.into_view(self.avatars.as_ref()));

            let unread_count = self
                .policy
                .read("count_unread", || self.messages.count_unread(conversation.id, user_id))
                .await?;

            let name = conversation
                .name
                .or_else(|| other_user.as_ref().map(|profile| profile.name.clone()));

            summaries.push(ConversationSummary {
                id: conversation.id,
                name,
                kind: conversation.kind,
                created_at: conversation.created_at,
                other_user,
                last_message,
                unread_count,
            });
        }

        Ok(summaries)
    }

    async fn other_profile(&self, conversation_id: i64, user_id: Uuid) -> Result<Option<User>> {
        let other = self
            .policy
            .read("find_other_participant", || {
                self.conversations.find_other_participant(conversation_id, user_id)
            })
            .await?;

        match other {
            Some(other_id) => {
                self.policy
                    .read("find_user", || self.directory.find_by_id(other_id))
                    .await
            }
            None => Ok(None),
        }
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User> {
        self.policy
            .read("find_user", || self.directory.find_by_id(user_id))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    conversation::MembershipGuard,
    error::{AppError, Result},
    message::{
        message_dto::{SendMessageRequest, MAX_CONTENT_LENGTH},
        message_models::{Message, MessageView},
        message_repository::MessageStore,
    },
    realtime::{MessagesReadPayload, NewMessagePayload, Notifier, RealtimeEvent, SenderInfo, TypingPayload},
    resilience::StorePolicy,
    user::AvatarResolver,
};

/// Send, list, read receipts and typing for conversation members.
///
/// Each operation authorizes first, then touches the store, then notifies.
/// Notification failures never undo or fail the store mutation.
#[derive(Clone)]
pub struct MessageService {
    guard: MembershipGuard,
    messages: Arc<dyn MessageStore>,
    avatars: Arc<dyn AvatarResolver>,
    notifier: Notifier,
    policy: StorePolicy,
}

impl MessageService {
    pub fn new(
        guard: MembershipGuard,
        messages: Arc<dyn MessageStore>,
        avatars: Arc<dyn AvatarResolver>,
        notifier: Notifier,
        policy: StorePolicy,
    ) -> Self {
        Self {
            guard,
            messages,
            avatars,
            notifier,
            policy,
        }
    }

    #[tracing::instrument(skip(self, sender, request), fields(user_id = %sender.user_id))]
    pub async fn send(
        &self,
        conversation_id: i64,
        sender: &SenderInfo,
        request: SendMessageRequest,
    ) -> Result<Message> {
        self.guard
            .require_active(conversation_id, sender.user_id)
            .await?;

        let image_url = request
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        if request.content.trim().is_empty() && image_url.is_none() {
            return Err(AppError::Validation("Message content is required".to_string()));
        }
        if (request.content.chars().count() as u64) > MAX_CONTENT_LENGTH {
            return Err(AppError::Validation(format!(
                "Message content exceeds {} characters",
                MAX_CONTENT_LENGTH
            )));
        }

        let message = self
            .policy
            .write(
                "append_message",
                self.messages.append_message(
                    conversation_id,
                    sender.user_id,
                    &request.content,
                    image_url,
                ),
            )
            .await?;

        self.notifier
            .notify(
                conversation_id,
                RealtimeEvent::NewMessage(NewMessagePayload {
                    message: message.clone(),
                    sender: sender.clone(),
                }),
            )
            .await;

        Ok(message)
    }

    /// Returns the conversation as it was before this call acknowledged it:
    /// messages the viewer just caused to become `read` still show `sent`.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, conversation_id: i64, viewer_id: Uuid) -> Result<Vec<MessageView>> {
        let messages = self.fetch(conversation_id, viewer_id).await?;
        self.commit_read(conversation_id, viewer_id).await?;
        Ok(messages)
    }

    /// Authorized, ordered read without side effects.
    pub async fn fetch(&self, conversation_id: i64, viewer_id: Uuid) -> Result<Vec<MessageView>> {
        self.guard.require_active(conversation_id, viewer_id).await?;

        let messages = self
            .policy
            .read("list_messages", || self.messages.list_messages(conversation_id))
            .await?;

        Ok(messages
            .into_iter()
            .map(|m| m.into_view(self.avatars.as_ref()))
            .collect())
    }

    /// Explicit acknowledgement without re-fetching.
    #[tracing::instrument(skip(self))]
    pub async fn mark_read(&self, conversation_id: i64, reader_id: Uuid) -> Result<u64> {
        self.guard.require_active(conversation_id, reader_id).await?;
        self.commit_read(conversation_id, reader_id).await
    }

    /// Moves other participants' `sent` messages to `read` and announces it
    /// when anything changed. Callers must have authorized `reader_id`.
    pub(crate) async fn commit_read(&self, conversation_id: i64, reader_id: Uuid) -> Result<u64> {
        let transitioned = self
            .policy
            .write(
                "mark_others_read",
                self.messages.mark_others_read(conversation_id, reader_id),
            )
            .await?;

        if transitioned > 0 {
            tracing::debug!(conversation_id, %reader_id, transitioned, "messages marked read");
            self.notifier
                .notify(
                    conversation_id,
                    RealtimeEvent::MessagesRead(MessagesReadPayload {
                        conversation_id,
                        read_by: reader_id,
                    }),
                )
                .await;
        }

        Ok(transitioned)
    }

    /// Ephemeral presence signal: no persistence, no dedup, one publish per call.
    pub async fn typing(&self, conversation_id: i64, user: &SenderInfo) -> Result<()> {
        self.guard
            .require_active(conversation_id, user.user_id)
            .await?;

        self.notifier
            .notify(
                conversation_id,
                RealtimeEvent::Typing(TypingPayload {
                    user_id: user.user_id,
                    display_name: user.display_name.clone(),
                }),
            )
            .await;

        Ok(())
    }

    pub async fn count_unread(&self, conversation_id: i64, user_id: Uuid) -> Result<i64> {
        self.policy
            .read("count_unread", || self.messages.count_unread(conversation_id, user_id))
            .await
    }
}

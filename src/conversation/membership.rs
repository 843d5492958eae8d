//! Per-conversation authorization.
//!
//! Every operation on conversation-scoped state goes through
//! [`MembershipGuard::require_active`] first.

use std::sync::Arc;

use uuid::Uuid;

use super::{conversation_models::Participant, conversation_repository::ConversationStore};
use crate::{
    error::{AppError, Result},
    resilience::StorePolicy,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Membership {
    Active(Participant),
    Denied,
}

#[derive(Clone)]
pub struct MembershipGuard {
    conversations: Arc<dyn ConversationStore>,
    policy: StorePolicy,
}

impl MembershipGuard {
    pub fn new(conversations: Arc<dyn ConversationStore>, policy: StorePolicy) -> Self {
        Self {
            conversations,
            policy,
        }
    }

    /// Pure read: active only when a participant row exists with status active.
    pub async fn authorize(&self, conversation_id: i64, user_id: Uuid) -> Result<Membership> {
        let participant = self
            .policy
            .read("find_participant", || {
                self.conversations.find_participant(conversation_id, user_id)
            })
            .await?;

        Ok(match participant {
            Some(p) if p.is_active() => Membership::Active(p),
            _ => Membership::Denied,
        })
    }

    pub async fn require_active(&self, conversation_id: i64, user_id: Uuid) -> Result<Participant> {
        match self.authorize(conversation_id, user_id).await? {
            Membership::Active(participant) => Ok(participant),
            Membership::Denied => {
                tracing::debug!(conversation_id, %user_id, "membership denied");
                Err(AppError::Forbidden(
                    "You do not have access to this conversation".to_string(),
                ))
            }
        }
    }
}

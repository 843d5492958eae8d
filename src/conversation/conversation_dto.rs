use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::conversation_models::ConversationKind;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateConversationRequest {
    /// Defaults to `individual`.
    pub kind: Option<ConversationKind>,
    /// Counterpart of an individual conversation.
    pub other_user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    /// Initial members of a group besides the creator.
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

impl CreateConversationRequest {
    pub fn individual(other_user_id: Uuid) -> Self {
        Self {
            kind: Some(ConversationKind::Individual),
            other_user_id: Some(other_user_id),
            name: None,
            member_ids: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>, member_ids: Vec<Uuid>) -> Self {
        Self {
            kind: Some(ConversationKind::Group),
            other_user_id: None,
            name: Some(name.into()),
            member_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedConversation {
    pub id: i64,
    /// True when an existing individual conversation was returned.
    pub existed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
}

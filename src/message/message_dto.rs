use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_CONTENT_LENGTH: u64 = 4000;

/// Length and emptiness are checked by the service once the sender is
/// known to be a member.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[schema(max_length = 4000)]
    #[serde(default)]
    pub content: String,
    /// Reference to an attachment already stored by the media subsystem.
    pub image_url: Option<String>,
}

impl SendMessageRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            image_url: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkReadResponse {
    pub transitioned: u64,
}

/// Typing is acknowledged, never failed: denied callers just get `false`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TypingAck {
    pub success: bool,
}

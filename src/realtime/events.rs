use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

pub const CHANNEL_PREFIX: &str = "chat-";

/// Broadcast topic of one conversation.
pub fn channel_name(conversation_id: i64) -> String {
    format!("{CHANNEL_PREFIX}{conversation_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub user_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessagePayload {
    #[serde(flatten)]
    pub message: Message,
    pub sender: SenderInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesReadPayload {
    pub conversation_id: i64,
    pub read_by: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub user_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RealtimeEvent {
    NewMessage(NewMessagePayload),
    MessagesRead(MessagesReadPayload),
    Typing(TypingPayload),
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::NewMessage(_) => "new-message",
            RealtimeEvent::MessagesRead(_) => "messages-read",
            RealtimeEvent::Typing(_) => "typing",
        }
    }
}

/// What a subscriber receives: the event tagged with its channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFrame {
    pub channel: String,
    #[serde(flatten)]
    pub event: RealtimeEvent,
}

// Client-to-server frames on the websocket
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { conversation_id: i64 },
    Unsubscribe { conversation_id: i64 },
    Typing { conversation_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Event(ChannelFrame),
    Subscribed { conversation_id: i64 },
    Unsubscribed { conversation_id: i64 },
    /// Typing is acknowledged, never rejected with a reason.
    TypingAck { conversation_id: i64, success: bool },
    Error { message: String },
}

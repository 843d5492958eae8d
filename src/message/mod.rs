pub mod message_dto;
pub mod message_handlers;
pub mod message_models;
pub mod message_repository;
pub mod message_service;

pub use message_dto::{MarkReadResponse, SendMessageRequest, TypingAck, MAX_CONTENT_LENGTH};
pub use message_handlers::{list_messages, mark_read, send_message, typing};
pub use message_models::{AuthoredMessage, Message, MessageStatus, MessageView};
pub use message_repository::{MessageRepository, MessageStore};
pub use message_service::MessageService;

pub mod conversation_dto;
pub mod conversation_handlers;
pub mod conversation_models;
pub mod conversation_repository;
pub mod conversation_service;
pub mod membership;

pub use conversation_dto::{AddParticipantRequest, CreateConversationRequest, CreatedConversation};
pub use conversation_handlers::{add_participant, create_conversation, list_conversations};
pub use conversation_models::{
    ordered_pair, Conversation, ConversationKind, ConversationSummary, IndividualConversation,
    Participant, ParticipantStatus,
};
pub use conversation_repository::{ConversationRepository, ConversationStore};
pub use conversation_service::ConversationService;
pub use membership::{Membership, MembershipGuard};

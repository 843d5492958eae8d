use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    conversation::{
        conversation_dto::{AddParticipantRequest, CreateConversationRequest, CreatedConversation},
        conversation_models::{ConversationSummary, Participant},
    },
    error::Result,
    middleware::AuthUser,
    state::AppState,
};

/// List the caller's conversations
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    responses(
        (status = 200, description = "Conversation summaries, newest first", body = [ConversationSummary]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ConversationSummary>>> {
    let summaries = state.conversation_service.list_for_user(user.id).await?;
    Ok(Json(summaries))
}

/// Create a group or find-or-create an individual conversation
#[utoipa::path(
    post,
    path = "/api/conversations",
    tag = "conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = CreatedConversation),
        (status = 200, description = "Existing individual conversation returned", body = CreatedConversation),
        (status = 400, description = "Validation error"),
        (status = 404, description = "User not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<CreatedConversation>)> {
    payload.validate()?;

    let created = state.conversation_service.create(user.id, payload).await?;
    let status = if created.existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(created)))
}

/// Add a member to a group conversation
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/participants",
    tag = "conversations",
    params(
        ("id" = i64, Path, description = "Conversation ID")
    ),
    request_body = AddParticipantRequest,
    responses(
        (status = 200, description = "Participant added", body = Participant),
        (status = 400, description = "Not a group conversation"),
        (status = 403, description = "Not a member"),
        (status = 404, description = "User not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn add_participant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
    Json(payload): Json<AddParticipantRequest>,
) -> Result<Json<Participant>> {
    let participant = state
        .conversation_service
        .add_participant(conversation_id, user.id, payload.user_id)
        .await?;

    Ok(Json(participant))
}

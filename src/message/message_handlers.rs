use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    error::Result,
    message::{
        message_dto::{MarkReadResponse, SendMessageRequest, TypingAck},
        message_models::{Message, MessageView},
    },
    middleware::AuthUser,
    state::AppState,
};

/// Send a message to a conversation
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    tag = "messages",
    params(
        ("id" = i64, Path, description = "Conversation ID")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent successfully", body = Message),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not a member"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state
        .message_service
        .send(conversation_id, &user.as_sender(), payload)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Get the messages of a conversation and mark the others' messages read
#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    tag = "messages",
    params(
        ("id" = i64, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Messages with their authors in send order, as they were before this read", body = [MessageView]),
        (status = 403, description = "Not a member"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Vec<MessageView>>> {
    let messages = state.message_service.list(conversation_id, user.id).await?;
    Ok(Json(messages))
}

/// Mark the others' messages in a conversation as read
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/read",
    tag = "messages",
    params(
        ("id" = i64, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Number of messages moved to read", body = MarkReadResponse),
        (status = 403, description = "Not a member"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<MarkReadResponse>> {
    let transitioned = state
        .message_service
        .mark_read(conversation_id, user.id)
        .await?;

    Ok(Json(MarkReadResponse { transitioned }))
}

/// Signal that the caller is typing
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/typing",
    tag = "messages",
    params(
        ("id" = i64, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Whether the signal was accepted", body = TypingAck),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn typing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Json<TypingAck> {
    let success = match state
        .message_service
        .typing(conversation_id, &user.as_sender())
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(conversation_id, user_id = %user.id, "typing signal rejected: {}", e);
            false
        }
    };

    Json(TypingAck { success })
}

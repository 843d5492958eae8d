use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::{
    error::{AppError, Result},
    middleware::AuthUser,
    realtime::events::{channel_name, ClientMessage, ServerMessage},
    state::AppState,
};

type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// WebSocket upgrade handler
#[utoipa::path(
    get,
    path = "/api/ws",
    tag = "realtime",
    responses(
        (status = 101, description = "Switching to the realtime websocket"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, user, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user: AuthUser, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    tracing::info!("User {} connected via WebSocket", user.id);

    // Spawn task to send frames from the outbox to the WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Spawn task to receive frames from the WebSocket
    let state_clone = state.clone();
    let user_clone = user.clone();
    let tx_clone = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut subscriptions: HashMap<i64, JoinHandle<()>> = HashMap::new();

        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = process_client_message(
                        &text,
                        &user_clone,
                        &state_clone,
                        &tx_clone,
                        &mut subscriptions,
                    )
                    .await
                    {
                        tracing::debug!("Rejected websocket frame: {}", e);
                        let message = if e.is_internal() {
                            "Internal server error".to_string()
                        } else {
                            e.to_string()
                        };
                        let _ = tx_clone.send(ServerMessage::Error { message });
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        for (conversation_id, forwarder) in subscriptions {
            forwarder.abort();
            state_clone.hub.prune(&channel_name(conversation_id));
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!("WebSocket connection closed for user {}", user.id);
}

/// Process incoming client frames
async fn process_client_message(
    text: &str,
    user: &AuthUser,
    state: &AppState,
    tx: &Outbox,
    subscriptions: &mut HashMap<i64, JoinHandle<()>>,
) -> Result<()> {
    let client_msg: ClientMessage = serde_json::from_str(text)
        .map_err(|e| AppError::Validation(format!("Invalid message format: {}", e)))?;

    match client_msg {
        ClientMessage::Subscribe { conversation_id } => {
            state
                .membership
                .require_active(conversation_id, user.id)
                .await?;

            if !subscriptions.contains_key(&conversation_id) {
                let forwarder = spawn_forwarder(state, conversation_id, tx.clone());
                subscriptions.insert(conversation_id, forwarder);
            }

            let _ = tx.send(ServerMessage::Subscribed { conversation_id });
        }
        ClientMessage::Unsubscribe { conversation_id } => {
            if let Some(forwarder) = subscriptions.remove(&conversation_id) {
                forwarder.abort();
                state.hub.prune(&channel_name(conversation_id));
            }

            let _ = tx.send(ServerMessage::Unsubscribed { conversation_id });
        }
        ClientMessage::Typing { conversation_id } => {
            let _ = tx.send(typing_ack(state, user, conversation_id).await);
        }
    }

    Ok(())
}

async fn typing_ack(state: &AppState, user: &AuthUser, conversation_id: i64) -> ServerMessage {
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

    ServerMessage::TypingAck {
        conversation_id,
        success,
    }
}

/// Forwards one conversation channel into the socket outbox.
fn spawn_forwarder(state: &AppState, conversation_id: i64, tx: Outbox) -> JoinHandle<()> {
    let mut stream = BroadcastStream::new(state.hub.subscribe(&channel_name(conversation_id)));

    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            match item {
                Ok(frame) => {
                    if tx.send(ServerMessage::Event(frame)).is_err() {
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(conversation_id, skipped, "subscriber lagged, frames dropped");
                }
            }
        }
    })
}

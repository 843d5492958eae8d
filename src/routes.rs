use crate::{
    conversation::{self, *},
    message::{self, *},
    middleware::auth_middleware,
    realtime,
    state::AppState,
    user::{self, *},
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        conversation::conversation_handlers::list_conversations,
        conversation::conversation_handlers::create_conversation,
        conversation::conversation_handlers::add_participant,
        message::message_handlers::list_messages,
        message::message_handlers::send_message,
        message::message_handlers::mark_read,
        message::message_handlers::typing,
        user::user_handlers::search_users,
        realtime::handler::ws_handler,
    ),
    components(
        schemas(
            CreateConversationRequest,
            CreatedConversation,
            AddParticipantRequest,
            ConversationSummary,
            ConversationKind,
            Participant,
            ParticipantStatus,
            SendMessageRequest,
            MarkReadResponse,
            TypingAck,
            Message,
            MessageView,
            MessageStatus,
            PublicProfile,
            UserSearchResult,
        )
    ),
    tags(
        (name = "conversations", description = "Conversation endpoints"),
        (name = "messages", description = "Message endpoints"),
        (name = "users", description = "User directory endpoints"),
        (name = "realtime", description = "Realtime websocket")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let conversation_routes = Router::new()
        .route("/", get(list_conversations).post(create_conversation))
        .route("/:id/participants", post(add_participant))
        .route("/:id/messages", get(list_messages).post(send_message))
        .route("/:id/read", post(mark_read))
        .route("/:id/typing", post(typing));

    let user_routes = Router::new().route("/search", get(search_users));

    // Everything under /api requires a bearer token
    let api_routes = Router::new()
        .nest("/conversations", conversation_routes)
        .nest("/users", user_routes)
        .route("/ws", get(realtime::ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

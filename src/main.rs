mod auth;
mod conversation;
mod db;
mod error;
mod message;
mod middleware;
mod realtime;
mod resilience;
mod routes;
mod state;
mod user;

#[cfg(test)]
mod testing;

use conversation::{ConversationRepository, ConversationService, MembershipGuard};
use db::{create_pool, run_migrations};
use message::{MessageRepository, MessageService};
use realtime::{ChannelHub, Notifier};
use routes::create_router;
use state::{AppState, Config};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user::{CdnAvatarResolver, UserRepository, UserService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,social_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    tracing::info!("Connecting to database...");
    let db = create_pool(&config).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    let policy = config.store_policy();

    // Create repositories
    let conversation_repository = Arc::new(ConversationRepository::new(db.clone()));
    let message_repository = Arc::new(MessageRepository::new(db.clone()));
    let user_repository = Arc::new(UserRepository::new(db.clone()));
    let avatars = Arc::new(CdnAvatarResolver::new(
        config.avatar_base_url.clone(),
        config.avatar_size,
    ));

    // Realtime fan-out
    let hub = ChannelHub::new(config.realtime_channel_capacity);
    let notifier = Notifier::new(Arc::new(hub.clone()), config.broadcast_timeout());

    // Create services
    let membership = MembershipGuard::new(conversation_repository.clone(), policy.clone());
    let conversation_service = ConversationService::new(
        conversation_repository,
        message_repository.clone(),
        user_repository.clone(),
        avatars.clone(),
        membership.clone(),
        policy.clone(),
    );
    let message_service = MessageService::new(
        membership.clone(),
        message_repository,
        avatars.clone(),
        notifier,
        policy.clone(),
    );
    let user_service = UserService::new(user_repository.clone(), avatars, policy);

    let state = AppState {
        config: config.clone(),
        user_directory: user_repository,
        membership,
        hub,
        conversation_service,
        message_service,
        user_service,
    };

    let app = create_router(state);

    let addr = config.bind_address();
    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

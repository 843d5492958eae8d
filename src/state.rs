use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;

use crate::{
    conversation::{ConversationService, MembershipGuard},
    message::MessageService,
    realtime::ChannelHub,
    resilience::StorePolicy,
    user::{UserDirectory, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub membership: MembershipGuard,
    pub hub: ChannelHub,
    pub conversation_service: ConversationService,
    pub message_service: MessageService,
    pub user_service: UserService,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub db_acquire_timeout_ms: u64,
    pub store_timeout_ms: u64,
    pub store_read_retries: u32,
    pub broadcast_timeout_ms: u64,
    pub realtime_channel_capacity: usize,
    pub avatar_base_url: Option<String>,
    pub avatar_size: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed_or("PORT", 3000)?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout_ms: parsed_or("DB_ACQUIRE_TIMEOUT_MS", 3000)?,
            store_timeout_ms: parsed_or("STORE_TIMEOUT_MS", 5000)?,
            store_read_retries: parsed_or("STORE_READ_RETRIES", 2)?,
            broadcast_timeout_ms: parsed_or("BROADCAST_TIMEOUT_MS", 1000)?,
            realtime_channel_capacity: parsed_or("REALTIME_CHANNEL_CAPACITY", 64)?,
            avatar_base_url: std::env::var("AVATAR_BASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            avatar_size: parsed_or("AVATAR_SIZE", 200)?,
        })
    }

    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy::new(
            Duration::from_millis(self.store_timeout_ms),
            self.store_read_retries,
        )
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_timeout_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{} must be set", key))
}

fn parsed_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::avatar::AvatarResolver;

pub const STATUS_SUSPENDED: &str = "suspended";

/// A user as exposed by the directory. The chat core never writes these rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Stored photo reference: either a full URL or a CDN public id.
    pub avatar_ref: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_suspended(&self) -> bool {
        self.status == STATUS_SUSPENDED
    }

    pub fn to_public(&self, avatars: &dyn AvatarResolver) -> PublicProfile {
        PublicProfile {
            id: self.id,
            name: self.username.clone(),
            avatar_url: avatars.resolve(self.avatar_ref.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

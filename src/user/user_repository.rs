use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::user_models::User;
use crate::error::Result;

/// Read-only view of the user directory owned by the identity subsystem.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Case-insensitive substring match on name or email, never returning
    /// `exclude`, at most `limit` rows.
    async fn search(&self, term: &str, exclude: Uuid, limit: i64) -> Result<Vec<User>>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, avatar_ref, status, created_at
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn search(&self, term: &str, exclude: Uuid, limit: i64) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, email, avatar_ref, status, created_at
             FROM users
             WHERE (username ILIKE $1 ESCAPE '\\' OR email ILIKE $1 ESCAPE '\\')
               AND id <> $2
             ORDER BY username ASC
             LIMIT $3",
        )
        .bind(like_pattern(term))
        .bind(exclude)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

/// Builds a `%term%` pattern with LIKE metacharacters escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

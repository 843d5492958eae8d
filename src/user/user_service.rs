use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    resilience::StorePolicy,
    user::{avatar::AvatarResolver, user_dto::UserSearchResult, user_repository::UserDirectory},
};

pub const SEARCH_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
    avatars: Arc<dyn AvatarResolver>,
    policy: StorePolicy,
}

impl UserService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        avatars: Arc<dyn AvatarResolver>,
        policy: StorePolicy,
    ) -> Self {
        Self {
            directory,
            avatars,
            policy,
        }
    }

    /// Candidate list for starting a conversation; never includes the caller.
    #[tracing::instrument(skip(self))]
    pub async fn search_users(&self, term: &str, exclude: Uuid) -> Result<Vec<UserSearchResult>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AppError::Validation("Search term is required".to_string()));
        }

        let users = self
            .policy
            .read("search_users", || self.directory.search(term, exclude, SEARCH_LIMIT))
            .await?;

        Ok(users
            .into_iter()
            .map(|user| UserSearchResult {
                avatar_url: self.avatars.resolve(user.avatar_ref.as_deref()),
                id: user.id,
                name: user.username,
                email: user.email,
            })
            .collect())
    }
}

use crate::{
    auth::{subject, verify_jwt},
    error::AppError,
    realtime::SenderInfo,
    state::AppState,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// The authenticated caller as resolved by the identity middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub display_name: String,
}

impl AuthUser {
    pub fn as_sender(&self) -> SenderInfo {
        SenderInfo {
            user_id: self.id,
            display_name: self.display_name.clone(),
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized("Missing credentials".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    let claims = verify_jwt(token, &state.config.jwt_secret)?;
    let user_id = subject(&claims)?;

    let user = state
        .config
        .store_policy()
        .read("find_user", || state.user_directory.find_by_id(user_id))
        .await?
        .ok_or(AppError::Unauthorized("User not found".to_string()))?;

    if user.is_suspended() {
        return Err(AppError::Forbidden("Account suspended".to_string()));
    }

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        display_name: user.username,
    });

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))
    }
}

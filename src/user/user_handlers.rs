use axum::{
    extract::{Query, State},
    Json,
};
use validator::Validate;

use crate::{
    error::Result,
    middleware::AuthUser,
    state::AppState,
    user::user_dto::{SearchUsersQuery, UserSearchResult},
};

/// Search users to start a conversation with
#[utoipa::path(
    get,
    path = "/api/users/search",
    tag = "users",
    params(SearchUsersQuery),
    responses(
        (status = 200, description = "Matching users, caller excluded", body = [UserSearchResult]),
        (status = 400, description = "Missing search term"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn search_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchUsersQuery>,
) -> Result<Json<Vec<UserSearchResult>>> {
    query.validate()?;

    let results = state.user_service.search_users(&query.q, user.id).await?;

    Ok(Json(results))
}

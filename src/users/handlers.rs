use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::services::update_profile,
    error::ApiError,
    gate::{AuthError, CurrentUser},
    state::AppState,
    users::{
        dto::{PublicUser, UserUpdate},
        repo_types::UserRole,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", put(update_me))
        .route("/users/:user_id", get(get_user))
}

/// Own record, or anyone's for admins.
#[instrument(skip(state, current))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Path(user_id): Path<i64>,
) -> Result<Json<PublicUser>, ApiError> {
    if current.id != user_id && current.role != UserRole::Admin {
        warn!(caller = current.id, user_id, "user lookup denied");
        return Err(ApiError::Forbidden);
    }
    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::UnknownIdentity)?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, current, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = update_profile(state.store.as_ref(), current.id, payload).await?;
    Ok(Json(user.into()))
}

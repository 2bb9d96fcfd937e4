use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;

use crate::{
    error::ApiError,
    gate::CurrentUser,
    state::AppState,
    subscriptions::{
        catalog::{self, Entitlement},
        ledger::{CancelOutcome, Ledger, SubscriptionStatus},
    },
};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions/plans", get(list_plans))
        .route("/subscriptions/status", get(status))
        .route("/subscriptions/cancel", post(cancel))
}

pub async fn list_plans() -> Json<Vec<&'static Entitlement>> {
    Json(catalog::purchasable())
}

#[instrument(skip(state, user))]
pub async fn status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<SubscriptionStatus>, ApiError> {
    let status = Ledger::from_ref(&state).status(user.id).await?;
    Ok(Json(status))
}

#[instrument(skip(state, user))]
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let outcome = Ledger::from_ref(&state).cancel(user.id).await?;
    let message = match outcome {
        CancelOutcome::Scheduled { plan, expires_at } => format!(
            "Subscription {plan} cancelled. Access remains until {}.",
            fmt_expiry(expires_at)
        ),
        CancelOutcome::AlreadyCancelled { plan, expires_at } => format!(
            "Subscription {plan} is already set to end on {}.",
            fmt_expiry(expires_at)
        ),
        CancelOutcome::NothingToCancel => "No active subscription to cancel.".to_string(),
    };
    Ok(Json(MessageResponse { message }))
}

fn fmt_expiry(expires_at: Option<time::OffsetDateTime>) -> String {
    expires_at
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "the end of the current period".into())
}

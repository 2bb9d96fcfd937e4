use axum::{
    extract::{FromRef, Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::ApiError,
    gate::CurrentUser,
    payments::{
        dto::{PaymentConfigResponse, SubscribeRequest},
        services,
    },
    state::AppState,
    subscriptions::{handlers::MessageResponse, ledger::Ledger},
};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments/config", get(payment_config))
        .route("/payments/subscribe/:gateway", post(subscribe))
}

pub async fn payment_config(State(state): State<AppState>) -> Json<PaymentConfigResponse> {
    let gw = &state.config.gateways;
    Json(PaymentConfigResponse {
        stripe_publishable_key: gw.stripe_publishable_key.clone(),
        paypal_client_id: gw.paypal_client_id.clone(),
        paypal_mode: gw.paypal_mode.clone(),
    })
}

#[instrument(skip(state, user, payload))]
pub async fn subscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(gateway): Path<String>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let ledger = Ledger::from_ref(&state);
    let (_, sub) = services::subscribe(&state.gateways, &ledger, &user, &gateway, payload).await?;
    Ok(Json(MessageResponse {
        message: format!("Successfully subscribed to {} plan via {gateway}.", sub.plan),
    }))
}

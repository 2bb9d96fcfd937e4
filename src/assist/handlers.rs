use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{error, instrument};

use crate::{
    assist::{
        dto::{
            CodeExplanationRequest, CodeExplanationResponse, CodeGenerationRequest,
            CodeGenerationResponse, CodeRefactorRequest, CodeRefactorResponse,
        },
        services::Caller,
    },
    auth::extractors::BearerToken,
    error::ApiError,
    gate::{AccessGate, Feature},
    state::AppState,
    users::repo_types::User,
};

pub fn assist_routes() -> Router<AppState> {
    Router::new()
        .route("/assist/generate-code", post(generate_code))
        .route("/assist/explain-code", post(explain_code))
        .route("/assist/refactor-code", post(refactor_code))
}

async fn gated(state: &AppState, token: &str, feature: Feature) -> Result<Caller, ApiError> {
    let user: User = AccessGate::from_ref(state)
        .authorize_feature(token, feature)
        .await?;
    Ok(Caller {
        plan: user.subscription.effective_plan(time::OffsetDateTime::now_utc()),
        email: user.email,
    })
}

#[instrument(skip(state, token, payload))]
pub async fn generate_code(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(payload): Json<CodeGenerationRequest>,
) -> Result<Json<CodeGenerationResponse>, ApiError> {
    let caller = gated(&state, &token, Feature::CodeGeneration).await?;
    let out = state.assistant.generate(payload, &caller).await.map_err(|e| {
        error!(error = %e, "code generation failed");
        ApiError::Internal(e)
    })?;
    Ok(Json(out))
}

#[instrument(skip(state, token, payload))]
pub async fn explain_code(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(payload): Json<CodeExplanationRequest>,
) -> Result<Json<CodeExplanationResponse>, ApiError> {
    let caller = gated(&state, &token, Feature::CodeExplanation).await?;
    let out = state.assistant.explain(payload, &caller).await.map_err(|e| {
        error!(error = %e, "code explanation failed");
        ApiError::Internal(e)
    })?;
    Ok(Json(out))
}

#[instrument(skip(state, token, payload))]
pub async fn refactor_code(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Json(payload): Json<CodeRefactorRequest>,
) -> Result<Json<CodeRefactorResponse>, ApiError> {
    let caller = gated(&state, &token, Feature::CodeRefactor).await?;
    let out = state.assistant.refactor(payload, &caller).await.map_err(|e| {
        error!(error = %e, "code refactor failed");
        ApiError::Internal(e)
    })?;
    Ok(Json(out))
}

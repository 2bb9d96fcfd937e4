use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::gate::AuthError;
use crate::subscriptions::ledger::LedgerError;
use crate::users::repo::StoreError;

/// Errors as the HTTP boundary reports them.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("incorrect email or password")]
    BadCredentials,
    #[error("not enough permissions")]
    Forbidden,
    #[error("user with this email already exists")]
    DuplicateEmail,
    #[error("{0}")]
    Validation(String),
    #[error("invalid plan id")]
    UnknownPlan,
    #[error("unsupported payment gateway {0:?}")]
    UnsupportedGateway(String),
    #[error("payment processing failed with {0}")]
    PaymentFailed(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            StoreError::NotFound => ApiError::Auth(AuthError::UnknownIdentity),
            StoreError::Other(e) => ApiError::Internal(e),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::UnknownIdentity => ApiError::Auth(AuthError::UnknownIdentity),
            LedgerError::UnknownPlan(_) => ApiError::UnknownPlan,
            LedgerError::Store(e) => ApiError::Internal(e),
        }
    }
}

const CREDENTIALS_DETAIL: &str = "Could not validate credentials";

fn unauthorized(detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "detail": detail })),
    )
        .into_response()
}

fn detail(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(auth) => match auth {
                // Every failed credential check looks the same from outside.
                AuthError::MissingToken
                | AuthError::Unauthenticated(_)
                | AuthError::InactiveAccount => {
                    warn!(reason = %auth, "request not authenticated");
                    unauthorized(CREDENTIALS_DETAIL)
                }
                AuthError::UnknownIdentity => detail(StatusCode::NOT_FOUND, "User not found"),
                AuthError::InsufficientPlan { plan, .. } => detail(
                    StatusCode::FORBIDDEN,
                    format!("This feature requires a higher subscription tier. Your plan: {plan}"),
                ),
                AuthError::FeatureNotIncluded { plan, .. } => detail(
                    StatusCode::FORBIDDEN,
                    format!("This feature is not included in your plan. Your plan: {plan}"),
                ),
                AuthError::UsageLimitReached { limit, .. } => detail(
                    StatusCode::TOO_MANY_REQUESTS,
                    format!("Daily limit of {limit} requests reached for your plan."),
                ),
                AuthError::Store(e) => {
                    error!(error = %e, "identity lookup failed");
                    detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                }
            },
            ApiError::BadCredentials => unauthorized("Incorrect email or password"),
            ApiError::Forbidden => detail(StatusCode::FORBIDDEN, "Not enough permissions"),
            ApiError::DuplicateEmail => {
                detail(StatusCode::BAD_REQUEST, "User with this email already exists")
            }
            ApiError::Validation(msg) => detail(StatusCode::BAD_REQUEST, msg),
            ApiError::UnknownPlan => detail(StatusCode::BAD_REQUEST, "Invalid plan ID"),
            ApiError::UnsupportedGateway(_) => {
                detail(StatusCode::BAD_REQUEST, "Unsupported payment gateway")
            }
            ApiError::PaymentFailed(gateway) => detail(
                StatusCode::BAD_REQUEST,
                format!("Payment processing failed with {gateway}."),
            ),
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenError;
    use crate::subscriptions::plan::Plan;

    #[test]
    fn auth_failures_share_one_status_and_header() {
        for err in [
            AuthError::MissingToken,
            AuthError::Unauthenticated(TokenError::Expired),
            AuthError::Unauthenticated(TokenError::BadSignature),
            AuthError::InactiveAccount,
        ] {
            let res = ApiError::from(err).into_response();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
        }
    }

    #[test]
    fn taxonomy_status_codes() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (AuthError::UnknownIdentity.into(), StatusCode::NOT_FOUND),
            (
                AuthError::InsufficientPlan {
                    plan: Plan::None,
                    required_level: 1,
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (
                AuthError::FeatureNotIncluded {
                    plan: Plan::None,
                    meter: crate::gate::Meter::Generation,
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (
                AuthError::UsageLimitReached {
                    meter: crate::gate::Meter::Completions,
                    limit: 1000,
                }
                .into(),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (ApiError::DuplicateEmail, StatusCode::BAD_REQUEST),
            (ApiError::UnknownPlan, StatusCode::BAD_REQUEST),
            (ApiError::UnsupportedGateway("bank".into()), StatusCode::BAD_REQUEST),
            (ApiError::PaymentFailed("stripe".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}

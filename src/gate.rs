//! Access Gate.
//!
//! The only place that turns a bearer token into a [`User`] and decides
//! whether that user's plan reaches a feature. Handlers never compare plans
//! themselves.

use std::{collections::HashMap, sync::Arc};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::auth::{extractors::BearerToken, jwt::TokenError, jwt::TokenService};
use crate::error::ApiError;
use crate::state::AppState;
use crate::subscriptions::{catalog, plan::Plan};
use crate::users::{repo::UserStore, repo_types::User};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no bearer token presented")]
    MissingToken,
    #[error("invalid token: {0}")]
    Unauthenticated(TokenError),
    #[error("token subject does not exist")]
    UnknownIdentity,
    #[error("account is inactive")]
    InactiveAccount,
    #[error("plan {plan} is below required level {required_level}")]
    InsufficientPlan { plan: Plan, required_level: u8 },
    #[error("plan {plan} does not include {meter:?}")]
    FeatureNotIncluded { plan: Plan, meter: Meter },
    #[error("daily {meter:?} limit of {limit} reached")]
    UsageLimitReached { meter: Meter, limit: i64 },
    #[error(transparent)]
    Store(anyhow::Error),
}

/// Daily quota a feature draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Meter {
    Completions,
    Generation,
}

/// Feature-gated assistant operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    CodeGeneration,
    CodeExplanation,
    CodeRefactor,
}

impl Feature {
    /// Minimum `project_understanding_level`.
    pub fn required_level(&self) -> u8 {
        match self {
            Feature::CodeGeneration => 0,
            Feature::CodeExplanation | Feature::CodeRefactor => 1,
        }
    }

    pub fn meter(&self) -> Meter {
        match self {
            Feature::CodeGeneration => Meter::Generation,
            Feature::CodeExplanation | Feature::CodeRefactor => Meter::Completions,
        }
    }
}

/// Per-user, per-UTC-day request counters. In-process only.
#[derive(Default)]
pub struct UsageMeter {
    counters: Mutex<HashMap<(i64, Meter), (Date, i64)>>,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes one unit. `limit == -1` is unlimited and `limit == 0` means the
    /// plan does not include the meter at all.
    pub async fn consume(
        &self,
        user: &User,
        plan: Plan,
        meter: Meter,
        limit: i64,
        now: OffsetDateTime,
    ) -> Result<i64, AuthError> {
        if limit == catalog::UNLIMITED {
            return Ok(-1);
        }
        if limit == 0 {
            return Err(AuthError::FeatureNotIncluded { plan, meter });
        }

        let today = now.date();
        let mut counters = self.counters.lock().await;
        let entry = counters.entry((user.id, meter)).or_insert((today, 0));
        if entry.0 != today {
            *entry = (today, 0);
        }
        if entry.1 >= limit {
            return Err(AuthError::UsageLimitReached { meter, limit });
        }
        entry.1 += 1;
        Ok(limit - entry.1)
    }
}

#[derive(Clone)]
pub struct AccessGate {
    store: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    usage: Arc<UsageMeter>,
}

impl FromRef<AppState> for AccessGate {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            tokens: Arc::clone(&state.tokens),
            usage: Arc::clone(&state.usage),
        }
    }
}

impl AccessGate {
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: Arc<TokenService>,
        usage: Arc<UsageMeter>,
    ) -> Self {
        Self {
            store,
            tokens,
            usage,
        }
    }

    /// Resolves the token to an active account without any plan check.
    pub async fn identify(&self, token: &str) -> Result<User, AuthError> {
        let claims = self
            .tokens
            .validate(token)
            .map_err(AuthError::Unauthenticated)?;
        let user = self
            .store
            .find_by_id(claims.user_id)
            .await
            .map_err(AuthError::Store)?
            .ok_or(AuthError::UnknownIdentity)?;
        if !user.is_active {
            return Err(AuthError::InactiveAccount);
        }
        Ok(user)
    }

    pub async fn authorize(&self, token: &str, required_level: u8) -> Result<User, AuthError> {
        self.authorize_at(token, required_level, OffsetDateTime::now_utc())
            .await
    }

    #[instrument(skip(self, token))]
    pub async fn authorize_at(
        &self,
        token: &str,
        required_level: u8,
        now: OffsetDateTime,
    ) -> Result<User, AuthError> {
        let user = self.identify(token).await?;
        let plan = user.subscription.effective_plan(now);
        if catalog::get(plan).project_understanding_level < required_level {
            return Err(AuthError::InsufficientPlan {
                plan,
                required_level,
            });
        }
        debug!(user_id = user.id, %plan, "access granted");
        Ok(user)
    }

    /// `authorize` at the feature's level, then one unit off its daily meter.
    pub async fn authorize_feature(
        &self,
        token: &str,
        feature: Feature,
    ) -> Result<User, AuthError> {
        let now = OffsetDateTime::now_utc();
        let user = self.authorize_at(token, feature.required_level(), now).await?;
        let plan = user.subscription.effective_plan(now);
        let entitlement = catalog::get(plan);
        let limit = match feature.meter() {
            Meter::Completions => entitlement.code_completions_limit,
            Meter::Generation => entitlement.code_generation_limit,
        };
        let remaining = self
            .usage
            .consume(&user, plan, feature.meter(), limit, now)
            .await?;
        debug!(user_id = user.id, ?feature, remaining, "usage recorded");
        Ok(user)
    }
}

/// The authenticated, active caller.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let user = AccessGate::from_ref(state).identify(&token).await?;
        Ok(CurrentUser(user))
    }
}

use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument};

use super::plan::Plan;
use crate::state::AppState;
use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::User;

pub const MONTHLY_TERM: Duration = Duration::days(30);
pub const YEARLY_TERM: Duration = Duration::days(365);

const CANCEL_ATTEMPTS: usize = 3;

/// Current plan of one user. `plan == None` implies `expires_at == None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: Plan,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Cleared by cancellation; access still runs until `expires_at`.
    pub auto_renew: bool,
}

impl Subscription {
    pub fn none() -> Self {
        Self {
            plan: Plan::None,
            expires_at: None,
            auto_renew: false,
        }
    }

    /// A fresh term starting at `now`. Remaining time on a previous term is
    /// not carried over.
    pub fn starting(plan: Plan, is_yearly: bool, now: OffsetDateTime) -> Self {
        let term = if is_yearly { YEARLY_TERM } else { MONTHLY_TERM };
        Self {
            plan,
            expires_at: Some(now + term),
            auto_renew: true,
        }
    }

    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.plan.is_paid() && self.expires_at.is_some_and(|exp| exp > now)
    }

    /// Plan that governs access at `now`; a lapsed plan counts as `None`.
    pub fn effective_plan(&self, now: OffsetDateTime) -> Plan {
        if self.is_active(now) {
            self.plan
        } else {
            Plan::None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("user not found")]
    UnknownIdentity,
    #[error("plan {0} cannot be purchased")]
    UnknownPlan(Plan),
    #[error(transparent)]
    Store(anyhow::Error),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => LedgerError::UnknownIdentity,
            StoreError::DuplicateEmail => {
                LedgerError::Store(anyhow::anyhow!("unexpected duplicate email on ledger write"))
            }
            StoreError::Other(e) => LedgerError::Store(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    pub user_id: i64,
    pub current_plan: Plan,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub is_active: bool,
    pub auto_renew: bool,
}

impl SubscriptionStatus {
    pub fn of(user: &User, now: OffsetDateTime) -> Self {
        let sub = &user.subscription;
        Self {
            user_id: user.id,
            current_plan: sub.plan,
            expires_at: sub.expires_at,
            is_active: sub.is_active(now),
            auto_renew: sub.auto_renew,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Renewal switched off; access remains until the contained expiry.
    Scheduled { plan: Plan, expires_at: Option<OffsetDateTime> },
    /// Renewal was already off.
    AlreadyCancelled { plan: Plan, expires_at: Option<OffsetDateTime> },
    NothingToCancel,
}

/// Per-user plan and expiry, written only by payment confirmation and
/// cancellation.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn UserStore>,
}

impl FromRef<AppState> for Ledger {
    fn from_ref(state: &AppState) -> Self {
        Self::new(Arc::clone(&state.store))
    }
}

impl Ledger {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn confirm_payment(
        &self,
        user_id: i64,
        plan: Plan,
        is_yearly: bool,
    ) -> Result<Subscription, LedgerError> {
        self.confirm_payment_at(user_id, plan, is_yearly, OffsetDateTime::now_utc())
            .await
    }

    #[instrument(skip(self))]
    pub async fn confirm_payment_at(
        &self,
        user_id: i64,
        plan: Plan,
        is_yearly: bool,
        now: OffsetDateTime,
    ) -> Result<Subscription, LedgerError> {
        if !plan.is_paid() {
            return Err(LedgerError::UnknownPlan(plan));
        }
        let sub = Subscription::starting(plan, is_yearly, now);
        let user = self.store.set_subscription(user_id, sub).await?;
        info!(
            user_id,
            plan = %plan,
            expires_at = ?user.subscription.expires_at,
            "subscription updated"
        );
        Ok(user.subscription)
    }

    pub async fn cancel(&self, user_id: i64) -> Result<CancelOutcome, LedgerError> {
        self.cancel_at(user_id, OffsetDateTime::now_utc()).await
    }

    /// Switches renewal off in one store write, so a payment confirmed
    /// concurrently is never rolled back. A lapsed plan has nothing to cancel.
    #[instrument(skip(self))]
    pub async fn cancel_at(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> Result<CancelOutcome, LedgerError> {
        for _ in 0..CANCEL_ATTEMPTS {
            if let Some(user) = self.store.stop_renewal(user_id, now).await? {
                let sub = user.subscription;
                info!(user_id, plan = %sub.plan, "subscription set to lapse at expiry");
                return Ok(CancelOutcome::Scheduled {
                    plan: sub.plan,
                    expires_at: sub.expires_at,
                });
            }

            let user = self
                .store
                .find_by_id(user_id)
                .await
                .map_err(LedgerError::Store)?
                .ok_or(LedgerError::UnknownIdentity)?;
            let sub = user.subscription;
            if !sub.is_active(now) {
                return Ok(CancelOutcome::NothingToCancel);
            }
            if !sub.auto_renew {
                return Ok(CancelOutcome::AlreadyCancelled {
                    plan: sub.plan,
                    expires_at: sub.expires_at,
                });
            }
            // A renewing plan appeared after `stop_renewal`; go again.
        }
        Err(LedgerError::Store(anyhow::anyhow!(
            "cancel for user {user_id} kept racing payment confirmations"
        )))
    }

    pub async fn status(&self, user_id: i64) -> Result<SubscriptionStatus, LedgerError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await
            .map_err(LedgerError::Store)?
            .ok_or(LedgerError::UnknownIdentity)?;
        Ok(SubscriptionStatus::of(&user, OffsetDateTime::now_utc()))
    }
}

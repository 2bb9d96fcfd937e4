use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::subscriptions::{ledger::Subscription, plan::Plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

/// Account record. Owns its subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String, // argon2 PHC string
    pub is_active: bool,
    pub role: UserRole,
    pub subscription: Subscription,
    pub created_at: OffsetDateTime,
}

/// Input for `UserStore::create`. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub subscription: Subscription,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
}

/// Row shape of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub role: String,
    pub subscription_plan: String,
    pub subscription_expires_at: Option<OffsetDateTime>,
    pub subscription_auto_renew: bool,
    pub created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = match r.role.as_str() {
            "user" => UserRole::User,
            "admin" => UserRole::Admin,
            other => anyhow::bail!("unknown role {other:?} for user {}", r.id),
        };
        let plan: Plan = r.subscription_plan.parse()?;
        Ok(Self {
            id: r.id,
            email: r.email,
            full_name: r.full_name,
            password_hash: r.password_hash,
            is_active: r.is_active,
            role,
            subscription: Subscription {
                plan,
                expires_at: r.subscription_expires_at,
                auto_renew: r.subscription_auto_renew,
            },
            created_at: r.created_at,
        })
    }
}

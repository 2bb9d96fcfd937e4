use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::subscriptions::plan::Plan;
use crate::users::repo_types::{User, UserRole};

/// Account as returned to clients.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub role: UserRole,
    pub subscription_plan: Plan,
    #[serde(with = "time::serde::rfc3339::option")]
    pub subscription_expires_at: Option<OffsetDateTime>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            is_active: u.is_active,
            role: u.role,
            subscription_plan: u.subscription.plan,
            subscription_expires_at: u.subscription.expires_at,
        }
    }
}

/// Self-service profile update; absent fields stay as they are.
#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

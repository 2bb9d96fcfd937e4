use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::debug;

use crate::subscriptions::ledger::Subscription;
use crate::users::repo_types::{NewUser, User, UserChanges, UserRow};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Account storage. `create`, `update` and `set_subscription` are each one
/// atomic read-modify-write.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, StoreError>;
    async fn set_subscription(&self, id: i64, sub: Subscription) -> Result<User, StoreError>;
    /// Clears `auto_renew` if the user holds a paid plan that is still
    /// running at `now` and renews. `None` when nothing changed, including
    /// for an unknown id.
    async fn stop_renewal(&self, id: i64, now: OffsetDateTime) -> Result<Option<User>, StoreError>;
}

const USER_COLUMNS: &str = "id, email, full_name, password_hash, is_active, role, \
     subscription_plan, subscription_expires_at, subscription_auto_renew, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::Other(anyhow::Error::new(e)),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, full_name, password_hash, role,
                               subscription_plan, subscription_expires_at, subscription_auto_renew)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.full_name)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(new.subscription.plan.as_str())
        .bind(new.subscription.expires_at)
        .bind(new.subscription.auto_renew)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)?;
        debug!(user_id = row.id, "user row inserted");
        Ok(User::try_from(row)?)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select user by id")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET email         = COALESCE($2, email),
                   full_name     = COALESCE($3, full_name),
                   password_hash = COALESCE($4, password_hash),
                   is_active     = COALESCE($5, is_active)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.full_name)
        .bind(changes.password_hash)
        .bind(changes.is_active)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)?;
        Ok(User::try_from(row)?)
    }

    async fn set_subscription(&self, id: i64, sub: Subscription) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET subscription_plan       = $2,
                   subscription_expires_at = $3,
                   subscription_auto_renew = $4
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(sub.plan.as_str())
        .bind(sub.expires_at)
        .bind(sub.auto_renew)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)?;
        Ok(User::try_from(row)?)
    }

    async fn stop_renewal(&self, id: i64, now: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET subscription_auto_renew = FALSE
             WHERE id = $1
               AND subscription_plan <> 'none'
               AND subscription_auto_renew
               AND subscription_expires_at > $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_err)?;
        Ok(row.map(User::try_from).transpose()?)
    }
}

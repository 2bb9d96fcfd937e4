use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::auth::{
    dto::RegisterRequest,
    password::{hash_password, verify_password},
};
use crate::error::ApiError;
use crate::gate::AuthError;
use crate::subscriptions::{ledger::Subscription, plan::Plan};
use crate::users::{
    dto::UserUpdate,
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User, UserChanges, UserRole},
};

const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    /// Verified against when the email is unknown, so both login failures
    /// cost one argon2 run.
    static ref DUMMY_HASH: String =
        hash_password("codeassist-timing-equaliser").unwrap_or_default();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are stored trimmed and lowercased; lookups go through here too.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn checked_email(raw: &str) -> Result<String, ApiError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    Ok(email)
}

fn checked_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub async fn register(store: &dyn UserStore, req: RegisterRequest) -> Result<User, ApiError> {
    let email = checked_email(&req.email)?;
    checked_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let user = store
        .create(NewUser {
            email,
            full_name: req.full_name,
            password_hash,
            role: UserRole::User,
            subscription: Subscription::none(),
        })
        .await
        .map_err(|e| {
            if let StoreError::DuplicateEmail = e {
                warn!("email already registered");
            }
            ApiError::from(e)
        })?;
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Compares against the stored hash. A corrupt hash never matches.
pub fn verify_secret(user: &User, plaintext: &str) -> bool {
    match verify_password(plaintext, &user.password_hash) {
        Ok(ok) => ok,
        Err(e) => {
            error!(error = %e, user_id = user.id, "stored password hash unreadable");
            false
        }
    }
}

pub async fn authenticate(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    let email = normalize_email(email);
    let Some(user) = store.find_by_email(&email).await? else {
        let _ = verify_password(password, &DUMMY_HASH);
        warn!(email = %email, "login unknown email");
        return Err(ApiError::BadCredentials);
    };
    if !verify_secret(&user, password) {
        warn!(email = %email, user_id = user.id, "login invalid password");
        return Err(ApiError::BadCredentials);
    }
    if !user.is_active {
        return Err(AuthError::InactiveAccount.into());
    }
    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(user)
}

pub async fn update_profile(
    store: &dyn UserStore,
    user_id: i64,
    update: UserUpdate,
) -> Result<User, ApiError> {
    let email = update.email.as_deref().map(checked_email).transpose()?;
    let password_hash = match update.password.as_deref() {
        Some(p) => {
            checked_password(p)?;
            Some(hash_password(p)?)
        }
        None => None,
    };

    let user = store
        .update(
            user_id,
            UserChanges {
                email,
                full_name: update.full_name,
                password_hash,
                is_active: update.is_active,
            },
        )
        .await?;
    info!(user_id, "profile updated");
    Ok(user)
}

/// Two demo accounts for local runs; skipped when they already exist.
pub async fn seed_demo_users(store: &dyn UserStore) -> anyhow::Result<()> {
    let now = OffsetDateTime::now_utc();
    let demo = [
        ("user@example.com", "Test User", "string", Plan::Pro),
        ("basic@example.com", "Basic User", "basicpass", Plan::Basic),
    ];
    for (email, name, password, plan) in demo {
        if store.find_by_email(email).await?.is_some() {
            continue;
        }
        let created = store
            .create(NewUser {
                email: email.into(),
                full_name: Some(name.into()),
                password_hash: hash_password(password)?,
                role: UserRole::User,
                subscription: Subscription {
                    plan,
                    expires_at: Some(now + Duration::days(30)),
                    auto_renew: true,
                },
            })
            .await;
        match created {
            Ok(u) => info!(user_id = u.id, email, %plan, "demo user seeded"),
            Err(StoreError::DuplicateEmail) => {}
            Err(e) => return Err(anyhow::anyhow!(e)),
        }
    }
    Ok(())
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::subscriptions::ledger::Subscription;
use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{NewUser, User, UserChanges};

struct Inner {
    users: BTreeMap<i64, User>,
    next_id: i64,
}

/// Process-local store. Writers hold the lock across check and insert, so the
/// email uniqueness check cannot race.
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                users: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &BTreeMap<i64, User>, email: &str, except: Option<i64>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if email_taken(&inner.users, &new.email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let user = User {
            id,
            email: new.email,
            full_name: new.full_name,
            password_hash: new.password_hash,
            is_active: true,
            role: new.role,
            subscription: new.subscription,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(email) = &changes.email {
            if email_taken(&inner.users, email, Some(id)) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(full_name) = changes.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(active) = changes.is_active {
            user.is_active = active;
        }
        Ok(user.clone())
    }

    async fn set_subscription(&self, id: i64, sub: Subscription) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.subscription = sub;
        Ok(user.clone())
    }

    async fn stop_renewal(&self, id: i64, now: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        if !user.subscription.is_active(now) || !user.subscription.auto_renew {
            return Ok(None);
        }
        user.subscription.auto_renew = false;
        Ok(Some(user.clone()))
    }
}

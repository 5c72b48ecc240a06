//! In-memory credential store.
//!
//! Users and apps live in `HashMap`s guarded by a single `tokio::sync::RwLock`.
//! The email uniqueness check and the insert run under one write lock, so
//! concurrent registrations of the same email serialize and exactly one wins.
//!
//! Not durable: all state is lost on restart. Used by tests and local runs.

use super::{App, AppProvider, StorageError, StorageResult, User, UserProvider, UserSaver};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    next_user_id: i64,
    users: HashMap<i64, StoredUser>,
    /// email -> user id
    emails: HashMap<String, i64>,
    apps: HashMap<i64, App>,
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    is_admin: bool,
}

/// Cloneable handle; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision an app, replacing any app with the same id.
    pub async fn insert_app(&self, app: App) {
        self.inner.write().await.apps.insert(app.id, app);
    }

    /// Flip the admin flag of an existing user.
    ///
    /// # Errors
    /// `StorageError::UserNotFound` when the id does not exist.
    pub async fn set_admin(&self, user_id: i64, is_admin: bool) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .users
            .get_mut(&user_id)
            .ok_or(StorageError::UserNotFound)?;
        stored.is_admin = is_admin;
        Ok(())
    }

    /// Number of users whose email matches exactly.
    pub async fn count_users_with_email(&self, email: &str) -> usize {
        self.inner
            .read()
            .await
            .users
            .values()
            .filter(|stored| stored.user.email == email)
            .count()
    }
}

#[async_trait]
impl UserSaver for MemoryStore {
    async fn save_user(&self, email: &str, password_hash: &str) -> StorageResult<i64> {
        let mut inner = self.inner.write().await;
        if inner.emails.contains_key(email) {
            return Err(StorageError::UserExists);
        }

        inner.next_user_id += 1;
        let id = inner.next_user_id;
        inner.emails.insert(email.to_string(), id);
        inner.users.insert(
            id,
            StoredUser {
                user: User {
                    id,
                    email: email.to_string(),
                    password_hash: password_hash.to_string(),
                },
                is_admin: false,
            },
        );

        Ok(id)
    }
}

#[async_trait]
impl UserProvider for MemoryStore {
    async fn user(&self, email: &str) -> StorageResult<User> {
        let inner = self.inner.read().await;
        inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .map(|stored| stored.user.clone())
            .ok_or(StorageError::UserNotFound)
    }

    async fn is_admin(&self, user_id: i64) -> StorageResult<bool> {
        self.inner
            .read()
            .await
            .users
            .get(&user_id)
            .map(|stored| stored.is_admin)
            .ok_or(StorageError::UserNotFound)
    }
}

#[async_trait]
impl AppProvider for MemoryStore {
    async fn app(&self, app_id: i64) -> StorageResult<App> {
        self.inner
            .read()
            .await
            .apps
            .get(&app_id)
            .cloned()
            .ok_or(StorageError::AppNotFound)
    }
}

//! Credential store contract.
//!
//! The store is split by capability so each role can be backed by a different
//! system (a replica for reads, a queue for writes, a cache for apps) without the
//! authentication service noticing:
//!
//! - [`UserSaver`] creates users and owns the email uniqueness guarantee.
//! - [`UserProvider`] reads users and their admin flag.
//! - [`AppProvider`] resolves the calling application and its signing secret.
//!
//! Both bundled backends ([`postgres::PostgresStore`], [`memory::MemoryStore`])
//! implement all three.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A registered user as seen by the authentication core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// PHC-formatted adaptive hash; the plaintext password is never stored.
    pub password_hash: String,
}

/// A calling application (tenant) with its own token signing secret.
#[derive(Debug, Clone)]
pub struct App {
    pub id: i64,
    pub name: String,
    pub secret: SecretString,
}

impl App {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            secret: SecretString::from(secret.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("app not found")]
    AppNotFound,
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait UserSaver: Send + Sync {
    /// Atomically checks email uniqueness and inserts the user, returning its id.
    ///
    /// # Errors
    /// `StorageError::UserExists` when the email is already registered, even if the
    /// conflicting insert happens concurrently.
    async fn save_user(&self, email: &str, password_hash: &str) -> StorageResult<i64>;
}

#[async_trait]
pub trait UserProvider: Send + Sync {
    /// # Errors
    /// `StorageError::UserNotFound` when no user has this email.
    async fn user(&self, email: &str) -> StorageResult<User>;

    /// # Errors
    /// `StorageError::UserNotFound` when the id does not exist.
    async fn is_admin(&self, user_id: i64) -> StorageResult<bool>;
}

#[async_trait]
pub trait AppProvider: Send + Sync {
    /// # Errors
    /// `StorageError::AppNotFound` when the app is not provisioned.
    async fn app(&self, app_id: i64) -> StorageResult<App>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn app_debug_hides_secret() {
        let app = App::new(1, "web", "top-secret-value");
        let debug = format!("{app:?}");
        assert!(!debug.contains("top-secret-value"));
        assert_eq!(app.secret.expose_secret(), "top-secret-value");
    }
}

//! Postgres-backed credential store.
//!
//! `save_user` wraps the existence check and the insert in one transaction. The
//! `users_email_key` unique constraint is the final arbiter: an insert that loses a
//! race with a concurrent registration fails with SQLSTATE `23505`, which is
//! reported as `StorageError::UserExists`. If the caller drops the future
//! mid-flight the transaction is rolled back, so no partial write survives.

use super::{App, AppProvider, StorageError, StorageResult, User, UserProvider, UserSaver};
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::{error, Instrument};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/db/sql/01_sso.sql"));

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Open a connection pool.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .max_lifetime(Duration::from_secs(60 * 2))
            .acquire_timeout(Duration::from_secs(5))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `users` and `apps` tables if they are missing.
    ///
    /// # Errors
    /// Returns an error if the schema statements fail.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::Executor::execute(&self.pool, SCHEMA_SQL)
            .await
            .context("failed to execute schema SQL")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

async fn rollback(tx: sqlx::Transaction<'_, sqlx::Postgres>) {
    if let Err(err) = tx.rollback().await {
        error!("failed to roll back transaction: {err}");
    }
}

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[async_trait]
impl UserSaver for PostgresStore {
    async fn save_user(&self, email: &str, password_hash: &str) -> StorageResult<i64> {
        let mut tx = self.pool.begin().await?;

        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)";
        let exists: bool = sqlx::query(query)
            .bind(email)
            .fetch_one(&mut *tx)
            .instrument(db_span("SELECT", query))
            .await?
            .get(0);
        if exists {
            rollback(tx).await;
            return Err(StorageError::UserExists);
        }

        let query = "INSERT INTO users (email, pass_hash) VALUES ($1, $2) RETURNING id";
        let row = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await;

        let id: i64 = match row {
            Ok(row) => row.get("id"),
            Err(err) => {
                rollback(tx).await;
                if is_unique_violation(&err) {
                    return Err(StorageError::UserExists);
                }
                return Err(err.into());
            }
        };

        match tx.commit().await {
            Ok(()) => Ok(id),
            Err(err) if is_unique_violation(&err) => Err(StorageError::UserExists),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl UserProvider for PostgresStore {
    async fn user(&self, email: &str) -> StorageResult<User> {
        let query = "SELECT id, email, pass_hash FROM users WHERE email = $1";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?
            .ok_or(StorageError::UserNotFound)?;

        Ok(User {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("pass_hash"),
        })
    }

    async fn is_admin(&self, user_id: i64) -> StorageResult<bool> {
        let query = "SELECT is_admin FROM users WHERE id = $1";
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?
            .ok_or(StorageError::UserNotFound)?;

        Ok(row.get("is_admin"))
    }
}

#[async_trait]
impl AppProvider for PostgresStore {
    async fn app(&self, app_id: i64) -> StorageResult<App> {
        let query = "SELECT id, name, secret FROM apps WHERE id = $1";
        let row = sqlx::query(query)
            .bind(app_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?
            .ok_or(StorageError::AppNotFound)?;

        Ok(App {
            id: row.get("id"),
            name: row.get("name"),
            secret: SecretString::from(row.get::<String, _>("secret")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl sqlx::error::DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    #[test]
    fn unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn schema_declares_unique_email() {
        assert!(SCHEMA_SQL.contains("users_email_key UNIQUE (email)"));
        assert!(SCHEMA_SQL.contains("CREATE TABLE IF NOT EXISTS apps"));
    }
}

//! Runs against a real database only when `SSO_TEST_DSN` is set.
#![allow(clippy::unwrap_used)]

use sso::storage::{AppProvider, PostgresStore, StorageError, UserProvider, UserSaver};
use ulid::Ulid;

async fn store() -> Option<PostgresStore> {
    let dsn = std::env::var("SSO_TEST_DSN").ok()?;
    let store = PostgresStore::connect(&dsn, 5).await.unwrap();
    store.apply_schema().await.unwrap();
    Some(store)
}

fn unique_email() -> String {
    format!("{}@example.com", Ulid::new().to_string().to_lowercase())
}

#[tokio::test]
async fn save_and_read_user() {
    let Some(store) = store().await else {
        eprintln!("SSO_TEST_DSN not set, skipping");
        return;
    };

    let email = unique_email();
    let id = store.save_user(&email, "$argon2id$fake").await.unwrap();
    let user = store.user(&email).await.unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.password_hash, "$argon2id$fake");
    assert!(!store.is_admin(id).await.unwrap());

    assert!(matches!(
        store.save_user(&email, "$argon2id$other").await,
        Err(StorageError::UserExists)
    ));
    assert!(matches!(
        store.user(&unique_email()).await,
        Err(StorageError::UserNotFound)
    ));
    assert!(matches!(
        store.app(i64::MAX).await,
        Err(StorageError::AppNotFound)
    ));
}

#[tokio::test]
async fn concurrent_saves_store_one_row() {
    let Some(store) = store().await else {
        eprintln!("SSO_TEST_DSN not set, skipping");
        return;
    };

    let email = unique_email();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let email = email.clone();
            tokio::spawn(async move { store.save_user(&email, "$argon2id$fake").await })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(StorageError::UserExists) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(ok, 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

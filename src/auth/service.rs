//! The authentication service.
//!
//! `Auth` orchestrates login, registration, admin checks and token verification
//! over injected capabilities. It keeps no per-request state; the only shared
//! mutable state is whatever the configured [`LoginThrottle`] holds.

use super::{
    email_fingerprint, throttle_key, Argon2Hasher, AuthError, LoginThrottle, NoopThrottle,
    PasswordHashing, ThrottleDecision,
};
use crate::storage::{AppProvider, StorageError, UserProvider, UserSaver};
use crate::token::{peek_app_id, Claims, JwtIssuer, TokenIssuer};
use secrecy::SecretString;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{sync::OnceCell, task};
use tracing::{error, info, instrument, warn};

/// Hashed once, lazily, so lookups of unknown emails pay for a real verify.
const DECOY_PASSWORD: &str = "decoy-password-for-timing";

pub struct Auth {
    saver: Arc<dyn UserSaver>,
    users: Arc<dyn UserProvider>,
    apps: Arc<dyn AppProvider>,
    hasher: Arc<dyn PasswordHashing>,
    issuer: Arc<dyn TokenIssuer>,
    throttle: Arc<dyn LoginThrottle>,
    token_ttl: Duration,
    decoy_hash: OnceCell<String>,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

impl Auth {
    /// Build the service from its store capabilities and the token lifetime.
    ///
    /// Defaults to Argon2id hashing, HS256 tokens and no login throttling.
    #[must_use]
    pub fn new(
        saver: Arc<dyn UserSaver>,
        users: Arc<dyn UserProvider>,
        apps: Arc<dyn AppProvider>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            saver,
            users,
            apps,
            hasher: Arc::new(Argon2Hasher::default()),
            issuer: Arc::new(JwtIssuer::new()),
            throttle: Arc::new(NoopThrottle),
            token_ttl,
            decoy_hash: OnceCell::new(),
        }
    }

    /// Use one store for all three capabilities.
    #[must_use]
    pub fn from_store<S>(store: S, token_ttl: Duration) -> Self
    where
        S: UserSaver + UserProvider + AppProvider + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store.clone(), store, token_ttl)
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHashing>) -> Self {
        self.hasher = hasher;
        self.decoy_hash = OnceCell::new();
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_throttle(mut self, throttle: Arc<dyn LoginThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// Authenticate `email`/`password` and issue a token for `app_id`.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password (never
    /// distinguished), `InvalidAppId` for an unknown app, `TooManyAttempts` when the
    /// throttle has locked the key, `Internal` for anything else.
    #[instrument(skip_all, fields(op = "auth.login", email = %email_fingerprint(email), app_id = app_id))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
        app_id: i64,
    ) -> Result<String, AuthError> {
        info!("attempting to login user");

        let key = throttle_key(email, app_id);
        // counted as a failure up front; cleared only on success
        if self.throttle.try_acquire(&key) == ThrottleDecision::Limited {
            warn!("too many failed login attempts");
            return Err(AuthError::TooManyAttempts);
        }

        let user = match self.users.user(email).await {
            Ok(user) => Some(user),
            Err(StorageError::UserNotFound) => {
                warn!("user not found");
                None
            }
            Err(err) => {
                error!("failed to get user: {err}");
                return Err(AuthError::internal(err));
            }
        };

        let stored_hash = match &user {
            Some(user) => Some(user.password_hash.clone()),
            None => self.decoy_hash().await,
        };
        let matched = match stored_hash {
            Some(hash) => self.verify_password(password, hash).await?,
            None => false,
        };

        let Some(user) = user.filter(|_| matched) else {
            info!("invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };
        self.throttle.record_success(&key);

        let app = match self.apps.app(app_id).await {
            Ok(app) => app,
            Err(StorageError::AppNotFound) => {
                warn!("app not found");
                return Err(AuthError::InvalidAppId);
            }
            Err(err) => {
                error!("failed to get app: {err}");
                return Err(AuthError::internal(err));
            }
        };

        let token = self
            .issuer
            .issue(&user, &app, self.token_ttl)
            .map_err(|err| {
                error!("failed to generate token: {err}");
                AuthError::internal(err)
            })?;

        info!(uid = user.id, "user logged in successfully");

        Ok(token)
    }

    /// Hash the password and store a new user.
    ///
    /// # Errors
    /// `UserExists` if the email is taken, `Internal` otherwise.
    #[instrument(skip_all, fields(op = "auth.register", email = %email_fingerprint(email)))]
    pub async fn register(&self, email: &str, password: &SecretString) -> Result<i64, AuthError> {
        info!("registering user");

        let hasher = Arc::clone(&self.hasher);
        let password = password.clone();
        let password_hash = task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(AuthError::internal)?
            .map_err(|err| {
                error!("failed to generate password hash: {err}");
                AuthError::internal(err)
            })?;

        match self.saver.save_user(email, &password_hash).await {
            Ok(id) => {
                info!(uid = id, "user registered");
                Ok(id)
            }
            Err(StorageError::UserExists) => {
                warn!("user already exists");
                Err(AuthError::UserExists)
            }
            Err(err) => {
                error!("failed to save user: {err}");
                Err(AuthError::internal(err))
            }
        }
    }

    /// # Errors
    /// `UserNotFound` for an unknown id, `Internal` otherwise.
    #[instrument(skip(self), fields(op = "auth.is_admin"))]
    pub async fn is_admin(&self, user_id: i64) -> Result<bool, AuthError> {
        match self.users.is_admin(user_id).await {
            Ok(is_admin) => {
                info!(is_admin, "checked if user is admin");
                Ok(is_admin)
            }
            Err(StorageError::UserNotFound) => {
                warn!("user not found");
                Err(AuthError::UserNotFound)
            }
            Err(err) => {
                error!("failed to check admin flag: {err}");
                Err(AuthError::internal(err))
            }
        }
    }

    /// Verify a token with the secret of the app named in its `app_id` claim.
    ///
    /// # Errors
    /// `InvalidCredentials` for a malformed, forged or expired token, `InvalidAppId`
    /// if the claimed app does not exist, `Internal` otherwise.
    #[instrument(skip_all, fields(op = "auth.verify_token", app_id = tracing::field::Empty))]
    pub async fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let app_id = peek_app_id(token).map_err(|err| {
            info!("rejected token: {err}");
            AuthError::InvalidCredentials
        })?;
        tracing::Span::current().record("app_id", app_id);

        let app = match self.apps.app(app_id).await {
            Ok(app) => app,
            Err(StorageError::AppNotFound) => {
                warn!("app not found");
                return Err(AuthError::InvalidAppId);
            }
            Err(err) => {
                error!("failed to get app: {err}");
                return Err(AuthError::internal(err));
            }
        };

        self.issuer.verify(token, &app).map_err(|err| {
            info!("rejected token: {err}");
            AuthError::InvalidCredentials
        })
    }

    async fn verify_password(
        &self,
        password: &SecretString,
        password_hash: String,
    ) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.clone();
        task::spawn_blocking(move || hasher.verify(&password, &password_hash))
            .await
            .map_err(AuthError::internal)?
            .map_err(|err| {
                error!("failed to verify password: {err}");
                AuthError::internal(err)
            })
    }

    async fn decoy_hash(&self) -> Option<String> {
        let hasher = Arc::clone(&self.hasher);
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| async move {
                let password = SecretString::from(DECOY_PASSWORD.to_string());
                task::spawn_blocking(move || hasher.hash(&password))
                    .await
                    .map_err(AuthError::internal)?
                    .map_err(AuthError::internal)
            })
            .await;

        match decoy {
            Ok(hash) => Some(hash.clone()),
            Err(err) => {
                error!("failed to prepare decoy hash: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::AttemptThrottle;
    use crate::storage::{App, MemoryStore, StorageResult, User};
    use crate::token::TokenError;
    use async_trait::async_trait;

    const TTL: Duration = Duration::from_secs(3600);

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    async fn service() -> (Auth, MemoryStore) {
        let store = MemoryStore::new();
        store.insert_app(App::new(1, "web", "test-secret")).await;
        let auth = Auth::from_store(store.clone(), TTL)
            .with_hasher(Arc::new(Argon2Hasher::new(1024, 1).unwrap()));
        (auth, store)
    }

    /// Store whose every call fails with a connectivity error.
    struct BrokenStore;

    #[async_trait]
    impl UserSaver for BrokenStore {
        async fn save_user(&self, _email: &str, _password_hash: &str) -> StorageResult<i64> {
            Err(anyhow::anyhow!("connection refused").into())
        }
    }

    #[async_trait]
    impl UserProvider for BrokenStore {
        async fn user(&self, _email: &str) -> StorageResult<User> {
            Err(anyhow::anyhow!("connection refused").into())
        }

        async fn is_admin(&self, _user_id: i64) -> StorageResult<bool> {
            Err(anyhow::anyhow!("connection refused").into())
        }
    }

    #[async_trait]
    impl AppProvider for BrokenStore {
        async fn app(&self, _app_id: i64) -> StorageResult<App> {
            Err(anyhow::anyhow!("connection refused").into())
        }
    }

    struct FailingIssuer;

    impl TokenIssuer for FailingIssuer {
        fn issue(&self, _user: &User, _app: &App, _ttl: Duration) -> Result<String, TokenError> {
            Err(TokenError::EmptySecret)
        }

        fn verify(&self, _token: &str, _app: &App) -> Result<Claims, TokenError> {
            Err(TokenError::Malformed)
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let (auth, _store) = service().await;
        let id = auth
            .register("user@example.com", &secret("password1"))
            .await
            .unwrap();
        let token = auth
            .login("user@example.com", &secret("password1"), 1)
            .await
            .unwrap();

        let claims = auth.verify_token(&token).await.unwrap();
        assert_eq!(claims.uid, id);
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.app_id, 1);
    }

    #[tokio::test]
    async fn duplicate_register_is_user_exists() {
        let (auth, _store) = service().await;
        auth.register("dup@example.com", &secret("password1"))
            .await
            .unwrap();
        let err = auth
            .register("dup@example.com", &secret("password2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let (auth, _store) = service().await;
        auth.register("known@example.com", &secret("password1"))
            .await
            .unwrap();

        let unknown = auth
            .login("unknown@example.com", &secret("password1"), 1)
            .await
            .unwrap_err();
        let wrong = auth
            .login("known@example.com", &secret("password2"), 1)
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn unknown_app_is_invalid_app_id() {
        let (auth, _store) = service().await;
        auth.register("user@example.com", &secret("password1"))
            .await
            .unwrap();
        let err = auth
            .login("user@example.com", &secret("password1"), 99)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAppId));
    }

    #[tokio::test]
    async fn is_admin_reports_flag_and_missing_user() {
        let (auth, store) = service().await;
        let id = auth
            .register("admin@example.com", &secret("password1"))
            .await
            .unwrap();
        assert!(!auth.is_admin(id).await.unwrap());

        store.set_admin(id, true).await.unwrap();
        assert!(auth.is_admin(id).await.unwrap());

        assert!(matches!(
            auth.is_admin(id + 100).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn store_failures_become_internal() {
        let auth = Auth::from_store(BrokenStore, TTL)
            .with_hasher(Arc::new(Argon2Hasher::new(1024, 1).unwrap()));

        assert!(matches!(
            auth.register("a@example.com", &secret("password1")).await,
            Err(AuthError::Internal(_))
        ));
        assert!(matches!(
            auth.login("a@example.com", &secret("password1"), 1).await,
            Err(AuthError::Internal(_))
        ));
        assert!(matches!(auth.is_admin(1).await, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn signing_failure_is_internal() {
        let (auth, _store) = service().await;
        let auth = auth.with_issuer(Arc::new(FailingIssuer));
        auth.register("user@example.com", &secret("password1"))
            .await
            .unwrap();
        assert!(matches!(
            auth.login("user@example.com", &secret("password1"), 1).await,
            Err(AuthError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn throttle_locks_even_the_right_password() {
        let (auth, _store) = service().await;
        let auth = auth.with_throttle(Arc::new(AttemptThrottle::new(
            3,
            Duration::from_secs(60),
        )));
        auth.register("victim@example.com", &secret("password1"))
            .await
            .unwrap();

        for _ in 0..3 {
            assert!(matches!(
                auth.login("victim@example.com", &secret("wrong-password"), 1)
                    .await,
                Err(AuthError::InvalidCredentials)
            ));
        }

        assert!(matches!(
            auth.login("victim@example.com", &secret("password1"), 1).await,
            Err(AuthError::TooManyAttempts)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_wrong_passwords_cannot_exceed_the_limit() {
        let (auth, _store) = service().await;
        let auth = Arc::new(auth.with_throttle(Arc::new(AttemptThrottle::new(
            3,
            Duration::from_secs(300),
        ))));
        auth.register("burst@example.com", &secret("password1"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let auth = Arc::clone(&auth);
                tokio::spawn(async move {
                    auth.login("burst@example.com", &secret("wrong-password"), 1)
                        .await
                })
            })
            .collect();

        let mut checked = 0;
        let mut limited = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Err(AuthError::InvalidCredentials) => checked += 1,
                Err(AuthError::TooManyAttempts) => limited += 1,
                other => panic!("unexpected result: {other:?}"),
            }
        }
        assert_eq!(checked, 3);
        assert_eq!(limited, 37);

        assert!(matches!(
            auth.login("burst@example.com", &secret("password1"), 1).await,
            Err(AuthError::TooManyAttempts)
        ));
    }

    #[tokio::test]
    async fn verify_token_rejects_garbage_and_unknown_app() {
        let (auth, _store) = service().await;
        assert!(matches!(
            auth.verify_token("garbage").await,
            Err(AuthError::InvalidCredentials)
        ));

        let other = App::new(5, "ghost", "ghost-secret");
        let user = User {
            id: 1,
            email: "user@example.com".to_string(),
            password_hash: String::new(),
        };
        let token = JwtIssuer::new().issue(&user, &other, TTL).unwrap();
        assert!(matches!(
            auth.verify_token(&token).await,
            Err(AuthError::InvalidAppId)
        ));
    }
}

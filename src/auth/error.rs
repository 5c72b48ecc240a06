use thiserror::Error;

/// Closed set of failures the authentication service hands back to callers.
///
/// Store, hasher and issuer errors never leave the service directly; anything that
/// is not a domain outcome is wrapped in `Internal` and only kept as its source.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid app id")]
    InvalidAppId,
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("too many login attempts")]
    TooManyAttempts,
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

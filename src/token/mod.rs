//! Session tokens: HS256 JWTs signed with the calling app's secret.
//!
//! The app secret is the only key ever used, both to sign and to verify; there is
//! no process-wide default key. A token carries `uid`, `email`, `app_id` and
//! `exp` (Unix seconds) and verifies only against the app that signed it.

use crate::storage::{App, User};
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Claims {
    pub uid: i64,
    pub email: String,
    pub app_id: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("app secret is empty")]
    EmptySecret,
    #[error("invalid token ttl")]
    InvalidTtl,
    #[error("invalid token format")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token was issued for app {token} but verified against app {expected}")]
    AppMismatch { token: i64, expected: i64 },
    #[error("jwt error")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Builds and checks session tokens.
pub trait TokenIssuer: Send + Sync {
    /// Sign a token for `user` on behalf of `app`, expiring `ttl` from now.
    ///
    /// # Errors
    /// Fails only when signing fails (empty secret, out-of-range ttl).
    fn issue(&self, user: &User, app: &App, ttl: Duration) -> Result<String, TokenError>;

    /// Check signature, expiry and the `app_id` binding against `app`.
    ///
    /// # Errors
    /// Returns the reason the token was rejected.
    fn verify(&self, token: &str, app: &App) -> Result<Claims, TokenError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JwtIssuer;

impl JwtIssuer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Same as [`TokenIssuer::issue`] with an explicit issue time, so output is
    /// reproducible.
    ///
    /// # Errors
    /// Fails when the secret is empty, the expiry overflows, or encoding fails.
    pub fn issue_at(
        &self,
        user: &User,
        app: &App,
        ttl: Duration,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let secret = app.secret.expose_secret();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let ttl = i64::try_from(ttl.as_secs()).map_err(|_| TokenError::InvalidTtl)?;
        let exp = issued_at.checked_add(ttl).ok_or(TokenError::InvalidTtl)?;

        let claims = Claims {
            uid: user.id,
            email: user.email.clone(),
            app_id: app.id,
            exp,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?)
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, user: &User, app: &App, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(user, app, ttl, now_unix_seconds())
    }

    fn verify(&self, token: &str, app: &App) -> Result<Claims, TokenError> {
        let secret = app.secret.expose_secret();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|err| match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
            _ => TokenError::Jwt(err),
        })?;

        if data.claims.app_id != app.id {
            return Err(TokenError::AppMismatch {
                token: data.claims.app_id,
                expected: app.id,
            });
        }

        Ok(data.claims)
    }
}

#[derive(Deserialize)]
struct AppIdClaim {
    app_id: i64,
}

/// Read the `app_id` claim without verifying anything.
///
/// Only used to pick which app's secret to verify with; the result must never be
/// trusted on its own.
///
/// # Errors
/// `TokenError::Malformed` if the token is not three base64url segments with a
/// JSON payload carrying a numeric `app_id`.
pub fn peek_app_id(token: &str) -> Result<i64, TokenError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let bytes = Base64UrlUnpadded::decode_vec(payload).map_err(|_| TokenError::Malformed)?;
    let claim: AppIdClaim = serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)?;
    Ok(claim.app_id)
}

#[must_use]
pub fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 1,
            email: "test_user_email@example.com".to_string(),
            password_hash: String::new(),
        }
    }

    #[test]
    fn issued_token_carries_claims() {
        let app = App::new(1, "web", "test_app_secret");
        let issuer = JwtIssuer::new();
        let before = now_unix_seconds();
        let token = issuer
            .issue(&user(), &app, Duration::from_secs(24 * 60 * 60))
            .unwrap();

        assert_eq!(token.split('.').count(), 3);

        let claims = issuer.verify(&token, &app).unwrap();
        assert_eq!(claims.uid, 1);
        assert_eq!(claims.email, "test_user_email@example.com");
        assert_eq!(claims.app_id, 1);
        assert!((claims.exp - (before + 24 * 60 * 60)).abs() <= 2);
    }

    #[test]
    fn issue_is_deterministic_for_fixed_time() {
        let app = App::new(1, "web", "secret");
        let issuer = JwtIssuer::new();
        let now = now_unix_seconds();
        let a = issuer
            .issue_at(&user(), &app, Duration::from_secs(60), now)
            .unwrap();
        let b = issuer
            .issue_at(&user(), &app, Duration::from_secs(60), now)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn other_app_secret_is_rejected() {
        let app_a = App::new(1, "a", "secret-a");
        let app_b = App::new(1, "b", "secret-b");
        let issuer = JwtIssuer::new();
        let token = issuer
            .issue(&user(), &app_a, Duration::from_secs(60))
            .unwrap();

        assert!(matches!(
            issuer.verify(&token, &app_b),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn app_id_binding_is_checked() {
        let app = App::new(1, "a", "shared");
        let twin = App::new(2, "b", "shared");
        let issuer = JwtIssuer::new();
        let token = issuer.issue(&user(), &app, Duration::from_secs(60)).unwrap();

        assert!(matches!(
            issuer.verify(&token, &twin),
            Err(TokenError::AppMismatch {
                token: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let app = App::new(1, "web", "secret");
        let issuer = JwtIssuer::new();
        let token = issuer
            .issue_at(&user(), &app, Duration::from_secs(1), now_unix_seconds() - 10)
            .unwrap();

        assert!(matches!(
            issuer.verify(&token, &app),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn altered_payload_is_rejected() {
        let app = App::new(1, "web", "secret");
        let issuer = JwtIssuer::new();
        let token = issuer.issue(&user(), &app, Duration::from_secs(60)).unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let forged = Claims {
            uid: 999,
            email: "attacker@example.com".to_string(),
            app_id: 1,
            exp: now_unix_seconds() + 60,
        };
        let forged_payload =
            Base64UrlUnpadded::encode_string(&serde_json::to_vec(&forged).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(
            issuer.verify(&tampered, &app),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let app = App::new(1, "web", "secret");
        let issuer = JwtIssuer::new();
        assert!(matches!(
            issuer.verify("not-a-token", &app),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn empty_secret_cannot_sign() {
        let app = App::new(1, "web", "");
        let issuer = JwtIssuer::new();
        assert!(matches!(
            issuer.issue(&user(), &app, Duration::from_secs(60)),
            Err(TokenError::EmptySecret)
        ));
    }

    #[test]
    fn peek_reads_app_id() {
        let app = App::new(42, "web", "secret");
        let token = JwtIssuer::new()
            .issue(&user(), &app, Duration::from_secs(60))
            .unwrap();
        assert_eq!(peek_app_id(&token).unwrap(), 42);
        assert!(matches!(peek_app_id("a.b"), Err(TokenError::Malformed)));
        assert!(matches!(
            peek_app_id("a.!!!.c"),
            Err(TokenError::Malformed)
        ));
    }
}

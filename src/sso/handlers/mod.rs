//! HTTP handlers and the shared request validation / error mapping.

pub mod health;
pub use self::health::health;

pub mod user_register;
pub use self::user_register::register;

pub mod user_login;
pub use self::user_login::login;

pub mod user_admin;
pub use self::user_admin::is_admin;

pub mod token_verify;
pub use self::token_verify::verify;

use crate::auth::AuthError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use tracing::error;

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 32;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Length is counted in characters, not bytes.
pub fn valid_password(password: &str) -> bool {
    (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password.chars().count())
}

/// Translate a domain error into a status code and a message safe for callers.
///
/// `Internal` details are logged here and never sent back.
pub fn error_response(err: &AuthError) -> Response {
    let (status, message) = match err {
        AuthError::InvalidCredentials => (StatusCode::BAD_REQUEST, "invalid email or password"),
        AuthError::InvalidAppId => (StatusCode::BAD_REQUEST, "invalid app id"),
        AuthError::UserExists => (StatusCode::CONFLICT, "user already exists"),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "user not found"),
        AuthError::TooManyAttempts => (
            StatusCode::TOO_MANY_REQUESTS,
            "too many failed login attempts",
        ),
        AuthError::Internal(source) => {
            error!("internal error: {source:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    };

    (status, message.to_string()).into_response()
}

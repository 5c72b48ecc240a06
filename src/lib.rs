//! # SSO (single sign-on credential service)
//!
//! Users register once with an email and password and log in on behalf of a
//! calling application. A successful login returns a short-lived HS256 token
//! signed with that application's own secret, so each app can verify tokens
//! without sharing keys with the others.
//!
//! ## Layout
//!
//! - [`storage`]: capability traits for users and apps, with Postgres and
//!   in-memory backends.
//! - [`token`]: token claims, signing and verification.
//! - [`auth`]: the login/register/admin flows, password hashing and throttling.
//! - [`sso`]: the HTTP/JSON transport.
//! - [`cli`]: configuration, telemetry and process lifecycle.
//!
//! ## Credential handling
//!
//! Passwords are stored only as Argon2id hashes. An unknown email and a wrong
//! password produce the same error and take comparable time, so the login
//! endpoint cannot be used to discover which emails are registered.

pub mod auth;
pub mod cli;
pub mod sso;
pub mod storage;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // non-git build
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }
}

//! Adaptive password hashing.
//!
//! Passwords are stored as Argon2id PHC strings. Verification reads the algorithm
//! parameters from the stored string, so raising the cost only affects new hashes
//! and old ones keep verifying.

use argon2::{
    password_hash::{Error as PhcError, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hashing parameters")]
    Params,
    #[error("failed to hash password")]
    Hash,
    #[error("stored password hash is invalid")]
    InvalidHash,
}

/// Pluggable one-way password hashing.
pub trait PasswordHashing: Send + Sync {
    /// Hash a password with a fresh salt.
    ///
    /// # Errors
    /// `HashError::Hash` if the underlying primitive fails.
    fn hash(&self, password: &SecretString) -> Result<String, HashError>;

    /// Check a password against a stored hash. A mismatch is `Ok(false)`.
    ///
    /// # Errors
    /// `HashError::InvalidHash` if the stored hash cannot be parsed.
    fn verify(&self, password: &SecretString, password_hash: &str) -> Result<bool, HashError>;
}

#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: argon2::Params,
}

impl Argon2Hasher {
    /// Argon2id with explicit cost: memory in KiB and number of passes.
    ///
    /// # Errors
    /// `HashError::Params` if the cost is outside what Argon2 accepts.
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, HashError> {
        let params =
            argon2::Params::new(memory_kib, iterations, 1, None).map_err(|_| HashError::Params)?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        )
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: argon2::Params::default(),
        }
    }
}

impl PasswordHashing for Argon2Hasher {
    fn hash(&self, password: &SecretString) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map_err(|_| HashError::Hash)?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, password: &SecretString, password_hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(password_hash).map_err(|_| HashError::InvalidHash)?;
        match self
            .argon2()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
        {
            Ok(()) => Ok(true),
            Err(PhcError::Password) => Ok(false),
            Err(_) => Err(HashError::InvalidHash),
        }
    }
}

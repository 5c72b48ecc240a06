//! Authentication core: credential checks, password hashing, login throttling
//! and the service that ties them to the credential store and token issuer.

mod error;
mod fingerprint;
mod hasher;
mod service;
mod throttle;

pub use error::AuthError;
pub use fingerprint::email_fingerprint;
pub use hasher::{Argon2Hasher, HashError, PasswordHashing};
pub use service::Auth;
pub use throttle::{throttle_key, AttemptThrottle, LoginThrottle, NoopThrottle, ThrottleDecision};

use sha2::{Digest, Sha256};

const FINGERPRINT_LEN: usize = 12;

/// Short, stable stand-in for an email address in logs.
///
/// Lets operators correlate log lines for one account without writing the address
/// itself anywhere.
#[must_use]
pub fn email_fingerprint(email: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(email.trim().to_lowercase().as_bytes()));
    digest[..FINGERPRINT_LEN].to_string()
}

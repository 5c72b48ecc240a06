use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    Ok(Action::Server(Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: SecretString::from(dsn),
        db_max_connections: matches
            .get_one::<u32>("db-max-connections")
            .copied()
            .unwrap_or(5),
        migrate: matches.get_flag("migrate"),
        token_ttl: Duration::from_secs(
            matches.get_one::<u64>("token-ttl").copied().unwrap_or(3600),
        ),
        request_timeout: Duration::from_secs(
            matches
                .get_one::<u64>("request-timeout")
                .copied()
                .unwrap_or(10),
        ),
        argon2_memory_kib: matches
            .get_one::<u32>("argon2-memory-kib")
            .copied()
            .unwrap_or(19456),
        argon2_iterations: matches
            .get_one::<u32>("argon2-iterations")
            .copied()
            .unwrap_or(2),
        login_max_attempts: matches
            .get_one::<u32>("login-max-attempts")
            .copied()
            .unwrap_or(0),
        login_cooldown: Duration::from_secs(
            matches
                .get_one::<u64>("login-cooldown")
                .copied()
                .unwrap_or(900),
        ),
    }))
}

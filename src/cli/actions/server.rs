use crate::{
    auth::{Argon2Hasher, AttemptThrottle, Auth},
    cli::telemetry,
    sso,
    storage::PostgresStore,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub db_max_connections: u32,
    pub migrate: bool,
    pub token_ttl: Duration,
    pub request_timeout: Duration,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub login_max_attempts: u32,
    pub login_cooldown: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the schema cannot be
/// applied, the hashing cost is invalid, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let hasher = Argon2Hasher::new(args.argon2_memory_kib, args.argon2_iterations)
        .context("invalid argon2 cost")?;

    let store = PostgresStore::connect(args.dsn.expose_secret(), args.db_max_connections).await?;

    if args.migrate {
        store.apply_schema().await?;
        info!("schema applied");
    }

    let mut auth = Auth::from_store(store.clone(), args.token_ttl).with_hasher(Arc::new(hasher));
    if args.login_max_attempts > 0 {
        auth = auth.with_throttle(Arc::new(AttemptThrottle::new(
            args.login_max_attempts,
            args.login_cooldown,
        )));
    }

    let router = sso::router(Arc::new(auth), args.request_timeout);
    let result = sso::serve(args.port, router).await;

    store.close().await;
    info!("database pool closed");
    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let throttle = if args.login_max_attempts > 0 {
        format!(
            "{} attempts / {}s",
            args.login_max_attempts,
            args.login_cooldown.as_secs()
        )
    } else {
        "disabled".to_string()
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(args.dsn.expose_secret())),
        ("db_max_connections", args.db_max_connections.to_string()),
        ("migrate", args.migrate.to_string()),
        ("token_ttl", format!("{}s", args.token_ttl.as_secs())),
        (
            "request_timeout",
            format!("{}s", args.request_timeout.as_secs()),
        ),
        (
            "argon2",
            format!(
                "m={}KiB t={}",
                args.argon2_memory_kib, args.argon2_iterations
            ),
        ),
        ("login_throttle", throttle),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

use clap::{Arg, Command};

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_hashing_args(command);
    with_throttle_args(command)
}

fn with_token_args(command: Command) -> Command {
    command.arg(
        Arg::new("token-ttl")
            .long("token-ttl")
            .help("Session token lifetime in seconds")
            .env("SSO_TOKEN_TTL")
            .default_value("3600")
            .value_parser(clap::value_parser!(u64).range(1..)),
    )
}

fn with_hashing_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("argon2-memory-kib")
                .long("argon2-memory-kib")
                .help("Argon2id memory cost in KiB for new password hashes")
                .env("SSO_ARGON2_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("argon2-iterations")
                .long("argon2-iterations")
                .help("Argon2id number of passes for new password hashes")
                .env("SSO_ARGON2_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
}

fn with_throttle_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("login-max-attempts")
                .long("login-max-attempts")
                .help("Failed logins per email and app before logins are refused (0 disables)")
                .env("SSO_LOGIN_MAX_ATTEMPTS")
                .default_value("0")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("login-cooldown")
                .long("login-cooldown")
                .help("Seconds after the last failed login before the counter resets")
                .env("SSO_LOGIN_COOLDOWN")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
}

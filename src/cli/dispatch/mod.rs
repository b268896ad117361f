//! Command-line argument dispatch and server initialization.
//!
//! This module takes validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, mail};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let cors_origin = matches
        .get_one::<String>("cors-origin")
        .cloned()
        .unwrap_or_else(|| "http://localhost:3000".to_string());

    let auth_opts = auth::Options::parse(matches)?;
    let mail_opts = mail::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        cors_origin,
        token_secret: auth_opts.token_secret,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        code_ttl_seconds: auth_opts.code_ttl_seconds,
        code_cooldown_seconds: auth_opts.code_cooldown_seconds,
        mail_relay_url: mail_opts.relay_url,
        mail_from_address: mail_opts.from_address,
        mail_from_name: mail_opts.from_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_secret_required() {
        temp_env::with_vars(
            [
                ("PORTIERE_TOKEN_SECRET", None::<&str>),
                (
                    "PORTIERE_DSN",
                    Some("postgres://user@localhost:5432/portiere"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["portiere"]);
                // clap enforces the secret before dispatch runs
                assert_eq!(
                    result.map(|_| ()).map_err(|e| e.kind()),
                    Err(clap::error::ErrorKind::MissingRequiredArgument)
                );
            },
        );
    }

    #[test]
    fn builds_server_action() {
        temp_env::with_vars(
            [
                ("PORTIERE_TOKEN_SECRET", Some("sekret")),
                (
                    "PORTIERE_DSN",
                    Some("postgres://user@localhost:5432/portiere"),
                ),
                ("PORTIERE_CODE_TTL", Some("120")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["portiere", "--port", "9090"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 9090);
                    assert_eq!(args.dsn, "postgres://user@localhost:5432/portiere");
                    assert_eq!(args.token_secret, "sekret");
                    assert_eq!(args.code_ttl_seconds, 120);
                    assert_eq!(args.code_cooldown_seconds, 60);
                    assert_eq!(args.mail_relay_url, None);
                }
            },
        );
    }
}

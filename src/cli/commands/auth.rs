use clap::{Arg, ArgMatches, Command};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL: &str = "token-ttl-seconds";
pub const ARG_CODE_TTL: &str = "code-ttl-seconds";
pub const ARG_CODE_COOLDOWN: &str = "code-cooldown-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub token_secret: String,
    pub token_ttl_seconds: i64,
    pub code_ttl_seconds: u64,
    pub code_cooldown_seconds: u64,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let token_secret = matches.get_one::<String>(ARG_TOKEN_SECRET).cloned();
        let token_secret = match token_secret {
            Some(value) if !value.trim().is_empty() => value,
            _ => anyhow::bail!("missing required argument: --{ARG_TOKEN_SECRET}"),
        };

        Ok(Self {
            token_secret,
            token_ttl_seconds: matches
                .get_one::<i64>(ARG_TOKEN_TTL)
                .copied()
                .unwrap_or(604_800),
            code_ttl_seconds: matches.get_one::<u64>(ARG_CODE_TTL).copied().unwrap_or(300),
            code_cooldown_seconds: matches
                .get_one::<u64>(ARG_CODE_COOLDOWN)
                .copied()
                .unwrap_or(60),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("Secret used to sign and verify bearer tokens (HS256)")
                .env("PORTIERE_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL)
                .long(ARG_TOKEN_TTL)
                .help("Bearer token TTL in seconds")
                .env("PORTIERE_TOKEN_TTL")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_CODE_TTL)
                .long(ARG_CODE_TTL)
                .help("Verification code TTL in seconds")
                .env("PORTIERE_CODE_TTL")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_CODE_COOLDOWN)
                .long(ARG_CODE_COOLDOWN)
                .help("Cooldown before sending another code to the same address")
                .env("PORTIERE_CODE_COOLDOWN")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        temp_env::with_vars(
            [
                ("PORTIERE_TOKEN_TTL", None::<&str>),
                ("PORTIERE_CODE_TTL", None),
                ("PORTIERE_CODE_COOLDOWN", None),
                ("PORTIERE_TOKEN_SECRET", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "portiere",
                    "--dsn",
                    "postgres://localhost/portiere",
                    "--token-secret",
                    "sekret",
                ]);
                let options = Options::parse(&matches);
                assert!(options.is_ok());
                if let Ok(options) = options {
                    assert_eq!(options.token_secret, "sekret");
                    // One week, matching the server-side default
                    assert_eq!(options.token_ttl_seconds, 604_800);
                    assert_eq!(options.code_ttl_seconds, 300);
                    assert_eq!(options.code_cooldown_seconds, 60);
                }
            },
        );
    }

    #[test]
    fn parse_rejects_blank_secret() {
        temp_env::with_vars([("PORTIERE_TOKEN_SECRET", Some(" "))], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "portiere",
                "--dsn",
                "postgres://localhost/portiere",
            ]);
            let result = Options::parse(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--token-secret"));
            }
        });
    }
}

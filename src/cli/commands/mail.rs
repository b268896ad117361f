use clap::{Arg, ArgMatches, Command};

pub const ARG_MAIL_RELAY_URL: &str = "mail-relay-url";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_MAIL_FROM_NAME: &str = "mail-from-name";

#[derive(Debug, Clone)]
pub struct Options {
    pub relay_url: Option<String>,
    pub from_address: String,
    pub from_name: String,
}

impl Options {
    /// Parse mail arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Filter empty strings which clap might pass through if env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Ok(Self {
            relay_url: get_non_empty(ARG_MAIL_RELAY_URL),
            from_address: get_non_empty(ARG_MAIL_FROM)
                .unwrap_or_else(|| "noreply@example.com".to_string()),
            from_name: get_non_empty(ARG_MAIL_FROM_NAME).unwrap_or_else(|| "Portiere".to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_RELAY_URL)
                .long(ARG_MAIL_RELAY_URL)
                .help("HTTP mail relay endpoint; when unset emails are logged instead")
                .env("PORTIERE_MAIL_RELAY_URL"),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address for outbound email")
                .env("PORTIERE_MAIL_FROM")
                .default_value("noreply@example.com"),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM_NAME)
                .long(ARG_MAIL_FROM_NAME)
                .help("Sender display name for outbound email")
                .env("PORTIERE_MAIL_FROM_NAME")
                .default_value("Portiere"),
        )
}

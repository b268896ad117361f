//! # Portiere
//!
//! `portiere` is a small user and role administration backend. It exposes a
//! versioned REST API for passwordless email login plus CRUD over profiles,
//! roles, role assignments, login audit records, and dotted-key settings.
//!
//! ## Login Model
//!
//! Authentication is passwordless: the client requests a one-time 6-digit
//! code for an email address, then exchanges the code for a JWT bearer token.
//!
//! - **Cooldown:** A second code for the same address is refused while the
//!   send cooldown (default 60s) is active.
//! - **Single use:** A code is removed the moment it verifies; a mismatched
//!   attempt leaves the stored code in place until it expires.
//! - **Lazy provisioning:** The first successful verification for an unknown
//!   address creates an active profile on the spot.
//!
//! ## Audit
//!
//! Every verification attempt appends a row to `login_logs`. Audit writes are
//! best effort: a failed insert is logged and never blocks the login.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}

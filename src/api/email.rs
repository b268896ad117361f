//! Outbound email delivery.
//!
//! Verification codes are delivered synchronously: the login handler needs to
//! know whether the message left the building before it can answer, so a send
//! failure surfaces as `502` instead of being queued for retry.
//!
//! Two transports exist. `Relay` posts a JSON payload to an HTTP mail relay
//! and is the production path. `Log` writes the message to the log and
//! always succeeds, which is what local development wants.

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from_address: &'a str,
    from_name: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

enum Transport {
    Log,
    Relay { client: Client, endpoint: Url },
    #[cfg(test)]
    Capture(std::sync::Mutex<Vec<EmailMessage>>),
}

pub struct Mailer {
    transport: Transport,
    from_address: String,
    from_name: String,
}

impl Mailer {
    /// Logging transport for local development; every send succeeds.
    #[must_use]
    pub fn log(from_address: String, from_name: String) -> Self {
        Self {
            transport: Transport::Log,
            from_address,
            from_name,
        }
    }

    /// HTTP relay transport.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn relay(endpoint: String, from_address: String, from_name: String) -> Result<Self> {
        let endpoint = Url::parse(&endpoint)
            .with_context(|| format!("Invalid mail relay URL: {endpoint}"))?;
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build mail relay client")?;
        Ok(Self {
            transport: Transport::Relay { client, endpoint },
            from_address,
            from_name,
        })
    }

    /// Capturing transport for tests; records messages instead of sending.
    #[cfg(test)]
    #[must_use]
    pub fn capture() -> Self {
        Self {
            transport: Transport::Capture(std::sync::Mutex::new(Vec::new())),
            from_address: "noreply@example.com".to_string(),
            from_name: "Portiere".to_string(),
        }
    }

    #[cfg(test)]
    pub fn sent(&self) -> Vec<EmailMessage> {
        match &self.transport {
            Transport::Capture(messages) => {
                messages.lock().map(|m| m.clone()).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    /// Deliver a message or return an error so the caller can answer 502.
    ///
    /// # Errors
    /// Returns an error if the relay is unreachable or answers non-2xx.
    pub async fn send(&self, message: &EmailMessage) -> Result<()> {
        match &self.transport {
            Transport::Log => {
                info!(
                    to_email = %message.to_email,
                    subject = %message.subject,
                    "email delivery stub"
                );
                Ok(())
            }
            Transport::Relay { client, endpoint } => {
                let payload = RelayPayload {
                    from_address: &self.from_address,
                    from_name: &self.from_name,
                    to: &message.to_email,
                    subject: &message.subject,
                    html: &message.html_body,
                };
                let response = client
                    .post(endpoint.clone())
                    .json(&payload)
                    .send()
                    .await
                    .context("mail relay request failed")?;
                let status = response.status();
                if !status.is_success() {
                    bail!("mail relay returned status {status}");
                }
                Ok(())
            }
            #[cfg(test)]
            Transport::Capture(messages) => {
                if let Ok(mut messages) = messages.lock() {
                    messages.push(message.clone());
                }
                Ok(())
            }
        }
    }
}

/// Login code email. TTL is shown in whole minutes to match what users expect.
#[must_use]
pub fn verification_code_message(to_email: &str, code: &str, ttl_seconds: u64) -> EmailMessage {
    let minutes = ttl_seconds.div_ceil(60);
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Your login code".to_string(),
        html_body: format!(
            "<p>Your login code is <strong>{code}</strong>.</p>\
             <p>It expires in {minutes} minutes. If you did not request it, ignore this email.</p>"
        ),
    }
}

/// Sent once, after the first successful login provisions a profile.
#[must_use]
pub fn welcome_message(to_email: &str, full_name: &str) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Welcome".to_string(),
        html_body: format!(
            "<p>Hi {full_name},</p>\
             <p>Your account is ready. You can sign in any time with a one-time email code.</p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_transport_always_succeeds() {
        let mailer = Mailer::log("noreply@example.com".to_string(), "Portiere".to_string());
        let message = verification_code_message("a@example.com", "123456", 300);
        assert!(mailer.send(&message).await.is_ok());
    }

    #[tokio::test]
    async fn capture_transport_records_messages() {
        let mailer = Mailer::capture();
        let message = verification_code_message("a@example.com", "123456", 300);
        assert!(mailer.send(&message).await.is_ok());
        assert_eq!(mailer.sent(), vec![message]);
    }

    #[test]
    fn relay_rejects_invalid_endpoint() {
        let result = Mailer::relay(
            "not a url".to_string(),
            "noreply@example.com".to_string(),
            "Portiere".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn verification_message_contains_code_and_minutes() {
        let message = verification_code_message("a@example.com", "654321", 300);
        assert!(message.html_body.contains("654321"));
        assert!(message.html_body.contains("5 minutes"));
        assert_eq!(message.to_email, "a@example.com");
    }

    #[test]
    fn verification_message_rounds_ttl_up() {
        let message = verification_code_message("a@example.com", "654321", 90);
        assert!(message.html_body.contains("2 minutes"));
    }

    #[test]
    fn welcome_message_addresses_user() {
        let message = welcome_message("bob@example.com", "bob");
        assert!(message.html_body.contains("Hi bob"));
        assert_eq!(message.subject, "Welcome");
    }
}

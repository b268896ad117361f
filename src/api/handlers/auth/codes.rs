//! Process-local store for verification codes and send cooldowns.
//!
//! Keys are normalized email addresses. Expired entries are purged lazily on
//! insert; consumption is a single match-and-delete under the lock, so two
//! concurrent attempts with the same code cannot both succeed.

use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct StoredCode {
    code: String,
    created_at: Instant,
}

/// Result of attempting to redeem a code.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ConsumeOutcome {
    /// Code matched and was removed.
    Consumed,
    /// A live code exists but the submitted one differs; the stored code stays.
    Mismatch,
    /// No live code for this address.
    Missing,
}

pub struct CodeStore {
    code_ttl: Duration,
    cooldown_ttl: Duration,
    codes: Mutex<HashMap<String, StoredCode>>,
    cooldowns: Mutex<HashMap<String, Instant>>,
}

impl CodeStore {
    #[must_use]
    pub fn new(code_ttl: Duration, cooldown_ttl: Duration) -> Self {
        Self {
            code_ttl,
            cooldown_ttl,
            codes: Mutex::new(HashMap::new()),
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    /// Generate and cache a fresh code for the address, or return `None`
    /// while the send cooldown is active. A fresh code replaces any earlier
    /// unexpired one and restarts its TTL.
    pub async fn try_issue(&self, email: &str) -> Option<String> {
        {
            let mut cooldowns = self.cooldowns.lock().await;
            cooldowns.retain(|_, started_at| started_at.elapsed() < self.cooldown_ttl);
            if cooldowns.contains_key(email) {
                return None;
            }
            cooldowns.insert(email.to_string(), Instant::now());
        }

        let code = generate_code();
        let mut codes = self.codes.lock().await;
        codes.retain(|_, entry| entry.created_at.elapsed() < self.code_ttl);
        codes.insert(
            email.to_string(),
            StoredCode {
                code: code.clone(),
                created_at: Instant::now(),
            },
        );
        Some(code)
    }

    /// Redeem a code. Only an exact match removes the entry.
    pub(crate) async fn consume(&self, email: &str, code: &str) -> ConsumeOutcome {
        let mut codes = self.codes.lock().await;
        let Some(entry) = codes.get(email) else {
            return ConsumeOutcome::Missing;
        };
        if entry.created_at.elapsed() >= self.code_ttl {
            codes.remove(email);
            return ConsumeOutcome::Missing;
        }
        if entry.code == code {
            codes.remove(email);
            ConsumeOutcome::Consumed
        } else {
            ConsumeOutcome::Mismatch
        }
    }
}

/// Uniformly random 6-digit code. The range is fixed by the client contract.
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CodeStore {
        CodeStore::new(Duration::from_secs(300), Duration::from_secs(60))
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.chars().next(), Some('0'));
        }
    }

    #[tokio::test]
    async fn cooldown_blocks_second_issue() {
        let store = store();
        assert!(store.try_issue("a@example.com").await.is_some());
        assert!(store.try_issue("a@example.com").await.is_none());
        // Other addresses are unaffected
        assert!(store.try_issue("b@example.com").await.is_some());
    }

    #[tokio::test]
    async fn code_is_consumed_exactly_once() {
        let store = store();
        let code = store.try_issue("a@example.com").await;
        assert!(code.is_some());
        if let Some(code) = code {
            assert_eq!(
                store.consume("a@example.com", &code).await,
                ConsumeOutcome::Consumed
            );
            assert_eq!(
                store.consume("a@example.com", &code).await,
                ConsumeOutcome::Missing
            );
        }
    }

    #[tokio::test]
    async fn mismatch_leaves_code_in_place() {
        let store = store();
        let code = store.try_issue("a@example.com").await;
        assert!(code.is_some());
        if let Some(code) = code {
            let wrong = if code == "111111" { "222222" } else { "111111" };
            assert_eq!(
                store.consume("a@example.com", wrong).await,
                ConsumeOutcome::Mismatch
            );
            // Still redeemable with the right code
            assert_eq!(
                store.consume("a@example.com", &code).await,
                ConsumeOutcome::Consumed
            );
        }
    }

    #[tokio::test]
    async fn expired_code_is_missing() {
        let store = CodeStore::new(Duration::ZERO, Duration::from_secs(60));
        let code = store.try_issue("a@example.com").await;
        assert!(code.is_some());
        if let Some(code) = code {
            assert_eq!(
                store.consume("a@example.com", &code).await,
                ConsumeOutcome::Missing
            );
        }
    }

    #[tokio::test]
    async fn expired_cooldown_allows_reissue() {
        let store = CodeStore::new(Duration::from_secs(300), Duration::ZERO);
        assert!(store.try_issue("a@example.com").await.is_some());
        assert!(store.try_issue("a@example.com").await.is_some());
    }

    #[tokio::test]
    async fn unknown_address_is_missing() {
        let store = store();
        assert_eq!(
            store.consume("nobody@example.com", "123456").await,
            ConsumeOutcome::Missing
        );
    }
}

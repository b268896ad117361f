//! Bearer token minting and verification (HS256 JWT).

use anyhow::{Context, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::state::AuthConfig;

/// Token claims. `sub` is the profile row id; `userId` is the immutable
/// subject id that role assignments and audit records reference.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    #[serde(rename = "userId")]
    pub(crate) user_id: String,
    pub(crate) email: String,
    pub(crate) sub: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

pub(crate) fn mint(
    config: &AuthConfig,
    user_id: Uuid,
    email: &str,
    profile_id: Uuid,
) -> Result<String> {
    let now = unix_now()?;
    let claims = Claims {
        user_id: user_id.to_string(),
        email: email.to_string(),
        sub: profile_id.to_string(),
        iat: now,
        exp: now + config.token_ttl_seconds(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.token_secret().expose_secret().as_bytes()),
    )
    .context("failed to sign bearer token")
}

pub(crate) fn verify(config: &AuthConfig, token: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.token_secret().expose_secret().as_bytes()),
        &Validation::default(),
    )
    .context("invalid bearer token")?;
    Ok(data.claims)
}

fn unix_now() -> Result<i64> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?
        .as_secs();
    i64::try_from(seconds).context("timestamp overflow")
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("test-secret"),
        )
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let config = config();
        let user_id = Uuid::new_v4();
        let profile_id = Uuid::new_v4();

        let token = mint(&config, user_id, "a@example.com", profile_id);
        assert!(token.is_ok());
        if let Ok(token) = token {
            let claims = verify(&config, &token);
            assert!(claims.is_ok());
            if let Ok(claims) = claims {
                assert_eq!(claims.user_id, user_id.to_string());
                assert_eq!(claims.email, "a@example.com");
                assert_eq!(claims.sub, profile_id.to_string());
                assert!(claims.exp > claims.iat);
                assert_eq!(claims.exp - claims.iat, config.token_ttl_seconds());
            }
        }
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let config = config();
        let other = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("other-secret"),
        );
        let token = mint(&config, Uuid::new_v4(), "a@example.com", Uuid::new_v4());
        assert!(token.is_ok());
        if let Ok(token) = token {
            assert!(verify(&other, &token).is_err());
        }
    }

    #[test]
    fn verify_rejects_expired_token() {
        // Negative TTL puts exp far enough in the past to beat default leeway.
        let config = config().with_token_ttl_seconds(-120);
        let token = mint(&config, Uuid::new_v4(), "a@example.com", Uuid::new_v4());
        assert!(token.is_ok());
        if let Ok(token) = token {
            assert!(verify(&config, &token).is_err());
        }
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(verify(&config(), "not-a-token").is_err());
    }

    #[test]
    fn claims_serialize_user_id_as_camel_case() {
        let claims = Claims {
            user_id: "u".to_string(),
            email: "a@example.com".to_string(),
            sub: "p".to_string(),
            iat: 0,
            exp: 1,
        };
        let json = serde_json::to_value(&claims);
        assert!(json.is_ok());
        if let Ok(json) = json {
            assert!(json.get("userId").is_some());
            assert!(json.get("user_id").is_none());
        }
    }
}

//! Verification-code issuance.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::state::AuthState;
use super::types::{MessageResponse, SendCodeRequest};
use super::utils::{normalize_email, valid_email};
use crate::api::email::verification_code_message;

#[utoipa::path(
    post,
    path = "/v1/auth/send-code",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Verification code sent.", body = MessageResponse),
        (status = 400, description = "Missing or invalid email."),
        (status = 429, description = "Send cooldown is active for this address."),
        (status = 502, description = "Email delivery failed."),
    ),
    tag = "auth"
)]
pub async fn send_code(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<SendCodeRequest>>,
) -> impl IntoResponse {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing email.").into_response();
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address.").into_response();
    }

    // Cooldown check and code write happen atomically in the store.
    let Some(code) = state.codes().try_issue(&email).await else {
        debug!(email = %email, "send-code refused by cooldown");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MessageResponse {
                message: "Please wait before requesting another code.".to_string(),
            }),
        )
            .into_response();
    };

    // The cached code stays valid even when delivery fails; a retry after the
    // cooldown will mint a fresh one.
    let message = verification_code_message(&email, &code, state.config().code_ttl_seconds());
    if let Err(err) = state.mailer().send(&message).await {
        error!("failed to deliver verification code: {err}");
        return (
            StatusCode::BAD_GATEWAY,
            "Failed to deliver verification code.",
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Verification code sent.".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::Mailer;
    use crate::api::handlers::auth::{AuthConfig, AuthState, CodeStore};
    use secrecy::SecretString;
    use std::time::Duration;

    fn state_with_mailer(mailer: Mailer) -> Arc<AuthState> {
        let config = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("test-secret"),
        );
        let codes = CodeStore::new(Duration::from_secs(300), Duration::from_secs(60));
        Arc::new(AuthState::new(config, codes, Arc::new(mailer)))
    }

    #[tokio::test]
    async fn missing_payload_is_bad_request() {
        let state = state_with_mailer(Mailer::capture());
        let response = send_code(Extension(state), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_email_is_bad_request() {
        let state = state_with_mailer(Mailer::capture());
        let response = send_code(
            Extension(state.clone()),
            Some(Json(SendCodeRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // No side effects before validation passes
        assert!(state.mailer().sent().is_empty());
    }

    #[tokio::test]
    async fn sends_exactly_one_email_then_cooldown() {
        let state = state_with_mailer(Mailer::capture());
        let request = || {
            Some(Json(SendCodeRequest {
                email: "Alice@Example.com".to_string(),
            }))
        };

        let first = send_code(Extension(state.clone()), request())
            .await
            .into_response();
        assert_eq!(first.status(), StatusCode::OK);

        let second = send_code(Extension(state.clone()), request())
            .await
            .into_response();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let sent = state.mailer().sent();
        assert_eq!(sent.len(), 1);
        // Address was normalized before use
        assert_eq!(sent[0].to_email, "alice@example.com");
    }
}

use axum::response::IntoResponse;

// axum handler for the root banner
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, response::IntoResponse};

    #[tokio::test]
    async fn root_returns_name_and_version() {
        let response = root().await.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await;
        assert!(body.is_ok());
        if let Ok(body) = body {
            let text = String::from_utf8_lossy(&body).to_string();
            assert!(text.starts_with(env!("CARGO_PKG_NAME")));
            assert!(text.contains(env!("CARGO_PKG_VERSION")));
        }
    }
}

//! API handlers for Portiere.
//!
//! Routes are grouped by resource: auth (login and sessions), users, roles,
//! and settings, plus the undocumented `/` and `/health` endpoints. Shared
//! error mapping and pagination plumbing live here.

pub mod auth;
pub mod health;
pub mod roles;
pub mod root;
pub mod settings;
pub mod users;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};

/// Error surface shared by the CRUD handlers. Database details never reach
/// the client; they go to the log.
#[derive(Debug)]
pub(crate) enum ServiceError {
    BadRequest(&'static str),
    NotFound,
    Conflict(String),
    Database(sqlx::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            Self::Database(err) => {
                error!("Failed to handle request: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Common list-endpoint query string.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size, clamped to 1..=100.
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub(crate) fn new(page: u32, limit: u32, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + i64::from(limit) - 1) / i64::from(limit)
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// Clamp raw paging input: page starts at 1, limit stays within 1..=100.
pub(crate) fn page_and_limit(query: &ListQuery) -> (u32, u32) {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    (page, limit)
}

pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_limit_defaults() {
        let (page, limit) = page_and_limit(&ListQuery::default());
        assert_eq!(page, 1);
        assert_eq!(limit, 20);
    }

    #[test]
    fn page_and_limit_clamps() {
        let query = ListQuery {
            page: Some(0),
            limit: Some(1000),
            ..ListQuery::default()
        };
        let (page, limit) = page_and_limit(&query);
        assert_eq!(page, 1);
        assert_eq!(limit, 100);

        let query = ListQuery {
            limit: Some(0),
            ..ListQuery::default()
        };
        assert_eq!(page_and_limit(&query).1, 1);
    }

    #[test]
    fn pagination_rounds_pages_up() {
        let pagination = Pagination::new(1, 20, 41);
        assert_eq!(pagination.total_pages, 3);

        let pagination = Pagination::new(1, 20, 40);
        assert_eq!(pagination.total_pages, 2);

        let pagination = Pagination::new(1, 20, 0);
        assert_eq!(pagination.total_pages, 0);
    }

    #[test]
    fn normalize_optional_trims_and_drops_empty() {
        assert_eq!(normalize_optional(Some("  a  ".to_string())), Some("a".to_string()));
        assert_eq!(normalize_optional(Some("   ".to_string())), None);
        assert_eq!(normalize_optional(None), None);
    }
}

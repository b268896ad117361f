//! User management endpoints.
//!
//! All routes require a bearer token. List endpoints share the common
//! page/limit/search/sort query string; sorting columns are allow-listed
//! before they reach the SQL text.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::principal::require_auth;
use super::auth::utils::{is_unique_violation, normalize_email, valid_email};
use super::auth::AuthState;
use super::{ListQuery, Pagination, ServiceError, normalize_optional, page_and_limit};

const USER_STATUSES: [&str; 3] = ["active", "inactive", "suspended"];

const USER_COLUMNS: &str = r#"
    id::text AS id,
    user_id,
    email,
    full_name,
    avatar_url,
    phone,
    status,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetail {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub roles: Vec<RoleSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserDetail>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub suspended: i64,
    pub new_last_7_days: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginLogEntry {
    pub id: String,
    pub identifier: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub login_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginLogsResponse {
    pub logs: Vec<LoginLogEntry>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "/v1/users",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated users with their roles.", body = UserListResponse),
        (status = 401, description = "Missing or invalid bearer token."),
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    match fetch_users(&pool, &query).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/stats",
    responses(
        (status = 200, description = "User totals by status.", body = UserStats),
        (status = 401, description = "Missing or invalid bearer token."),
    ),
    tag = "users"
)]
pub async fn user_stats(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    match fetch_user_stats(&pool).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 200, description = "User detail with roles.", body = UserDetail),
        (status = 400, description = "Invalid user id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "User not found."),
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(profile_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match fetch_user_detail(&pool, profile_id).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created.", body = UserDetail),
        (status = 400, description = "Invalid input."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 409, description = "Email or phone already in use."),
    ),
    tag = "users"
)]
pub async fn create_user(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<CreateUserRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body.").into_response();
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address.").into_response();
    }
    let Some(full_name) = normalize_optional(Some(payload.full_name)) else {
        return (StatusCode::BAD_REQUEST, "Full name is required.").into_response();
    };
    let status = payload.status.unwrap_or_else(|| "active".to_string());
    if !USER_STATUSES.contains(&status.as_str()) {
        return (StatusCode::BAD_REQUEST, "Unknown status.").into_response();
    }

    let result = insert_user(
        &pool,
        &email,
        &full_name,
        normalize_optional(payload.phone).as_deref(),
        normalize_optional(payload.avatar_url).as_deref(),
        &status,
    )
    .await;

    match result {
        Ok(detail) => (StatusCode::CREATED, Json(detail)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    params(("id" = String, Path, description = "Profile id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated.", body = UserDetail),
        (status = 400, description = "Invalid input."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "User not found."),
        (status = 409, description = "Phone already in use."),
    ),
    tag = "users"
)]
pub async fn update_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<UpdateUserRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(profile_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body.").into_response();
    };

    let full_name = normalize_optional(payload.full_name);
    let phone = normalize_optional(payload.phone);
    let avatar_url = normalize_optional(payload.avatar_url);

    if full_name.is_none() && phone.is_none() && avatar_url.is_none() {
        return (StatusCode::BAD_REQUEST, "No updates provided.").into_response();
    }

    match update_user_profile(&pool, profile_id, full_name, phone, avatar_url).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/status",
    params(("id" = String, Path, description = "Profile id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated.", body = UserDetail),
        (status = 400, description = "Invalid status."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "User not found."),
    ),
    tag = "users"
)]
pub async fn update_user_status(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<UpdateStatusRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(profile_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body.").into_response();
    };

    if !USER_STATUSES.contains(&payload.status.as_str()) {
        return (StatusCode::BAD_REQUEST, "Unknown status.").into_response();
    }

    match set_user_status(&pool, profile_id, &payload.status).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 204, description = "User deleted."),
        (status = 400, description = "Invalid user id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "User not found."),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(profile_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let query = "DELETE FROM profiles WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(profile_id)
        .execute(&pool)
        .instrument(span)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => StatusCode::NO_CONTENT.into_response(),
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/roles",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Roles assigned to the user.", body = [RoleSummary]),
        (status = 400, description = "Invalid user id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "User not found."),
    ),
    tag = "users"
)]
pub async fn list_user_roles(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(profile_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match user_roles_by_profile(&pool, profile_id).await {
        Ok(Some(roles)) => (StatusCode::OK, Json(roles)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/roles/{role_id}",
    params(
        ("id" = String, Path, description = "Profile id"),
        ("role_id" = String, Path, description = "Role id")
    ),
    responses(
        (status = 201, description = "Role assigned."),
        (status = 400, description = "Invalid id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "User or role not found."),
        (status = 409, description = "Role already assigned."),
    ),
    tag = "users"
)]
pub async fn assign_role(
    Path((id, role_id)): Path<(String, String)>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let (Ok(profile_id), Ok(role_id)) = (Uuid::parse_str(id.trim()), Uuid::parse_str(role_id.trim()))
    else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match insert_role_assignment(&pool, profile_id, role_id).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}/roles/{role_id}",
    params(
        ("id" = String, Path, description = "Profile id"),
        ("role_id" = String, Path, description = "Role id")
    ),
    responses(
        (status = 204, description = "Role assignment removed."),
        (status = 400, description = "Invalid id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "Assignment not found."),
    ),
    tag = "users"
)]
pub async fn remove_role(
    Path((id, role_id)): Path<(String, String)>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let (Ok(profile_id), Ok(role_id)) = (Uuid::parse_str(id.trim()), Uuid::parse_str(role_id.trim()))
    else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let query = r"
        DELETE FROM user_roles
        USING profiles
        WHERE profiles.id = $1
          AND user_roles.user_id = profiles.user_id
          AND user_roles.role_id = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(profile_id)
        .bind(role_id)
        .execute(&pool)
        .instrument(span)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => StatusCode::NO_CONTENT.into_response(),
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/login-logs",
    params(("id" = String, Path, description = "Profile id"), ListQuery),
    responses(
        (status = 200, description = "Login audit records, newest first.", body = LoginLogsResponse),
        (status = 400, description = "Invalid user id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "User not found."),
    ),
    tag = "users"
)]
pub async fn list_user_login_logs(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(profile_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match fetch_login_logs(&pool, profile_id, &query).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

/// Allow-listed ORDER BY fragments; anything unknown falls back to newest
/// first.
fn sort_clause(query: &ListQuery) -> (&'static str, &'static str) {
    let column = match query.sort_by.as_deref() {
        Some("updated_at") => "updated_at",
        Some("full_name") => "full_name",
        _ => "created_at",
    };
    let order = match query.sort_order.as_deref() {
        Some("asc" | "ASC") => "ASC",
        _ => "DESC",
    };
    (column, order)
}

async fn fetch_users(pool: &PgPool, query: &ListQuery) -> Result<UserListResponse, ServiceError> {
    let (page, limit) = page_and_limit(query);
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let status = query.status.as_deref().filter(|s| USER_STATUSES.contains(s));
    let (column, order) = sort_clause(query);

    let count_query = r"
        SELECT COUNT(*) AS total
        FROM profiles
        WHERE ($1::text IS NULL OR full_name ILIKE '%' || $1 || '%' OR phone ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR status = $2)
    ";
    let total: i64 = sqlx::query(count_query)
        .bind(search)
        .bind(status)
        .fetch_one(pool)
        .await
        .map_err(ServiceError::Database)?
        .get("total");

    let list_query = format!(
        "SELECT {USER_COLUMNS}
         FROM profiles
         WHERE ($1::text IS NULL OR full_name ILIKE '%' || $1 || '%' OR phone ILIKE '%' || $1 || '%')
           AND ($2::text IS NULL OR status = $2)
         ORDER BY {column} {order}
         LIMIT $3 OFFSET $4"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = list_query.as_str()
    );
    let rows = sqlx::query(&list_query)
        .bind(search)
        .bind(status)
        .bind(i64::from(limit))
        .bind((i64::from(page) - 1) * i64::from(limit))
        .fetch_all(pool)
        .instrument(span)
        .await
        .map_err(ServiceError::Database)?;

    let user_ids: Vec<Uuid> = rows.iter().map(|row| row.get("user_id")).collect();
    let mut roles = roles_for_users(pool, &user_ids)
        .await
        .map_err(ServiceError::Database)?;

    let users = rows
        .into_iter()
        .map(|row| {
            let user_id: Uuid = row.get("user_id");
            UserDetail {
                id: row.get("id"),
                user_id: user_id.to_string(),
                email: row.get("email"),
                full_name: row.get("full_name"),
                avatar_url: row.get("avatar_url"),
                phone: row.get("phone"),
                status: row.get("status"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                roles: roles.remove(&user_id).unwrap_or_default(),
            }
        })
        .collect();

    Ok(UserListResponse {
        users,
        pagination: Pagination::new(page, limit, total),
    })
}

async fn roles_for_users(
    pool: &PgPool,
    user_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<RoleSummary>>, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let query = r"
        SELECT user_roles.user_id, roles.id::text AS id, roles.name, roles.description
        FROM user_roles
        JOIN roles ON roles.id = user_roles.role_id
        WHERE user_roles.user_id = ANY($1)
        ORDER BY roles.name
    ";
    let rows = sqlx::query(query).bind(user_ids).fetch_all(pool).await?;

    let mut map: HashMap<Uuid, Vec<RoleSummary>> = HashMap::new();
    for row in rows {
        let user_id: Uuid = row.get("user_id");
        map.entry(user_id).or_default().push(RoleSummary {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
        });
    }
    Ok(map)
}

async fn fetch_user_detail(
    pool: &PgPool,
    profile_id: Uuid,
) -> Result<Option<UserDetail>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM profiles WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(profile_id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let user_id: Uuid = row.get("user_id");
    let mut roles = roles_for_users(pool, &[user_id]).await?;

    Ok(Some(UserDetail {
        id: row.get("id"),
        user_id: user_id.to_string(),
        email: row.get("email"),
        full_name: row.get("full_name"),
        avatar_url: row.get("avatar_url"),
        phone: row.get("phone"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        roles: roles.remove(&user_id).unwrap_or_default(),
    }))
}

async fn fetch_user_stats(pool: &PgPool) -> Result<UserStats, sqlx::Error> {
    let query = r"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status = 'active') AS active,
            COUNT(*) FILTER (WHERE status = 'inactive') AS inactive,
            COUNT(*) FILTER (WHERE status = 'suspended') AS suspended,
            COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '7 days') AS new_last_7_days
        FROM profiles
    ";
    let row = sqlx::query(query).fetch_one(pool).await?;

    Ok(UserStats {
        total: row.get("total"),
        active: row.get("active"),
        inactive: row.get("inactive"),
        suspended: row.get("suspended"),
        new_last_7_days: row.get("new_last_7_days"),
    })
}

async fn insert_user(
    pool: &PgPool,
    email: &str,
    full_name: &str,
    phone: Option<&str>,
    avatar_url: Option<&str>,
    status: &str,
) -> Result<UserDetail, ServiceError> {
    let query = format!(
        "INSERT INTO profiles (user_id, email, full_name, phone, avatar_url, status)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {USER_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(full_name)
        .bind(phone)
        .bind(avatar_url)
        .bind(status)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => {
            let user_id: Uuid = row.get("user_id");
            Ok(UserDetail {
                id: row.get("id"),
                user_id: user_id.to_string(),
                email: row.get("email"),
                full_name: row.get("full_name"),
                avatar_url: row.get("avatar_url"),
                phone: row.get("phone"),
                status: row.get("status"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                roles: Vec::new(),
            })
        }
        Err(err) if is_unique_violation(&err) => Err(ServiceError::Conflict(
            "Email or phone already in use.".to_string(),
        )),
        Err(err) => Err(ServiceError::Database(err)),
    }
}

async fn update_user_profile(
    pool: &PgPool,
    profile_id: Uuid,
    full_name: Option<String>,
    phone: Option<String>,
    avatar_url: Option<String>,
) -> Result<Option<UserDetail>, ServiceError> {
    let query = format!(
        "UPDATE profiles
         SET
             full_name = COALESCE($1, full_name),
             phone = COALESCE($2, phone),
             avatar_url = COALESCE($3, avatar_url)
         WHERE id = $4
         RETURNING {USER_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(full_name)
        .bind(phone)
        .bind(avatar_url)
        .bind(profile_id)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    let row = match row {
        Ok(row) => row,
        Err(err) if is_unique_violation(&err) => {
            return Err(ServiceError::Conflict("Phone already in use.".to_string()));
        }
        Err(err) => return Err(ServiceError::Database(err)),
    };

    let Some(row) = row else {
        return Ok(None);
    };

    let user_id: Uuid = row.get("user_id");
    let mut roles = roles_for_users(pool, &[user_id])
        .await
        .map_err(ServiceError::Database)?;

    Ok(Some(UserDetail {
        id: row.get("id"),
        user_id: user_id.to_string(),
        email: row.get("email"),
        full_name: row.get("full_name"),
        avatar_url: row.get("avatar_url"),
        phone: row.get("phone"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        roles: roles.remove(&user_id).unwrap_or_default(),
    }))
}

async fn set_user_status(
    pool: &PgPool,
    profile_id: Uuid,
    status: &str,
) -> Result<Option<UserDetail>, sqlx::Error> {
    let query = format!(
        "UPDATE profiles SET status = $1 WHERE id = $2 RETURNING {USER_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(status)
        .bind(profile_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let user_id: Uuid = row.get("user_id");
    let mut roles = roles_for_users(pool, &[user_id]).await?;

    Ok(Some(UserDetail {
        id: row.get("id"),
        user_id: user_id.to_string(),
        email: row.get("email"),
        full_name: row.get("full_name"),
        avatar_url: row.get("avatar_url"),
        phone: row.get("phone"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        roles: roles.remove(&user_id).unwrap_or_default(),
    }))
}

async fn user_roles_by_profile(
    pool: &PgPool,
    profile_id: Uuid,
) -> Result<Option<Vec<RoleSummary>>, sqlx::Error> {
    let exists = sqlx::query("SELECT user_id FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = exists else {
        return Ok(None);
    };

    let user_id: Uuid = row.get("user_id");
    let mut roles = roles_for_users(pool, &[user_id]).await?;
    Ok(Some(roles.remove(&user_id).unwrap_or_default()))
}

async fn insert_role_assignment(
    pool: &PgPool,
    profile_id: Uuid,
    role_id: Uuid,
) -> Result<(), ServiceError> {
    let profile = sqlx::query("SELECT user_id FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await
        .map_err(ServiceError::Database)?;
    let Some(profile) = profile else {
        return Err(ServiceError::NotFound);
    };
    let user_id: Uuid = profile.get("user_id");

    let role = sqlx::query("SELECT 1 FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_optional(pool)
        .await
        .map_err(ServiceError::Database)?;
    if role.is_none() {
        return Err(ServiceError::NotFound);
    }

    let query = "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => Err(ServiceError::Conflict(
            "Role already assigned.".to_string(),
        )),
        Err(err) => Err(ServiceError::Database(err)),
    }
}

async fn fetch_login_logs(
    pool: &PgPool,
    profile_id: Uuid,
    query: &ListQuery,
) -> Result<Option<LoginLogsResponse>, sqlx::Error> {
    let profile = sqlx::query("SELECT user_id, email FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await?;
    let Some(profile) = profile else {
        return Ok(None);
    };

    let user_id: Uuid = profile.get("user_id");
    let email: String = profile.get("email");
    let identifiers = [user_id.to_string(), email];
    let (page, limit) = page_and_limit(query);

    let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM login_logs WHERE identifier = ANY($1)")
        .bind(&identifiers[..])
        .fetch_one(pool)
        .await?
        .get("total");

    // Success rows are keyed by subject id, pre-provision failures by the
    // submitted email; both belong to this user's history.
    let logs_query = r#"
        SELECT
            id::text AS id,
            identifier,
            ip_address,
            user_agent,
            status,
            failure_reason,
            to_char(login_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS login_at
        FROM login_logs
        WHERE identifier = ANY($1)
        ORDER BY login_at DESC
        LIMIT $2 OFFSET $3
    "#;
    let rows = sqlx::query(logs_query)
        .bind(&identifiers[..])
        .bind(i64::from(limit))
        .bind((i64::from(page) - 1) * i64::from(limit))
        .fetch_all(pool)
        .await?;

    let logs = rows
        .into_iter()
        .map(|row| LoginLogEntry {
            id: row.get("id"),
            identifier: row.get("identifier"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            status: row.get("status"),
            failure_reason: row.get("failure_reason"),
            login_at: row.get("login_at"),
        })
        .collect();

    Ok(Some(LoginLogsResponse {
        logs,
        pagination: Pagination::new(page, limit, total),
    }))
}

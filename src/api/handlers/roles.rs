//! Role catalog endpoints.
//!
//! Role permissions are a JSONB object mapping a resource to its allowed
//! actions. The column is read and written as text so the JSON stays opaque
//! to the database layer.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::AuthState;
use super::auth::principal::require_auth;
use super::auth::utils::is_unique_violation;
use super::{ListQuery, Pagination, ServiceError, normalize_optional, page_and_limit};

const ROLE_COLUMNS: &str = r#"
    id::text AS id,
    name,
    description,
    permissions::text AS permissions,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at,
    (SELECT COUNT(*) FROM user_roles WHERE user_roles.role_id = roles.id) AS user_count
"#;

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleDetail {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
    pub user_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleListResponse {
    pub roles: Vec<RoleDetail>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleUser {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub status: String,
    pub assigned_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleUsersResponse {
    pub users: Vec<RoleUser>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "/v1/roles",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated roles with assignment counts.", body = RoleListResponse),
        (status = 401, description = "Missing or invalid bearer token."),
    ),
    tag = "roles"
)]
pub async fn list_roles(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    match fetch_roles(&pool, &query).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created.", body = RoleDetail),
        (status = 400, description = "Invalid input."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 409, description = "Role name already exists."),
    ),
    tag = "roles"
)]
pub async fn create_role(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<CreateRoleRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body.").into_response();
    };

    let Some(name) = normalize_optional(Some(payload.name)) else {
        return (StatusCode::BAD_REQUEST, "Role name is required.").into_response();
    };
    let permissions = payload.permissions.unwrap_or_else(|| json!({}));
    if !permissions.is_object() {
        return (StatusCode::BAD_REQUEST, "Permissions must be an object.").into_response();
    }

    match insert_role(
        &pool,
        &name,
        normalize_optional(payload.description).as_deref(),
        &permissions,
    )
    .await
    {
        Ok(detail) => (StatusCode::CREATED, Json(detail)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/roles/permissions/available",
    responses(
        (status = 200, description = "Catalog of permissions a role may grant."),
        (status = 401, description = "Missing or invalid bearer token."),
    ),
    tag = "roles"
)]
pub async fn available_permissions(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    (StatusCode::OK, Json(permissions_catalog())).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role detail.", body = RoleDetail),
        (status = 400, description = "Invalid role id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "Role not found."),
    ),
    tag = "roles"
)]
pub async fn get_role(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(role_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match fetch_role(&pool, role_id).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/v1/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated.", body = RoleDetail),
        (status = 400, description = "Invalid input."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "Role not found."),
        (status = 409, description = "Role name already exists."),
    ),
    tag = "roles"
)]
pub async fn update_role(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<UpdateRoleRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(role_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body.").into_response();
    };

    let name = normalize_optional(payload.name);
    let description = normalize_optional(payload.description);
    let permissions = payload.permissions;

    if name.is_none() && description.is_none() && permissions.is_none() {
        return (StatusCode::BAD_REQUEST, "No updates provided.").into_response();
    }
    if let Some(permissions) = &permissions {
        if !permissions.is_object() {
            return (StatusCode::BAD_REQUEST, "Permissions must be an object.").into_response();
        }
    }

    match update_role_record(&pool, role_id, name, description, permissions).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted."),
        (status = 400, description = "Invalid role id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "Role not found."),
        (status = 409, description = "Role still assigned to users."),
    ),
    tag = "roles"
)]
pub async fn delete_role(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(role_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match delete_role_record(&pool, role_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/roles/{id}/users",
    params(("id" = String, Path, description = "Role id"), ListQuery),
    responses(
        (status = 200, description = "Users holding the role, newest assignment first.", body = RoleUsersResponse),
        (status = 400, description = "Invalid role id."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "Role not found."),
    ),
    tag = "roles"
)]
pub async fn list_role_users(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Ok(role_id) = Uuid::parse_str(id.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match fetch_role_users(&pool, role_id, &query).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

/// Actions a role may grant, keyed by resource. Kept static; the UI builds
/// its permission matrix from this.
fn permissions_catalog() -> serde_json::Value {
    json!({
        "users": ["read", "create", "update", "delete", "assign_roles"],
        "roles": ["read", "create", "update", "delete"],
        "settings": ["read", "update"],
        "logs": ["read"]
    })
}

fn row_to_role(row: &sqlx::postgres::PgRow) -> Result<RoleDetail, ServiceError> {
    let permissions: String = row.get("permissions");
    let permissions = serde_json::from_str(&permissions)
        .map_err(|_| ServiceError::BadRequest("Stored permissions are not valid JSON."))?;

    Ok(RoleDetail {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        permissions,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        user_count: row.get("user_count"),
    })
}

// Search covers both the role name and its description.
const ROLE_SEARCH_FILTER: &str =
    "($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR description ILIKE '%' || $1 || '%')";

async fn fetch_roles(pool: &PgPool, query: &ListQuery) -> Result<RoleListResponse, sqlx::Error> {
    let (page, limit) = page_and_limit(query);
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let count_query = format!("SELECT COUNT(*) AS total FROM roles WHERE {ROLE_SEARCH_FILTER}");
    let total: i64 = sqlx::query(&count_query)
        .bind(search)
        .fetch_one(pool)
        .await?
        .get("total");

    let list_query = format!(
        "SELECT {ROLE_COLUMNS}
         FROM roles
         WHERE {ROLE_SEARCH_FILTER}
         ORDER BY name
         LIMIT $2 OFFSET $3"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = list_query.as_str()
    );
    let rows = sqlx::query(&list_query)
        .bind(search)
        .bind(i64::from(limit))
        .bind((i64::from(page) - 1) * i64::from(limit))
        .fetch_all(pool)
        .instrument(span)
        .await?;

    let mut roles = Vec::with_capacity(rows.len());
    for row in &rows {
        match row_to_role(row) {
            Ok(role) => roles.push(role),
            Err(_) => continue,
        }
    }

    Ok(RoleListResponse {
        roles,
        pagination: Pagination::new(page, limit, total),
    })
}

async fn fetch_role(pool: &PgPool, role_id: Uuid) -> Result<Option<RoleDetail>, ServiceError> {
    let query = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(role_id)
        .fetch_optional(pool)
        .await
        .map_err(ServiceError::Database)?;

    match row {
        Some(row) => Ok(Some(row_to_role(&row)?)),
        None => Ok(None),
    }
}

async fn insert_role(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    permissions: &serde_json::Value,
) -> Result<RoleDetail, ServiceError> {
    let query = format!(
        "INSERT INTO roles (name, description, permissions)
         VALUES ($1, $2, $3::jsonb)
         RETURNING {ROLE_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(description)
        .bind(permissions.to_string())
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => row_to_role(&row),
        Err(err) if is_unique_violation(&err) => Err(ServiceError::Conflict(
            "Role name already exists.".to_string(),
        )),
        Err(err) => Err(ServiceError::Database(err)),
    }
}

async fn update_role_record(
    pool: &PgPool,
    role_id: Uuid,
    name: Option<String>,
    description: Option<String>,
    permissions: Option<serde_json::Value>,
) -> Result<Option<RoleDetail>, ServiceError> {
    let query = format!(
        "UPDATE roles
         SET
             name = COALESCE($1, name),
             description = COALESCE($2, description),
             permissions = COALESCE($3::jsonb, permissions)
         WHERE id = $4
         RETURNING {ROLE_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(description)
        .bind(permissions.map(|value| value.to_string()))
        .bind(role_id)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => Ok(Some(row_to_role(&row)?)),
        Ok(None) => Ok(None),
        Err(err) if is_unique_violation(&err) => Err(ServiceError::Conflict(
            "Role name already exists.".to_string(),
        )),
        Err(err) => Err(ServiceError::Database(err)),
    }
}

/// Refuse to delete a role that is still assigned; the caller must remove
/// the assignments first.
async fn delete_role_record(pool: &PgPool, role_id: Uuid) -> Result<(), ServiceError> {
    let assigned = sqlx::query(
        "SELECT COUNT(*) AS assigned FROM user_roles WHERE role_id = $1",
    )
    .bind(role_id)
    .fetch_one(pool)
    .await
    .map_err(ServiceError::Database)?;
    let assigned: i64 = assigned.get("assigned");
    if assigned > 0 {
        return Err(ServiceError::Conflict(format!(
            "Role is assigned to {assigned} users."
        )));
    }

    let query = "DELETE FROM roles WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(role_id)
        .execute(pool)
        .instrument(span)
        .await
        .map_err(ServiceError::Database)?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound);
    }
    Ok(())
}

async fn fetch_role_users(
    pool: &PgPool,
    role_id: Uuid,
    query: &ListQuery,
) -> Result<Option<RoleUsersResponse>, sqlx::Error> {
    let role = sqlx::query("SELECT 1 FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_optional(pool)
        .await?;
    if role.is_none() {
        return Ok(None);
    }

    let (page, limit) = page_and_limit(query);

    let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM user_roles WHERE role_id = $1")
        .bind(role_id)
        .fetch_one(pool)
        .await?
        .get("total");

    let list_query = r#"
        SELECT
            profiles.id::text AS id,
            profiles.user_id,
            profiles.email,
            profiles.full_name,
            profiles.status,
            to_char(user_roles.assigned_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS assigned_at
        FROM user_roles
        JOIN profiles ON profiles.user_id = user_roles.user_id
        WHERE user_roles.role_id = $1
        ORDER BY user_roles.assigned_at DESC
        LIMIT $2 OFFSET $3
    "#;
    let rows = sqlx::query(list_query)
        .bind(role_id)
        .bind(i64::from(limit))
        .bind((i64::from(page) - 1) * i64::from(limit))
        .fetch_all(pool)
        .await?;

    let users = rows
        .into_iter()
        .map(|row| {
            let user_id: Uuid = row.get("user_id");
            RoleUser {
                id: row.get("id"),
                user_id: user_id.to_string(),
                email: row.get("email"),
                full_name: row.get("full_name"),
                status: row.get("status"),
                assigned_at: row.get("assigned_at"),
            }
        })
        .collect();

    Ok(Some(RoleUsersResponse {
        users,
        pagination: Pagination::new(page, limit, total),
    }))
}

//! Dotted-key system settings.
//!
//! Keys look like `system.name` or `security.code_expire_minutes`; the part
//! before the first dot is the category. Values are stored as JSONB so a
//! setting can be a string, number, or boolean without a schema change.
//! Defaults are seeded at startup with `ON CONFLICT DO NOTHING`, so edits
//! survive restarts and upgrades only add new keys.

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;
use utoipa::{IntoParams, ToSchema};

use super::auth::AuthState;
use super::auth::principal::require_auth;
use super::ServiceError;

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingEntry {
    pub value: serde_json::Value,
    pub description: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingDetail {
    pub key: String,
    pub value: serde_json::Value,
    pub description: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingRequest {
    pub value: serde_json::Value,
    pub description: Option<String>,
}

/// Settings grouped by category, then by the remainder of the key.
pub type GroupedSettings = BTreeMap<String, BTreeMap<String, SettingEntry>>;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SettingsQuery {
    /// Restrict the listing to one category, e.g. `system`.
    pub category: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/settings",
    params(SettingsQuery),
    responses(
        (status = 200, description = "Settings grouped by category."),
        (status = 401, description = "Missing or invalid bearer token."),
    ),
    tag = "settings"
)]
pub async fn list_settings(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    Query(query): Query<SettingsQuery>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    match fetch_all_settings(&pool, category_param(&query)).await {
        Ok(rows) => (StatusCode::OK, Json(group_settings(rows))).into_response(),
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/settings/categories/list",
    responses(
        (status = 200, description = "Distinct setting categories.", body = [String]),
        (status = 401, description = "Missing or invalid bearer token."),
    ),
    tag = "settings"
)]
pub async fn list_categories(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let query = "SELECT DISTINCT split_part(key, '.', 1) AS category FROM settings ORDER BY category";
    let result = sqlx::query(query).fetch_all(&pool).await;

    match result {
        Ok(rows) => {
            let categories: Vec<String> = rows.iter().map(|row| row.get("category")).collect();
            (StatusCode::OK, Json(categories)).into_response()
        }
        Err(err) => ServiceError::Database(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/settings/{key}",
    params(("key" = String, Path, description = "Dotted setting key")),
    responses(
        (status = 200, description = "Single setting.", body = SettingDetail),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "Setting not found."),
    ),
    tag = "settings"
)]
pub async fn get_setting(
    Path(key): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    match fetch_setting(&pool, key.trim()).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/v1/settings/{key}",
    params(("key" = String, Path, description = "Dotted setting key")),
    request_body = UpdateSettingRequest,
    responses(
        (status = 200, description = "Setting updated.", body = SettingDetail),
        (status = 400, description = "Invalid input."),
        (status = 401, description = "Missing or invalid bearer token."),
        (status = 404, description = "Setting not found."),
    ),
    tag = "settings"
)]
pub async fn update_setting(
    Path(key): Path<String>,
    headers: HeaderMap,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<UpdateSettingRequest>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, &state, &pool).await {
        return status.into_response();
    }

    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing request body.").into_response();
    };

    if payload.value.is_null() {
        return (StatusCode::BAD_REQUEST, "Setting value must not be null.").into_response();
    }

    match store_setting(&pool, key.trim(), &payload.value, payload.description.as_deref()).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

struct SettingRow {
    key: String,
    value: serde_json::Value,
    description: Option<String>,
    updated_at: String,
}

const SETTING_COLUMNS: &str = r#"
    key,
    value::text AS value,
    description,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

fn parse_row(row: &sqlx::postgres::PgRow) -> Result<SettingRow, ServiceError> {
    let value: String = row.get("value");
    let value = serde_json::from_str(&value)
        .map_err(|_| ServiceError::BadRequest("Stored setting is not valid JSON."))?;
    Ok(SettingRow {
        key: row.get("key"),
        value,
        description: row.get("description"),
        updated_at: row.get("updated_at"),
    })
}

/// Trimmed category filter; blank input means no filter.
fn category_param(query: &SettingsQuery) -> Option<&str> {
    query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|category| !category.is_empty())
}

async fn fetch_all_settings(
    pool: &PgPool,
    category: Option<&str>,
) -> Result<Vec<SettingRow>, sqlx::Error> {
    let query = format!(
        "SELECT {SETTING_COLUMNS}
         FROM settings
         WHERE ($1::text IS NULL OR key LIKE $1 || '.%')
         ORDER BY key"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(category)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    // Rows with unparsable values are skipped rather than failing the list.
    Ok(rows.iter().filter_map(|row| parse_row(row).ok()).collect())
}

/// Split `category.rest` keys into a two-level map. Keys with no dot land
/// under the `general` category.
fn group_settings(rows: Vec<SettingRow>) -> GroupedSettings {
    let mut grouped = GroupedSettings::new();
    for row in rows {
        let (category, rest) = match row.key.split_once('.') {
            Some((category, rest)) if !category.is_empty() && !rest.is_empty() => {
                (category.to_string(), rest.to_string())
            }
            _ => ("general".to_string(), row.key.clone()),
        };
        grouped.entry(category).or_default().insert(
            rest,
            SettingEntry {
                value: row.value,
                description: row.description,
                updated_at: row.updated_at,
            },
        );
    }
    grouped
}

async fn fetch_setting(pool: &PgPool, key: &str) -> Result<Option<SettingDetail>, ServiceError> {
    let query = format!("SELECT {SETTING_COLUMNS} FROM settings WHERE key = $1");
    let row = sqlx::query(&query)
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(ServiceError::Database)?;

    match row {
        Some(row) => {
            let row = parse_row(&row)?;
            Ok(Some(SettingDetail {
                key: row.key,
                value: row.value,
                description: row.description,
                updated_at: row.updated_at,
            }))
        }
        None => Ok(None),
    }
}

/// Update an existing setting. Unknown keys are rejected rather than
/// upserted, so typos cannot create orphan settings.
async fn store_setting(
    pool: &PgPool,
    key: &str,
    value: &serde_json::Value,
    description: Option<&str>,
) -> Result<Option<SettingDetail>, ServiceError> {
    let query = format!(
        "UPDATE settings
         SET value = $1::jsonb, description = COALESCE($2, description)
         WHERE key = $3
         RETURNING {SETTING_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(value.to_string())
        .bind(description)
        .bind(key)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(ServiceError::Database)?;

    match row {
        Some(row) => {
            let row = parse_row(&row)?;
            Ok(Some(SettingDetail {
                key: row.key,
                value: row.value,
                description: row.description,
                updated_at: row.updated_at,
            }))
        }
        None => Ok(None),
    }
}

// Values are small objects tagging their scalar type ({"text": ..},
// {"boolean": ..}, {"number": ..}) so the UI can render the right editor
// without guessing from the JSON type.
fn default_settings() -> Vec<(&'static str, serde_json::Value, &'static str)> {
    vec![
        ("system.name", json!({"text": "Portiere"}), "Product name shown in the UI"),
        ("system.description", json!({"text": "User and access management"}), "Short product description"),
        ("system.version", json!({"text": env!("CARGO_PKG_VERSION")}), "Deployed application version"),
        ("system.timezone", json!({"text": "UTC"}), "Default timezone for display"),
        ("system.language", json!({"text": "en"}), "Default interface language"),
        ("system.logo_url", json!({"text": ""}), "URL of the product logo"),
        ("email.smtp_enabled", json!({"boolean": false}), "Deliver mail through SMTP instead of the relay"),
        ("email.smtp_host", json!({"text": ""}), "SMTP server host"),
        ("email.smtp_port", json!({"number": 587}), "SMTP server port"),
        ("email.smtp_secure", json!({"boolean": false}), "Use TLS when talking to the SMTP server"),
        ("email.smtp_user", json!({"text": ""}), "SMTP username"),
        ("email.from_name", json!({"text": "Portiere"}), "Sender display name"),
        ("email.from_address", json!({"text": "noreply@example.com"}), "Sender address"),
        ("security.code_expire_minutes", json!({"number": 5}), "Verification code lifetime in minutes"),
        ("security.code_rate_limit", json!({"number": 5}), "Verification codes allowed per hour per address"),
        ("security.jwt_expire_hours", json!({"number": 24}), "Bearer token lifetime in hours"),
        ("security.refresh_token_expire_days", json!({"number": 30}), "Refresh window in days"),
        ("security.max_login_attempts", json!({"number": 5}), "Failed logins before lockout"),
        ("security.lockout_duration_minutes", json!({"number": 30}), "Lockout duration in minutes"),
        ("features.user_registration", json!({"boolean": true}), "Allow first-login provisioning"),
        ("features.email_verification", json!({"boolean": true}), "Require email verification codes"),
        ("features.avatar_upload", json!({"boolean": true}), "Allow users to upload avatars"),
        ("features.dark_mode", json!({"boolean": true}), "Expose the dark theme"),
        ("features.multi_language", json!({"boolean": false}), "Expose language selection"),
    ]
}

/// Insert any missing default settings. Existing rows are left untouched.
pub async fn seed_defaults(pool: &PgPool) -> Result<(), sqlx::Error> {
    let query = "INSERT INTO settings (key, value, description)
         VALUES ($1, $2::jsonb, $3)
         ON CONFLICT (key) DO NOTHING";
    for (key, value, description) in default_settings() {
        sqlx::query(query)
            .bind(key)
            .bind(value.to_string())
            .bind(description)
            .execute(pool)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: serde_json::Value) -> SettingRow {
        SettingRow {
            key: key.to_string(),
            value,
            description: None,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn group_settings_splits_on_first_dot() {
        let grouped = group_settings(vec![
            row("system.name", json!({"text": "Portiere"})),
            row("system.logo_url", json!({"text": ""})),
            row("security.jwt_expire_hours", json!({"number": 24})),
        ]);

        assert_eq!(grouped.len(), 2);
        let system = grouped.get("system");
        assert!(system.is_some());
        if let Some(system) = system {
            assert_eq!(system.len(), 2);
            assert!(system.contains_key("name"));
            assert!(system.contains_key("logo_url"));
        }
    }

    #[test]
    fn group_settings_keeps_later_dots_in_key() {
        let grouped = group_settings(vec![row("email.smtp.host", json!("mail"))]);
        let email = grouped.get("email");
        assert!(email.is_some());
        if let Some(email) = email {
            assert!(email.contains_key("smtp.host"));
        }
    }

    #[test]
    fn group_settings_dotless_keys_land_in_general() {
        let grouped = group_settings(vec![row("motd", json!("hello"))]);
        let general = grouped.get("general");
        assert!(general.is_some());
        if let Some(general) = general {
            assert!(general.contains_key("motd"));
        }
    }

    #[test]
    fn defaults_cover_expected_categories() {
        let defaults = default_settings();
        assert_eq!(defaults.len(), 24);
        for category in ["system", "email", "security", "features"] {
            assert!(
                defaults
                    .iter()
                    .any(|(key, _, _)| key.starts_with(&format!("{category}."))),
                "missing {category}"
            );
        }
        // Keys must be unique or seeding would silently collapse them.
        let mut keys: Vec<_> = defaults.iter().map(|(key, _, _)| *key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), defaults.len());
    }

    #[test]
    fn seeded_values_are_tagged_scalars() {
        for (key, value, _) in default_settings() {
            let object = value.as_object();
            assert!(object.is_some(), "{key} is not an object");
            if let Some(object) = object {
                assert_eq!(object.len(), 1, "{key} must carry exactly one tag");
                let tagged = object.get("text").map(serde_json::Value::is_string)
                    == Some(true)
                    || object.get("boolean").map(serde_json::Value::is_boolean) == Some(true)
                    || object.get("number").map(serde_json::Value::is_number) == Some(true);
                assert!(tagged, "{key} value is not a tagged scalar: {value}");
            }
        }
    }

    #[test]
    fn category_param_trims_and_drops_blank() {
        let query = SettingsQuery {
            category: Some(" system ".to_string()),
        };
        assert_eq!(category_param(&query), Some("system"));

        let query = SettingsQuery {
            category: Some("   ".to_string()),
        };
        assert_eq!(category_param(&query), None);

        assert_eq!(category_param(&SettingsQuery::default()), None);
    }

    #[test]
    fn update_request_rejects_unknown_fields() {
        let result: Result<UpdateSettingRequest, _> =
            serde_json::from_str(r#"{"value":1,"secret":true}"#);
        assert!(result.is_err());
    }
}

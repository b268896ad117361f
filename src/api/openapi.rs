use super::handlers::{auth, health, roles, settings, users};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
/// Routes added outside (like `/` or `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::send_code::send_code))
        .routes(routes!(auth::verify_code::verify_code))
        .routes(routes!(auth::session::profile))
        .routes(routes!(auth::session::refresh))
        .routes(routes!(users::list_users, users::create_user))
        .routes(routes!(users::user_stats))
        .routes(routes!(
            users::get_user,
            users::update_user,
            users::delete_user
        ))
        .routes(routes!(users::update_user_status))
        .routes(routes!(users::list_user_roles))
        .routes(routes!(users::assign_role, users::remove_role))
        .routes(routes!(users::list_user_login_logs))
        .routes(routes!(roles::list_roles, roles::create_role))
        .routes(routes!(roles::available_permissions))
        .routes(routes!(
            roles::get_role,
            roles::update_role,
            roles::delete_role
        ))
        .routes(routes!(roles::list_role_users))
        .routes(routes!(settings::list_settings))
        .routes(routes!(settings::list_categories))
        .routes(routes!(settings::get_setting, settings::update_setting));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Email code login and bearer sessions".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Profile management and role assignments".to_string());

    let mut roles_tag = Tag::new("roles");
    roles_tag.description = Some("Role catalog and permissions".to_string());

    let mut settings_tag = Tag::new("settings");
    settings_tag.description = Some("Dotted-key system settings".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, users_tag, roles_tag, settings_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Portiere"));
            assert_eq!(contact.email.as_deref(), Some("team@portiere.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "settings"));
        assert!(spec.paths.paths.contains_key("/v1/auth/send-code"));
        assert!(spec.paths.paths.contains_key("/v1/auth/verify-code"));
        assert!(spec.paths.paths.contains_key("/v1/users/{id}/roles/{role_id}"));
        assert!(spec.paths.paths.contains_key("/v1/roles/permissions/available"));
        assert!(spec.paths.paths.contains_key("/v1/settings/categories/list"));
        assert!(spec.paths.paths.contains_key("/v1/settings/{key}"));
    }
}

use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, License, Tag,
    },
    Modify, OpenApi,
};

use super::handlers::{auth, habits, health};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::signup::register,
        auth::verification::verify_email,
        auth::login::login,
        auth::session::refresh,
        auth::session::logout,
        habits::list,
        habits::create,
        habits::get,
        habits::update,
        habits::delete,
    ),
    components(schemas(
        crate::api::error::ErrorBody,
        auth::types::RegisterRequest,
        auth::types::RegisterResponse,
        auth::types::PublicUser,
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::RefreshResponse,
        auth::types::MessageResponse,
        habits::Habit,
        habits::CreateHabitRequest,
        habits::UpdateHabitRequest,
        health::Health,
    )),
    modifiers(&CargoInfo, &BearerSecurity)
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Fill `info` and tags from Cargo.toml metadata instead of utoipa defaults.
struct CargoInfo;

impl Modify for CargoInfo {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = env!("CARGO_PKG_NAME").to_string();
        openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
        openapi.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
        openapi.info.contact = cargo_contact();
        openapi.info.license = cargo_license();

        let mut auth_tag = Tag::new("auth");
        auth_tag.description =
            Some("Registration, email verification, and session lifecycle".to_string());
        let mut habits_tag = Tag::new("habits");
        habits_tag.description = Some("Per-user habit tracking".to_string());
        let mut health_tag = Tag::new("health");
        health_tag.description = Some("Service health".to_string());
        openapi.tags = Some(vec![auth_tag, habits_tag, health_tag]);
    }
}

/// Register the `bearer` security scheme referenced by protected routes.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
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

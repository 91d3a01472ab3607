// ABOUTME: HTTP route modules organized by domain
// ABOUTME: Athletes, run crews and their content, runs, Garmin, and health, plus shared handler helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! Each domain module exposes a `XRoutes::routes(resources)` constructor
//! returning a router with its state attached; `server::build_router` merges
//! them. Handlers authenticate first, then load whatever the guard needs.

/// Announcement routes
pub mod announcements;
/// Athlete profile routes
pub mod athletes;
/// Public city run routes
pub mod city_runs;
/// Run crew and membership routes
pub mod crews;
/// Garmin connection, OAuth, and webhook routes
pub mod garmin;
/// Health check route
pub mod health;
/// Crew chat routes
pub mod messages;
/// Crew run (event) routes
pub mod runs;

pub use announcements::AnnouncementRoutes;
pub use athletes::AthleteRoutes;
pub use city_runs::CityRunRoutes;
pub use crews::CrewRoutes;
pub use garmin::GarminRoutes;
pub use health::HealthRoutes;
pub use messages::MessageRoutes;
pub use runs::RunRoutes;

use gofast_core::constants::limits::MAX_CONTENT_LENGTH;
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::{CrewMembership, RunCrew};
use uuid::Uuid;

use crate::resources::ServerResources;

/// Parse a path segment as a UUID
pub(crate) fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::invalid_input(format!("Invalid {what} ID format")))
}

/// Load a crew and its full membership list; 404 if the crew does not exist
pub(crate) async fn load_crew(
    resources: &ServerResources,
    crew_id: Uuid,
) -> AppResult<(RunCrew, Vec<CrewMembership>)> {
    let crews = resources.database.crews();
    let crew = crews
        .get(crew_id)
        .await?
        .ok_or_else(|| AppError::not_found("Run crew"))?;
    let memberships = crews.list_memberships(crew_id).await?;
    Ok((crew, memberships))
}

/// Trim user-supplied text and enforce non-empty and maximum length
pub(crate) fn require_text(value: &str, field: &str, max_len: usize) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input(format!("{field} cannot be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::invalid_input(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Validate message or announcement content
pub(crate) fn require_content(value: &str) -> AppResult<String> {
    require_text(value, "Content", MAX_CONTENT_LENGTH)
}

/// Trim an optional field, mapping blank to `None`
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gofast_core::errors::ErrorCode;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("  hi  ", "Name", 10).unwrap(), "hi");
        assert_eq!(
            require_text("   ", "Name", 10).unwrap_err().code,
            ErrorCode::InvalidInput
        );
        assert!(require_text("abcdefghijk", "Name", 10).is_err());
    }

    #[test]
    fn test_optional_text_blank_is_none() {
        assert_eq!(optional_text(Some("  ".to_owned())), None);
        assert_eq!(optional_text(Some(" x ".to_owned())).as_deref(), Some("x"));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn test_parse_id() {
        assert!(parse_id("not-a-uuid", "crew").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "crew").unwrap(), id);
    }
}

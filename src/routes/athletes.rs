// ABOUTME: Athlete profile route handlers
// ABOUTME: Sign-up from token claims, profile read/update, and synced Garmin activity listing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use gofast_core::constants::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use gofast_core::errors::{AppError, ErrorCode};
use gofast_core::models::{normalize_handle, split_display_name, Athlete, GarminActivity};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::crews::AthleteCrewResponse;
use super::garmin::GarminStatusResponse;
use super::optional_text;
use crate::auth::{authenticate, authenticate_identity, VerifiedIdentity};
use crate::logging::AppLogger;
use crate::resources::ServerResources;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Athlete profile
#[derive(Debug, Serialize, Deserialize)]
pub struct AthleteResponse {
    /// Athlete ID
    pub id: String,
    /// Email address
    pub email: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Display name
    pub display_name: String,
    /// Unique handle
    pub gofast_handle: Option<String>,
    /// City
    pub city: Option<String>,
    /// State or region
    pub state: Option<String>,
    /// Short bio
    pub bio: Option<String>,
    /// Profile photo URL
    pub photo_url: Option<String>,
    /// Creation time
    pub created_at: String,
    /// Last update
    pub updated_at: String,
}

impl From<Athlete> for AthleteResponse {
    fn from(athlete: Athlete) -> Self {
        Self {
            id: athlete.id.to_string(),
            display_name: athlete.display_name(),
            email: athlete.email,
            first_name: athlete.first_name,
            last_name: athlete.last_name,
            gofast_handle: athlete.gofast_handle,
            city: athlete.city,
            state: athlete.state,
            bio: athlete.bio,
            photo_url: athlete.photo_url,
            created_at: athlete.created_at.to_rfc3339(),
            updated_at: athlete.updated_at.to_rfc3339(),
        }
    }
}

/// The caller's profile with Garmin status and crews
#[derive(Debug, Serialize, Deserialize)]
pub struct AthleteProfileResponse {
    /// Profile
    pub athlete: AthleteResponse,
    /// Garmin connection summary
    pub garmin: GarminStatusResponse,
    /// Crews the athlete belongs to
    pub crews: Vec<AthleteCrewResponse>,
}

/// Editable profile fields; absent fields are left unchanged, blank ones cleared
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAthleteRequest {
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Unique handle
    pub gofast_handle: Option<String>,
    /// City
    pub city: Option<String>,
    /// State or region
    pub state: Option<String>,
    /// Short bio
    pub bio: Option<String>,
    /// Profile photo URL
    pub photo_url: Option<String>,
}

/// Paging query
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Page size (default 20, max 100)
    pub limit: Option<i64>,
    /// Rows to skip
    pub offset: Option<i64>,
}

/// Synced Garmin activity
#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// Activity ID
    pub id: String,
    /// Garmin's activity id
    pub source_activity_id: String,
    /// Name
    pub activity_name: Option<String>,
    /// Garmin activity type
    pub activity_type: Option<String>,
    /// Start time
    pub start_time: Option<String>,
    /// Duration in seconds
    pub duration_seconds: Option<i64>,
    /// Distance in meters
    pub distance_meters: Option<f64>,
    /// Average heart rate
    pub average_heart_rate: Option<i64>,
    /// Active calories
    pub calories: Option<i64>,
    /// Whether detail samples were received
    pub has_detail: bool,
    /// Whether Garmin reported a manual edit
    pub manually_updated: bool,
}

impl From<GarminActivity> for ActivityResponse {
    fn from(activity: GarminActivity) -> Self {
        Self {
            id: activity.id.to_string(),
            source_activity_id: activity.source_activity_id,
            activity_name: activity.activity_name,
            activity_type: activity.activity_type,
            start_time: activity.start_time.map(|t| t.to_rfc3339()),
            duration_seconds: activity.duration_seconds,
            distance_meters: activity.distance_meters,
            average_heart_rate: activity.average_heart_rate,
            calories: activity.calories,
            has_detail: activity.detail.is_some(),
            manually_updated: activity.manually_updated,
        }
    }
}

/// Activity page
#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityListResponse {
    /// Activities, newest first
    pub activities: Vec<ActivityResponse>,
    /// Page size used
    pub limit: i64,
    /// Offset used
    pub offset: i64,
}

// ============================================================================
// Routes
// ============================================================================

/// Athlete routes implementation
pub struct AthleteRoutes;

impl AthleteRoutes {
    /// Create all athlete routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/athletes", post(Self::handle_upsert_athlete))
            .route(
                "/api/athletes/me",
                get(Self::handle_get_me).put(Self::handle_update_me),
            )
            .route("/api/athletes/me/activities", get(Self::handle_list_activities))
            .with_state(resources)
    }

    /// Handle POST /api/athletes - create or refresh the caller from token claims
    async fn handle_upsert_athlete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let identity = authenticate_identity(&headers, &resources).await?;
        let athletes = resources.database.athletes();

        if let Some(athlete) = athletes.get_by_firebase_id(&identity.firebase_id).await? {
            return Self::sync_existing_athlete(&resources, athlete, identity).await;
        }

        let mut athlete = Athlete::new(identity.firebase_id.clone(), identity.email.clone());
        if let Some(name) = identity.name.as_deref() {
            (athlete.first_name, athlete.last_name) = split_display_name(name);
        }
        athlete.photo_url.clone_from(&identity.picture);

        match athletes.create(&athlete).await {
            Ok(()) => {}
            // Lost a race with a concurrent first sign-in for the same identity
            Err(e) if e.code == ErrorCode::ResourceAlreadyExists => {
                if let Some(existing) = athletes.get_by_firebase_id(&identity.firebase_id).await? {
                    return Self::sync_existing_athlete(&resources, existing, identity).await;
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        }

        info!(athlete_id = %athlete.id, "Athlete created");
        AppLogger::log_auth_event(&identity.firebase_id, "athlete_created", true, None);

        let response: AthleteResponse = athlete.into();
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Refresh token-sourced fields on a returning athlete
    async fn sync_existing_athlete(
        resources: &ServerResources,
        mut athlete: Athlete,
        identity: VerifiedIdentity,
    ) -> Result<Response, AppError> {
        let mut changed = false;
        if identity.email.is_some() && identity.email != athlete.email {
            athlete.email = identity.email;
            changed = true;
        }
        if athlete.photo_url.is_none() && identity.picture.is_some() {
            athlete.photo_url = identity.picture;
            changed = true;
        }
        if changed {
            athlete = resources.database.athletes().update(&athlete).await?;
        }
        let response: AthleteResponse = athlete.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle GET /api/athletes/me
    async fn handle_get_me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;

        let connection = resources.database.garmin().get_connection(athlete.id).await?;
        let crews = resources.database.crews().list_for_athlete(athlete.id).await?;

        let response = AthleteProfileResponse {
            garmin: GarminStatusResponse::from_connection(connection.as_ref()),
            crews: crews.into_iter().map(Into::into).collect(),
            athlete: athlete.into(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle PUT /api/athletes/me
    async fn handle_update_me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<UpdateAthleteRequest>,
    ) -> Result<Response, AppError> {
        let mut athlete = authenticate(&headers, &resources).await?;

        if let Some(handle) = body.gofast_handle {
            athlete.gofast_handle = if handle.trim().is_empty() {
                None
            } else {
                Some(normalize_handle(&handle)?)
            };
        }
        apply_optional(&mut athlete.first_name, body.first_name);
        apply_optional(&mut athlete.last_name, body.last_name);
        apply_optional(&mut athlete.city, body.city);
        apply_optional(&mut athlete.state, body.state);
        apply_optional(&mut athlete.bio, body.bio);
        apply_optional(&mut athlete.photo_url, body.photo_url);
        athlete.updated_at = Utc::now();

        let updated = resources.database.athletes().update(&athlete).await?;
        let response: AthleteResponse = updated.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle GET /api/athletes/me/activities
    async fn handle_list_activities(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<PageQuery>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let activities = resources
            .database
            .garmin()
            .list_activities(athlete.id, limit, offset)
            .await?;

        let response = ActivityListResponse {
            activities: activities.into_iter().map(Into::into).collect(),
            limit,
            offset,
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}

/// Overwrite `field` when the request names it; blank clears it
fn apply_optional(field: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *field = optional_text(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_optional() {
        let mut field = Some("Boston".to_owned());
        apply_optional(&mut field, None);
        assert_eq!(field.as_deref(), Some("Boston"));

        apply_optional(&mut field, Some(" Denver ".to_owned()));
        assert_eq!(field.as_deref(), Some("Denver"));

        apply_optional(&mut field, Some(String::new()));
        assert_eq!(field, None);
    }
}

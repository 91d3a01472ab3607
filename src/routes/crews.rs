// ABOUTME: Run crew route handlers
// ABOUTME: Crew creation, join codes, crew settings, membership roles, removal, leave, and ownership transfer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! Run crew routes
//!
//! Every handler on `/api/runcrews/:id/...` runs the same guard chain:
//! authenticate, load the crew's memberships once, resolve the caller's
//! membership, then ask [`CrewAccess`] about the specific action.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use gofast_core::constants::limits::MAX_CREW_NAME_LENGTH;
use gofast_core::errors::AppError;
use gofast_core::models::{
    normalize_handle, normalize_join_code, CrewMembership, CrewRole, RunCrew,
};
use gofast_core::permissions::{CrewAccess, ADMINS, STAFF};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{load_crew, optional_text, parse_id, require_text};
use crate::auth::authenticate;
use crate::database::{AthleteCrew, CrewMemberDetail};
use crate::logging::AppLogger;
use crate::resources::ServerResources;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Run crew
#[derive(Debug, Serialize, Deserialize)]
pub struct CrewResponse {
    /// Crew ID
    pub id: String,
    /// Name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Code other athletes join with
    pub join_code: String,
    /// Public handle
    pub handle: Option<String>,
    /// Home city
    pub city: Option<String>,
    /// Logo URL
    pub logo_url: Option<String>,
    /// Creation time
    pub created_at: String,
    /// Last update
    pub updated_at: String,
}

impl From<RunCrew> for CrewResponse {
    fn from(crew: RunCrew) -> Self {
        Self {
            id: crew.id.to_string(),
            name: crew.name,
            description: crew.description,
            join_code: crew.join_code,
            handle: crew.handle,
            city: crew.city,
            logo_url: crew.logo_url,
            created_at: crew.created_at.to_rfc3339(),
            updated_at: crew.updated_at.to_rfc3339(),
        }
    }
}

/// A crew from the caller's point of view
#[derive(Debug, Serialize, Deserialize)]
pub struct AthleteCrewResponse {
    /// Crew
    pub crew: CrewResponse,
    /// Caller's role
    pub role: String,
    /// When the caller joined
    pub joined_at: String,
    /// Member count
    pub member_count: i64,
}

impl From<AthleteCrew> for AthleteCrewResponse {
    fn from(entry: AthleteCrew) -> Self {
        Self {
            crew: entry.crew.into(),
            role: entry.role.as_str().to_owned(),
            joined_at: entry.joined_at.to_rfc3339(),
            member_count: entry.member_count,
        }
    }
}

/// Membership row
#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipResponse {
    /// Crew ID
    pub run_crew_id: String,
    /// Athlete ID
    pub athlete_id: String,
    /// Role
    pub role: String,
    /// Join time
    pub joined_at: String,
}

impl From<CrewMembership> for MembershipResponse {
    fn from(membership: CrewMembership) -> Self {
        Self {
            run_crew_id: membership.run_crew_id.to_string(),
            athlete_id: membership.athlete_id.to_string(),
            role: membership.role.as_str().to_owned(),
            joined_at: membership.joined_at.to_rfc3339(),
        }
    }
}

/// Crew member with profile basics
#[derive(Debug, Serialize, Deserialize)]
pub struct CrewMemberResponse {
    /// Athlete ID
    pub athlete_id: String,
    /// Display name
    pub display_name: String,
    /// Handle
    pub gofast_handle: Option<String>,
    /// Photo URL
    pub photo_url: Option<String>,
    /// Role
    pub role: String,
    /// Join time
    pub joined_at: String,
}

impl From<CrewMemberDetail> for CrewMemberResponse {
    fn from(detail: CrewMemberDetail) -> Self {
        Self {
            athlete_id: detail.athlete.id.to_string(),
            display_name: detail.athlete.display_name(),
            gofast_handle: detail.athlete.gofast_handle,
            photo_url: detail.athlete.photo_url,
            role: detail.membership.role.as_str().to_owned(),
            joined_at: detail.membership.joined_at.to_rfc3339(),
        }
    }
}

/// Crew with its members, for members
#[derive(Debug, Serialize, Deserialize)]
pub struct CrewDetailResponse {
    /// Crew
    pub crew: CrewResponse,
    /// Caller's role
    pub my_role: String,
    /// Members, admins first
    pub members: Vec<CrewMemberResponse>,
}

/// Public crew preview
#[derive(Debug, Serialize, Deserialize)]
pub struct CrewPreviewResponse {
    /// Crew ID
    pub id: String,
    /// Name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Handle
    pub handle: Option<String>,
    /// City
    pub city: Option<String>,
    /// Logo URL
    pub logo_url: Option<String>,
    /// Member count
    pub member_count: i64,
}

/// Crew listing
#[derive(Debug, Serialize, Deserialize)]
pub struct CrewListResponse {
    /// Crews
    pub crews: Vec<AthleteCrewResponse>,
}

/// Member listing
#[derive(Debug, Serialize, Deserialize)]
pub struct MemberListResponse {
    /// Members, admins first
    pub members: Vec<CrewMemberResponse>,
}

/// Create a crew
#[derive(Debug, Deserialize)]
pub struct CreateCrewRequest {
    /// Name
    pub name: String,
    /// Description
    pub description: Option<String>,
    /// Home city
    pub city: Option<String>,
    /// Public handle
    pub handle: Option<String>,
    /// Logo URL
    pub logo_url: Option<String>,
}

/// Update crew settings; absent fields are unchanged, blank ones cleared
#[derive(Debug, Deserialize)]
pub struct UpdateCrewRequest {
    /// Name
    pub name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Home city
    pub city: Option<String>,
    /// Public handle
    pub handle: Option<String>,
    /// Logo URL
    pub logo_url: Option<String>,
}

/// Join by code
#[derive(Debug, Deserialize)]
pub struct JoinCrewRequest {
    /// Join code, case-insensitive
    pub join_code: String,
}

/// Change a member's role
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    /// `member`, `manager`, or `admin`
    pub role: String,
}

/// Hand the admin role to another member
#[derive(Debug, Deserialize)]
pub struct TransferOwnershipRequest {
    /// New admin
    pub athlete_id: String,
    /// Caller's role afterwards (`member` or `manager`, default `member`)
    pub demote_to: Option<String>,
}

// ============================================================================
// Routes
// ============================================================================

/// Run crew routes implementation
pub struct CrewRoutes;

impl CrewRoutes {
    /// Create all run crew routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/runcrews", post(Self::handle_create_crew))
            .route("/api/runcrews/mine", get(Self::handle_my_crews))
            .route("/api/runcrews/join", post(Self::handle_join_crew))
            .route("/api/runcrews/handle/:handle", get(Self::handle_preview_crew))
            .route(
                "/api/runcrews/:id",
                get(Self::handle_get_crew)
                    .put(Self::handle_update_crew)
                    .delete(Self::handle_delete_crew),
            )
            .route("/api/runcrews/:id/members", get(Self::handle_list_members))
            .route(
                "/api/runcrews/:id/members/:athlete_id/role",
                put(Self::handle_update_role),
            )
            .route(
                "/api/runcrews/:id/members/:athlete_id",
                delete(Self::handle_remove_member),
            )
            .route("/api/runcrews/:id/leave", post(Self::handle_leave_crew))
            .route(
                "/api/runcrews/:id/transfer-ownership",
                post(Self::handle_transfer_ownership),
            )
            .with_state(resources)
    }

    async fn member_list(
        resources: &ServerResources,
        crew_id: Uuid,
    ) -> Result<Vec<CrewMemberResponse>, AppError> {
        Ok(resources
            .database
            .crews()
            .list_member_details(crew_id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Handle POST /api/runcrews - create a crew with the caller as admin
    async fn handle_create_crew(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<CreateCrewRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;

        let name = require_text(&body.name, "Name", MAX_CREW_NAME_LENGTH)?;
        let mut crew = RunCrew::new(
            name,
            optional_text(body.description),
            optional_text(body.city),
        );
        crew.handle = optional_text(body.handle)
            .map(|h| normalize_handle(&h))
            .transpose()?;
        crew.logo_url = optional_text(body.logo_url);

        let membership = resources
            .database
            .crews()
            .create_with_admin(&mut crew, athlete.id)
            .await?;

        AppLogger::log_crew_event(
            &crew.id.to_string(),
            &athlete.id.to_string(),
            "crew_created",
            None,
        );

        let response = CrewDetailResponse {
            members: Self::member_list(&resources, crew.id).await?,
            my_role: membership.role.as_str().to_owned(),
            crew: crew.into(),
        };
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Handle GET /api/runcrews/mine
    async fn handle_my_crews(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crews = resources.database.crews().list_for_athlete(athlete.id).await?;

        let response = CrewListResponse {
            crews: crews.into_iter().map(Into::into).collect(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle POST /api/runcrews/join
    async fn handle_join_crew(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<JoinCrewRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crews = resources.database.crews();

        let code = normalize_join_code(&body.join_code);
        if code.is_empty() {
            return Err(AppError::invalid_input("join_code is required"));
        }
        let crew = crews
            .get_by_join_code(&code)
            .await?
            .ok_or_else(|| AppError::not_found("Run crew"))?;

        let membership = CrewMembership::new(crew.id, athlete.id, CrewRole::Member);
        crews.add_member(&membership).await?;

        AppLogger::log_crew_event(
            &crew.id.to_string(),
            &athlete.id.to_string(),
            "member_joined",
            None,
        );

        let response = AthleteCrewResponse {
            member_count: crews.member_count(crew.id).await?,
            role: membership.role.as_str().to_owned(),
            joined_at: membership.joined_at.to_rfc3339(),
            crew: crew.into(),
        };
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Handle GET /api/runcrews/handle/:handle - public preview
    async fn handle_preview_crew(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(handle): Path<String>,
    ) -> Result<Response, AppError> {
        authenticate(&headers, &resources).await?;
        let crews = resources.database.crews();

        let handle = normalize_handle(&handle).map_err(|_| AppError::not_found("Run crew"))?;
        let crew = crews
            .get_by_handle(&handle)
            .await?
            .ok_or_else(|| AppError::not_found("Run crew"))?;

        let response = CrewPreviewResponse {
            member_count: crews.member_count(crew.id).await?,
            id: crew.id.to_string(),
            name: crew.name,
            description: crew.description,
            handle: crew.handle,
            city: crew.city,
            logo_url: crew.logo_url,
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle GET /api/runcrews/:id - members only
    async fn handle_get_crew(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (crew, memberships) = load_crew(&resources, crew_id).await?;
        let access = CrewAccess::resolve(&memberships, athlete.id)?;

        let response = CrewDetailResponse {
            my_role: access.role().as_str().to_owned(),
            members: Self::member_list(&resources, crew_id).await?,
            crew: crew.into(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle PUT /api/runcrews/:id - admin or manager
    async fn handle_update_crew(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(body): Json<UpdateCrewRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (mut crew, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?.require_any(STAFF)?;

        if let Some(name) = body.name {
            crew.name = require_text(&name, "Name", MAX_CREW_NAME_LENGTH)?;
        }
        if body.description.is_some() {
            crew.description = optional_text(body.description);
        }
        if body.city.is_some() {
            crew.city = optional_text(body.city);
        }
        if body.logo_url.is_some() {
            crew.logo_url = optional_text(body.logo_url);
        }
        if body.handle.is_some() {
            crew.handle = optional_text(body.handle)
                .map(|h| normalize_handle(&h))
                .transpose()?;
        }
        crew.updated_at = Utc::now();

        let updated = resources.database.crews().update(&crew).await?;
        AppLogger::log_crew_event(&id, &athlete.id.to_string(), "crew_updated", None);

        let response: CrewResponse = updated.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/runcrews/:id - admin only
    async fn handle_delete_crew(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?.require_any(ADMINS)?;

        if !resources.database.crews().delete(crew_id).await? {
            return Err(AppError::not_found("Run crew"));
        }
        AppLogger::log_crew_event(&id, &athlete.id.to_string(), "crew_deleted", None);

        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Handle GET /api/runcrews/:id/members
    async fn handle_list_members(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?;

        let response = MemberListResponse {
            members: Self::member_list(&resources, crew_id).await?,
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle PUT /api/runcrews/:id/members/:athlete_id/role - admin only
    async fn handle_update_role(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, target)): Path<(String, String)>,
        Json(body): Json<UpdateRoleRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let target_id = parse_id(&target, "athlete")?;
        let new_role: CrewRole = body.role.parse()?;

        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?.check_role_change(target_id, new_role)?;

        let updated = resources
            .database
            .crews()
            .update_role(crew_id, target_id, new_role)
            .await?;

        AppLogger::log_crew_event(
            &id,
            &athlete.id.to_string(),
            &format!("role_changed:{new_role}"),
            Some(&target),
        );

        let response: MembershipResponse = updated.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/runcrews/:id/members/:athlete_id
    async fn handle_remove_member(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, target)): Path<(String, String)>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let target_id = parse_id(&target, "athlete")?;

        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?.check_removal(target_id)?;

        if !resources
            .database
            .crews()
            .remove_member(crew_id, target_id)
            .await?
        {
            return Err(AppError::not_found("Crew member"));
        }

        AppLogger::log_crew_event(&id, &athlete.id.to_string(), "member_removed", Some(&target));
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Handle POST /api/runcrews/:id/leave
    async fn handle_leave_crew(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;

        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?.check_leave()?;

        resources
            .database
            .crews()
            .remove_member(crew_id, athlete.id)
            .await?;

        AppLogger::log_crew_event(&id, &athlete.id.to_string(), "member_left", None);
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Handle POST /api/runcrews/:id/transfer-ownership - admin only
    async fn handle_transfer_ownership(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(body): Json<TransferOwnershipRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let target_id = parse_id(&body.athlete_id, "athlete")?;
        let demote_to = body
            .demote_to
            .as_deref()
            .map(str::parse::<CrewRole>)
            .transpose()?
            .unwrap_or(CrewRole::Member);

        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?.check_transfer(target_id, demote_to)?;

        resources
            .database
            .crews()
            .transfer_ownership(crew_id, athlete.id, target_id, demote_to)
            .await?;

        AppLogger::log_crew_event(
            &id,
            &athlete.id.to_string(),
            "ownership_transferred",
            Some(&body.athlete_id),
        );

        let response = MemberListResponse {
            members: Self::member_list(&resources, crew_id).await?,
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}

// ABOUTME: Crew announcement route handlers
// ABOUTME: Staff post announcements; authors or staff edit and archive them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use gofast_core::constants::limits::MAX_TITLE_LENGTH;
use gofast_core::errors::AppError;
use gofast_core::models::Announcement;
use gofast_core::permissions::{CrewAccess, STAFF};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{load_crew, optional_text, parse_id, require_content, require_text};
use crate::auth::authenticate;
use crate::logging::AppLogger;
use crate::resources::ServerResources;

/// Announcement
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementResponse {
    /// Announcement ID
    pub id: String,
    /// Crew ID
    pub run_crew_id: String,
    /// Author athlete ID
    pub author_id: String,
    /// Optional title
    pub title: Option<String>,
    /// Body
    pub content: String,
    /// Archive time, if archived
    pub archived_at: Option<String>,
    /// Creation time
    pub created_at: String,
    /// Last update
    pub updated_at: String,
}

impl From<Announcement> for AnnouncementResponse {
    fn from(a: Announcement) -> Self {
        Self {
            id: a.id.to_string(),
            run_crew_id: a.run_crew_id.to_string(),
            author_id: a.author_id.to_string(),
            title: a.title,
            content: a.content,
            archived_at: a.archived_at.map(|t| t.to_rfc3339()),
            created_at: a.created_at.to_rfc3339(),
            updated_at: a.updated_at.to_rfc3339(),
        }
    }
}

/// Announcement listing
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementListResponse {
    /// Active announcements, newest first
    pub announcements: Vec<AnnouncementResponse>,
}

/// Create an announcement
#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementRequest {
    /// Optional title
    pub title: Option<String>,
    /// Body
    pub content: String,
}

/// Edit an announcement; absent fields are unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateAnnouncementRequest {
    /// Title; blank clears it
    pub title: Option<String>,
    /// Body
    pub content: Option<String>,
}

/// Announcement routes implementation
pub struct AnnouncementRoutes;

impl AnnouncementRoutes {
    /// Create all announcement routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/runcrews/:id/announcements",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/runcrews/:id/announcements/:announcement_id",
                put(Self::handle_update).delete(Self::handle_archive),
            )
            .with_state(resources)
    }

    /// Handle GET /api/runcrews/:id/announcements - members
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?;

        let announcements = resources.database.content().list_announcements(crew_id).await?;
        let response = AnnouncementListResponse {
            announcements: announcements.into_iter().map(Into::into).collect(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle POST /api/runcrews/:id/announcements - admin or manager
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(body): Json<CreateAnnouncementRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?.require_any(STAFF)?;

        let title = optional_text(body.title)
            .map(|t| require_text(&t, "Title", MAX_TITLE_LENGTH))
            .transpose()?;
        let announcement =
            Announcement::new(crew_id, athlete.id, title, require_content(&body.content)?);
        resources
            .database
            .content()
            .create_announcement(&announcement)
            .await?;

        AppLogger::log_crew_event(
            &id,
            &athlete.id.to_string(),
            "announcement_posted",
            Some(&announcement.id.to_string()),
        );

        let response: AnnouncementResponse = announcement.into();
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    async fn load_announcement(
        resources: &ServerResources,
        headers: &HeaderMap,
        id: &str,
        announcement_id: &str,
    ) -> Result<(Uuid, Announcement), AppError> {
        let athlete = authenticate(headers, resources).await?;
        let crew_id = parse_id(id, "crew")?;
        let announcement_id = parse_id(announcement_id, "announcement")?;

        let (_, memberships) = load_crew(resources, crew_id).await?;
        let access = CrewAccess::resolve(&memberships, athlete.id)?;

        let announcement = resources
            .database
            .content()
            .get_announcement(crew_id, announcement_id)
            .await?
            .ok_or_else(|| AppError::not_found("Announcement"))?;
        access.require_author_or_staff(announcement.author_id)?;

        Ok((athlete.id, announcement))
    }

    /// Handle PUT /api/runcrews/:id/announcements/:announcement_id - author or staff
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, announcement_id)): Path<(String, String)>,
        Json(body): Json<UpdateAnnouncementRequest>,
    ) -> Result<Response, AppError> {
        let (_, mut announcement) =
            Self::load_announcement(&resources, &headers, &id, &announcement_id).await?;

        if announcement.archived_at.is_some() {
            return Err(AppError::invalid_operation(
                "Archived announcements cannot be edited",
            ));
        }
        if body.title.is_some() {
            announcement.title = optional_text(body.title)
                .map(|t| require_text(&t, "Title", MAX_TITLE_LENGTH))
                .transpose()?;
        }
        if let Some(content) = body.content {
            announcement.content = require_content(&content)?;
        }
        announcement.updated_at = Utc::now();

        let updated = resources
            .database
            .content()
            .update_announcement(&announcement)
            .await?;
        let response: AnnouncementResponse = updated.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/runcrews/:id/announcements/:announcement_id - soft archive
    async fn handle_archive(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, announcement_id)): Path<(String, String)>,
    ) -> Result<Response, AppError> {
        let (actor_id, announcement) =
            Self::load_announcement(&resources, &headers, &id, &announcement_id).await?;

        let archived = resources
            .database
            .content()
            .archive_announcement(&announcement)
            .await?;

        AppLogger::log_crew_event(
            &id,
            &actor_id.to_string(),
            "announcement_archived",
            Some(&announcement_id),
        );

        let response: AnnouncementResponse = archived.into();
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}

// ABOUTME: Crew run (event) route handlers and the run/RSVP types shared with city runs
// ABOUTME: Staff schedule runs, creators or staff edit them, members RSVP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use gofast_core::constants::limits::MAX_TITLE_LENGTH;
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::{RsvpStatus, RsvpTally, Run, RunRsvp, RunScope};
use gofast_core::permissions::{CrewAccess, STAFF};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{load_crew, optional_text, parse_id, require_text};
use crate::auth::authenticate;
use crate::logging::AppLogger;
use crate::resources::ServerResources;

// ============================================================================
// Shared Types
// ============================================================================

/// RSVP counts per status
#[derive(Debug, Serialize, Deserialize)]
pub struct RsvpCounts {
    /// Going
    pub going: u32,
    /// Maybe
    pub maybe: u32,
    /// Not going
    pub not_going: u32,
}

impl From<RsvpTally> for RsvpCounts {
    fn from(tally: RsvpTally) -> Self {
        Self {
            going: tally.going,
            maybe: tally.maybe,
            not_going: tally.not_going,
        }
    }
}

/// Scheduled run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    /// Run ID
    pub id: String,
    /// Owning crew, for crew runs
    pub run_crew_id: Option<String>,
    /// City, for public runs
    pub city: Option<String>,
    /// Title
    pub title: String,
    /// Description
    pub description: Option<String>,
    /// Start time
    pub starts_at: String,
    /// Meeting point name
    pub meet_up_point: Option<String>,
    /// Meeting point address
    pub meet_up_address: Option<String>,
    /// Planned distance
    pub distance_km: Option<f64>,
    /// Planned pace
    pub pace: Option<String>,
    /// Creator athlete ID
    pub created_by: String,
    /// RSVP counts
    pub rsvps: RsvpCounts,
    /// Creation time
    pub created_at: String,
    /// Last update
    pub updated_at: String,
}

impl RunResponse {
    /// Build a response from a run and its RSVP tally
    #[must_use]
    pub fn new(run: Run, tally: RsvpTally) -> Self {
        Self {
            id: run.id.to_string(),
            run_crew_id: run.run_crew_id().map(|id| id.to_string()),
            city: run.city().map(str::to_owned),
            title: run.title,
            description: run.description,
            starts_at: run.starts_at.to_rfc3339(),
            meet_up_point: run.meet_up_point,
            meet_up_address: run.meet_up_address,
            distance_km: run.distance_km,
            pace: run.pace,
            created_by: run.created_by.to_string(),
            rsvps: tally.into(),
            created_at: run.created_at.to_rfc3339(),
            updated_at: run.updated_at.to_rfc3339(),
        }
    }
}

/// Run listing
#[derive(Debug, Serialize, Deserialize)]
pub struct RunListResponse {
    /// Runs, soonest first
    pub runs: Vec<RunResponse>,
}

/// One athlete's RSVP
#[derive(Debug, Serialize, Deserialize)]
pub struct RsvpResponse {
    /// Run ID
    pub run_id: String,
    /// Athlete ID
    pub athlete_id: String,
    /// `going`, `maybe`, or `not_going`
    pub status: String,
    /// Last change
    pub updated_at: String,
}

impl From<RunRsvp> for RsvpResponse {
    fn from(rsvp: RunRsvp) -> Self {
        Self {
            run_id: rsvp.run_id.to_string(),
            athlete_id: rsvp.athlete_id.to_string(),
            status: rsvp.status.as_str().to_owned(),
            updated_at: rsvp.updated_at.to_rfc3339(),
        }
    }
}

/// RSVPs of a run
#[derive(Debug, Serialize, Deserialize)]
pub struct RsvpListResponse {
    /// RSVPs, most recent first
    pub rsvps: Vec<RsvpResponse>,
    /// Counts per status
    pub counts: RsvpCounts,
}

/// Run with its RSVPs
#[derive(Debug, Serialize, Deserialize)]
pub struct RunDetailResponse {
    /// Run
    pub run: RunResponse,
    /// RSVPs, most recent first
    pub rsvps: Vec<RsvpResponse>,
}

/// Create a run
#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    /// Title
    pub title: String,
    /// Description
    pub description: Option<String>,
    /// Start time, RFC 3339
    pub starts_at: String,
    /// Meeting point name
    pub meet_up_point: Option<String>,
    /// Meeting point address
    pub meet_up_address: Option<String>,
    /// Planned distance
    pub distance_km: Option<f64>,
    /// Planned pace
    pub pace: Option<String>,
    /// City; required for city runs, ignored for crew runs
    pub city: Option<String>,
}

/// Edit a run; absent fields are unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateRunRequest {
    /// Title
    pub title: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Start time, RFC 3339
    pub starts_at: Option<String>,
    /// Meeting point name
    pub meet_up_point: Option<String>,
    /// Meeting point address
    pub meet_up_address: Option<String>,
    /// Planned distance
    pub distance_km: Option<f64>,
    /// Planned pace
    pub pace: Option<String>,
}

/// RSVP to a run
#[derive(Debug, Deserialize)]
pub struct RsvpRequest {
    /// `going`, `maybe`, or `not_going`
    pub status: String,
}

/// Crew run listing filter
#[derive(Debug, Deserialize)]
pub struct CrewRunQuery {
    /// Include runs that already started
    #[serde(default)]
    pub include_past: bool,
}

fn parse_start(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| AppError::invalid_input("starts_at must be an RFC 3339 timestamp"))
}

fn validate_distance(distance_km: Option<f64>) -> AppResult<Option<f64>> {
    match distance_km {
        Some(d) if !d.is_finite() || d <= 0.0 => Err(AppError::invalid_input(
            "distance_km must be a positive number",
        )),
        other => Ok(other),
    }
}

/// Build a run from a create request
pub(crate) fn build_run(scope: RunScope, created_by: Uuid, body: CreateRunRequest) -> AppResult<Run> {
    let now = Utc::now();
    Ok(Run {
        id: Uuid::new_v4(),
        scope,
        title: require_text(&body.title, "Title", MAX_TITLE_LENGTH)?,
        description: optional_text(body.description),
        starts_at: parse_start(&body.starts_at)?,
        meet_up_point: optional_text(body.meet_up_point),
        meet_up_address: optional_text(body.meet_up_address),
        distance_km: validate_distance(body.distance_km)?,
        pace: optional_text(body.pace),
        created_by,
        created_at: now,
        updated_at: now,
    })
}

fn apply_update(run: &mut Run, body: UpdateRunRequest) -> AppResult<()> {
    if let Some(title) = body.title {
        run.title = require_text(&title, "Title", MAX_TITLE_LENGTH)?;
    }
    if let Some(starts_at) = body.starts_at {
        run.starts_at = parse_start(&starts_at)?;
    }
    if body.description.is_some() {
        run.description = optional_text(body.description);
    }
    if body.meet_up_point.is_some() {
        run.meet_up_point = optional_text(body.meet_up_point);
    }
    if body.meet_up_address.is_some() {
        run.meet_up_address = optional_text(body.meet_up_address);
    }
    if body.distance_km.is_some() {
        run.distance_km = validate_distance(body.distance_km)?;
    }
    if body.pace.is_some() {
        run.pace = optional_text(body.pace);
    }
    run.updated_at = Utc::now();
    Ok(())
}

/// Attach RSVP tallies to runs
pub(crate) async fn with_tallies(
    resources: &ServerResources,
    runs: Vec<Run>,
) -> AppResult<Vec<RunResponse>> {
    let manager = resources.database.runs();
    let mut responses = Vec::with_capacity(runs.len());
    for run in runs {
        let tally = manager.rsvp_tally(run.id).await?;
        responses.push(RunResponse::new(run, tally));
    }
    Ok(responses)
}

/// Record the athlete's RSVP and return the run's new counts
pub(crate) async fn record_rsvp(
    resources: &ServerResources,
    run_id: Uuid,
    athlete_id: Uuid,
    status: &str,
) -> AppResult<RsvpListResponse> {
    let rsvp = RunRsvp {
        run_id,
        athlete_id,
        status: status.parse::<RsvpStatus>()?,
        updated_at: Utc::now(),
    };
    let manager = resources.database.runs();
    manager.upsert_rsvp(&rsvp).await?;

    let rsvps = manager.list_rsvps(run_id).await?;
    Ok(RsvpListResponse {
        counts: RsvpTally::from_rsvps(&rsvps).into(),
        rsvps: rsvps.into_iter().map(Into::into).collect(),
    })
}

// ============================================================================
// Routes
// ============================================================================

/// Crew run routes implementation
pub struct RunRoutes;

impl RunRoutes {
    /// Create all crew run routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/runcrews/:id/runs",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/runcrews/:id/runs/:run_id",
                put(Self::handle_update).delete(Self::handle_delete),
            )
            .route("/api/runcrews/:id/runs/:run_id/rsvp", post(Self::handle_rsvp))
            .route(
                "/api/runcrews/:id/runs/:run_id/rsvps",
                get(Self::handle_list_rsvps),
            )
            .with_state(resources)
    }

    async fn get_crew_run(resources: &ServerResources, crew_id: Uuid, run_id: &str) -> AppResult<Run> {
        let run_id = parse_id(run_id, "run")?;
        resources
            .database
            .runs()
            .get(run_id)
            .await?
            .filter(|run| run.run_crew_id() == Some(crew_id))
            .ok_or_else(|| AppError::not_found("Run"))
    }

    /// Handle GET /api/runcrews/:id/runs - members; upcoming unless `include_past`
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Query(query): Query<CrewRunQuery>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?;

        let from = (!query.include_past).then(Utc::now);
        let runs = resources.database.runs().list_for_crew(crew_id, from).await?;

        let response = RunListResponse {
            runs: with_tallies(&resources, runs).await?,
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle POST /api/runcrews/:id/runs - admin or manager
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<String>,
        Json(body): Json<CreateRunRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?.require_any(STAFF)?;

        let run = build_run(RunScope::Crew { run_crew_id: crew_id }, athlete.id, body)?;
        resources.database.runs().create(&run).await?;

        AppLogger::log_crew_event(
            &id,
            &athlete.id.to_string(),
            "run_scheduled",
            Some(&run.id.to_string()),
        );

        let response = RunResponse::new(run, RsvpTally::default());
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Handle PUT /api/runcrews/:id/runs/:run_id - creator or staff
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, run_id)): Path<(String, String)>,
        Json(body): Json<UpdateRunRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        let access = CrewAccess::resolve(&memberships, athlete.id)?;

        let mut run = Self::get_crew_run(&resources, crew_id, &run_id).await?;
        access.require_author_or_staff(run.created_by)?;
        apply_update(&mut run, body)?;

        let runs = resources.database.runs();
        let updated = runs.update(&run).await?;
        let tally = runs.rsvp_tally(updated.id).await?;

        let response = RunResponse::new(updated, tally);
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/runcrews/:id/runs/:run_id - creator or staff
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, run_id)): Path<(String, String)>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        let access = CrewAccess::resolve(&memberships, athlete.id)?;

        let run = Self::get_crew_run(&resources, crew_id, &run_id).await?;
        access.require_author_or_staff(run.created_by)?;

        resources.database.runs().delete(run.id).await?;
        AppLogger::log_crew_event(&id, &athlete.id.to_string(), "run_cancelled", Some(&run_id));

        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Handle POST /api/runcrews/:id/runs/:run_id/rsvp - members
    async fn handle_rsvp(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, run_id)): Path<(String, String)>,
        Json(body): Json<RsvpRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?;

        let run = Self::get_crew_run(&resources, crew_id, &run_id).await?;
        let response = record_rsvp(&resources, run.id, athlete.id, &body.status).await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle GET /api/runcrews/:id/runs/:run_id/rsvps - members
    async fn handle_list_rsvps(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, run_id)): Path<(String, String)>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let crew_id = parse_id(&id, "crew")?;
        let (_, memberships) = load_crew(&resources, crew_id).await?;
        CrewAccess::resolve(&memberships, athlete.id)?;

        let run = Self::get_crew_run(&resources, crew_id, &run_id).await?;
        let rsvps = resources.database.runs().list_rsvps(run.id).await?;

        let response = RsvpListResponse {
            counts: RsvpTally::from_rsvps(&rsvps).into(),
            rsvps: rsvps.into_iter().map(Into::into).collect(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gofast_core::errors::ErrorCode;

    fn request(starts_at: &str) -> CreateRunRequest {
        CreateRunRequest {
            title: " Long Run ".to_owned(),
            description: Some(String::new()),
            starts_at: starts_at.to_owned(),
            meet_up_point: Some("Boathouse".to_owned()),
            meet_up_address: None,
            distance_km: Some(16.0),
            pace: None,
            city: None,
        }
    }

    #[test]
    fn test_build_run_normalizes_fields() {
        let crew_id = Uuid::new_v4();
        let run = build_run(
            RunScope::Crew { run_crew_id: crew_id },
            Uuid::new_v4(),
            request("2030-05-04T07:00:00-04:00"),
        )
        .unwrap();

        assert_eq!(run.title, "Long Run");
        assert_eq!(run.description, None);
        assert_eq!(run.run_crew_id(), Some(crew_id));
        assert_eq!(run.starts_at.to_rfc3339(), "2030-05-04T11:00:00+00:00");
    }

    #[test]
    fn test_build_run_rejects_bad_input() {
        let scope = RunScope::City { city: "boston".to_owned() };
        let err = build_run(scope.clone(), Uuid::new_v4(), request("tomorrow")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        let mut negative = request("2030-05-04T07:00:00Z");
        negative.distance_km = Some(-1.0);
        assert!(build_run(scope, Uuid::new_v4(), negative).is_err());
    }
}

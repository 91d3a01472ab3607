// ABOUTME: Public city run route handlers
// ABOUTME: Any athlete lists, posts, and RSVPs to runs in a city; only the creator deletes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::{normalize_city, RsvpTally, Run, RunScope};
use serde::Deserialize;

use super::runs::{
    build_run, record_rsvp, with_tallies, CreateRunRequest, RsvpRequest, RunDetailResponse,
    RunListResponse, RunResponse,
};
use super::parse_id;
use crate::auth::authenticate;
use crate::resources::ServerResources;

/// City filter
#[derive(Debug, Deserialize)]
pub struct CityQuery {
    /// City name, case-insensitive
    pub city: Option<String>,
}

fn require_city(city: Option<&str>) -> AppResult<String> {
    let city = normalize_city(city.unwrap_or_default());
    if city.is_empty() {
        return Err(AppError::invalid_input("city is required"));
    }
    Ok(city)
}

/// City run routes implementation
pub struct CityRunRoutes;

impl CityRunRoutes {
    /// Create all city run routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/city-runs",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/api/city-runs/:run_id",
                get(Self::handle_get).delete(Self::handle_delete),
            )
            .route("/api/city-runs/:run_id/rsvp", post(Self::handle_rsvp))
            .with_state(resources)
    }

    async fn get_city_run(resources: &ServerResources, run_id: &str) -> AppResult<Run> {
        let run_id = parse_id(run_id, "run")?;
        resources
            .database
            .runs()
            .get(run_id)
            .await?
            .filter(|run| run.city().is_some())
            .ok_or_else(|| AppError::not_found("City run"))
    }

    /// Handle GET /api/city-runs?city= - upcoming runs in a city
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<CityQuery>,
    ) -> Result<Response, AppError> {
        authenticate(&headers, &resources).await?;
        let city = require_city(query.city.as_deref())?;

        let runs = resources
            .database
            .runs()
            .list_for_city(&city, Some(Utc::now()))
            .await?;

        let response = RunListResponse {
            runs: with_tallies(&resources, runs).await?,
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle POST /api/city-runs - any athlete
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<CreateRunRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let city = require_city(body.city.as_deref())?;

        let run = build_run(RunScope::City { city }, athlete.id, body)?;
        resources.database.runs().create(&run).await?;

        let response = RunResponse::new(run, RsvpTally::default());
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Handle GET /api/city-runs/:run_id - run with RSVPs
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(run_id): Path<String>,
    ) -> Result<Response, AppError> {
        authenticate(&headers, &resources).await?;
        let run = Self::get_city_run(&resources, &run_id).await?;
        let rsvps = resources.database.runs().list_rsvps(run.id).await?;

        let response = RunDetailResponse {
            run: RunResponse::new(run, RsvpTally::from_rsvps(&rsvps)),
            rsvps: rsvps.into_iter().map(Into::into).collect(),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/city-runs/:run_id - creator only
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(run_id): Path<String>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let run = Self::get_city_run(&resources, &run_id).await?;

        if run.created_by != athlete.id {
            return Err(AppError::forbidden(
                "Only the athlete who posted this run can delete it",
            ));
        }
        resources.database.runs().delete(run.id).await?;

        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Handle POST /api/city-runs/:run_id/rsvp - any athlete
    async fn handle_rsvp(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(run_id): Path<String>,
        Json(body): Json<RsvpRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let run = Self::get_city_run(&resources, &run_id).await?;

        let response = record_rsvp(&resources, run.id, athlete.id, &body.status).await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_city() {
        assert_eq!(require_city(Some("  San   Francisco ")).unwrap(), "san francisco");
        assert!(require_city(Some("   ")).is_err());
        assert!(require_city(None).is_err());
    }
}

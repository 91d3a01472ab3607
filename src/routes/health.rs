// ABOUTME: Health check route for load balancers and uptime monitoring
// ABOUTME: Reports service name, version, and database reachability
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use gofast_core::constants::service_names;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::resources::ServerResources;

/// Health check body
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: String,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Whether the database answered
    pub database: bool,
    /// Check time
    pub timestamp: String,
}

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health check route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::handle_health))
            .with_state(resources)
    }

    async fn handle_health(State(resources): State<Arc<ServerResources>>) -> Response {
        let database = match resources.database.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Health check: database unreachable");
                false
            }
        };

        let (status, label) = if database {
            (StatusCode::OK, "ok")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        };

        let body = HealthResponse {
            status: label.to_owned(),
            service: service_names::GOFAST_API.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            database,
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: In-memory database, a static bearer verifier, and athlete/crew fixtures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
//! Shared test utilities for `gofast`
//!
//! Bearer tokens in tests have the form `test:<firebase_id>`; the
//! [`StaticTokenVerifier`] accepts them without any network call.

use std::sync::{Arc, Once};

use async_trait::async_trait;
use axum::Router;
use gofast::{
    auth::{TokenVerifier, VerifiedIdentity},
    config::{Environment, GarminConfig, ServerConfig},
    database::Database,
    garmin::GarminOAuthClient,
    resources::ServerResources,
    server::build_router,
};
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::Athlete;
use serde_json::{json, Value};

use crate::helpers::axum_test::AxumTestRequest;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Accepts `test:<firebase_id>` bearer tokens
pub struct StaticTokenVerifier;

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        let firebase_id = token
            .strip_prefix("test:")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::auth_invalid("Unknown test token"))?;

        Ok(VerifiedIdentity {
            firebase_id: firebase_id.to_owned(),
            email: Some(format!("{firebase_id}@example.com")),
            name: Some(format!("{firebase_id} Runner")),
            picture: None,
        })
    }
}

/// Bearer token for a firebase id
pub fn token_for(firebase_id: &str) -> String {
    format!("test:{firebase_id}")
}

/// Test application over an in-memory database
pub struct TestApp {
    /// Shared resources, for direct database access in assertions
    pub resources: Arc<ServerResources>,
}

impl TestApp {
    /// App with default Garmin settings
    pub async fn new() -> Self {
        Self::with_garmin(GarminConfig::default()).await
    }

    /// App whose Garmin client talks to the given endpoints
    pub async fn with_garmin(garmin: GarminConfig) -> Self {
        init_test_logging();

        let database = Database::new("sqlite::memory:")
            .await
            .expect("Failed to create test database");

        let config = ServerConfig {
            environment: Environment::Testing,
            garmin: garmin.clone(),
            ..ServerConfig::default()
        };

        let resources = ServerResources::new(
            database,
            Arc::new(StaticTokenVerifier),
            Arc::new(GarminOAuthClient::new(garmin, reqwest::Client::new())),
            Arc::new(config),
        );

        Self {
            resources: Arc::new(resources),
        }
    }

    /// Full application router
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.resources))
    }

    /// Database handle
    pub fn database(&self) -> &Database {
        &self.resources.database
    }

    /// Insert an athlete directly and return it with its bearer token
    pub async fn create_athlete(&self, firebase_id: &str, first_name: &str) -> (Athlete, String) {
        let mut athlete = Athlete::new(
            firebase_id.to_owned(),
            Some(format!("{firebase_id}@example.com")),
        );
        athlete.first_name = Some(first_name.to_owned());
        self.database()
            .athletes()
            .create(&athlete)
            .await
            .expect("Failed to create athlete");
        (athlete, token_for(firebase_id))
    }

    /// Create a crew through the API; returns the crew JSON
    pub async fn create_crew(&self, token: &str, name: &str) -> Value {
        let response = AxumTestRequest::post("/api/runcrews")
            .bearer(token)
            .json(&json!({ "name": name, "city": "Boston" }))
            .send(self.router())
            .await;
        assert_eq!(response.status(), 201, "crew creation failed");
        let body: Value = response.json();
        body["crew"].clone()
    }

    /// Join a crew through the API
    pub async fn join_crew(&self, token: &str, join_code: &str) {
        let response = AxumTestRequest::post("/api/runcrews/join")
            .bearer(token)
            .json(&json!({ "join_code": join_code }))
            .send(self.router())
            .await;
        assert_eq!(response.status(), 201, "join failed");
    }

    /// Change a member's role through the API; returns the status code
    pub async fn set_role(&self, token: &str, crew_id: &str, athlete_id: &str, role: &str) -> u16 {
        AxumTestRequest::put(&format!(
            "/api/runcrews/{crew_id}/members/{athlete_id}/role"
        ))
        .bearer(token)
        .json(&json!({ "role": role }))
        .send(self.router())
        .await
        .status()
    }
}

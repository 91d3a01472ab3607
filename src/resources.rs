// ABOUTME: Shared server state handed to every router
// ABOUTME: Database handle, bearer verifier, Garmin client, and configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::auth::{FirebaseAuth, TokenVerifier};
use crate::config::ServerConfig;
use crate::database::Database;
use crate::garmin::GarminOAuthClient;

/// Outbound HTTP timeout for Google and Garmin calls
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Resources shared by all request handlers
///
/// Built once at startup and wrapped in an `Arc`; routers receive it as axum
/// state.
pub struct ServerResources {
    /// Database handle
    pub database: Database,
    /// Bearer token verifier
    pub verifier: Arc<dyn TokenVerifier>,
    /// Garmin OAuth and Wellness API client
    pub garmin: Arc<GarminOAuthClient>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Assemble resources from already-built parts
    #[must_use]
    pub fn new(
        database: Database,
        verifier: Arc<dyn TokenVerifier>,
        garmin: Arc<GarminOAuthClient>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            database,
            verifier,
            garmin,
            config,
        }
    }

    /// Connect the database and build the Firebase verifier and Garmin client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the database is unreachable
    pub async fn from_config(config: ServerConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let database = Database::new(&config.database.to_connection_string()).await?;
        let verifier = Arc::new(FirebaseAuth::new(config.firebase.clone(), http_client.clone()));
        let garmin = Arc::new(GarminOAuthClient::new(config.garmin.clone(), http_client));

        Ok(Self::new(database, verifier, garmin, Arc::new(config)))
    }
}

// ABOUTME: Identity provider and Garmin OAuth configuration types
// ABOUTME: Firebase bearer verification settings and Garmin client credentials and endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::env;

use anyhow::{Context, Result};
use gofast_core::constants::garmin;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::environment::env_var_or;

/// Default lifetime of cached Firebase public keys when Google sends no `max-age`
pub const DEFAULT_KEY_CACHE_TTL_SECS: u64 = 3600;

/// Firebase Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Firebase project ID (required for token validation)
    pub project_id: Option<String>,
    /// Whether Firebase authentication is enabled
    pub enabled: bool,
    /// Cache TTL for Firebase public keys in seconds
    pub key_cache_ttl_secs: u64,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            enabled: false,
            key_cache_ttl_secs: DEFAULT_KEY_CACHE_TTL_SECS,
        }
    }
}

impl FirebaseConfig {
    /// Check if Firebase is enabled and has a project ID configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.enabled && self.project_id.is_some()
    }

    /// Load Firebase configuration from environment
    ///
    /// Environment variables:
    /// - `FIREBASE_PROJECT_ID` - Firebase project ID
    /// - `FIREBASE_AUTH_ENABLED` - set to `false` to disable (default: true when a project is set)
    /// - `FIREBASE_KEY_CACHE_TTL_SECS` - public key cache TTL (default: 3600)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparseable
    pub fn from_env() -> Result<Self> {
        let project_id = env::var("FIREBASE_PROJECT_ID")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let enabled = project_id.is_some()
            && env_var_or("FIREBASE_AUTH_ENABLED", "true")
                .parse::<bool>()
                .context("Invalid FIREBASE_AUTH_ENABLED value")?;

        if enabled {
            info!(
                project_id = project_id.as_deref().unwrap_or("(not set)"),
                "Firebase authentication enabled"
            );
        }

        Ok(Self {
            project_id,
            enabled,
            key_cache_ttl_secs: env_var_or(
                "FIREBASE_KEY_CACHE_TTL_SECS",
                &DEFAULT_KEY_CACHE_TTL_SECS.to_string(),
            )
            .parse()
            .context("Invalid FIREBASE_KEY_CACHE_TTL_SECS value")?,
        })
    }
}

/// Garmin Connect OAuth 2.0 (PKCE) client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarminConfig {
    /// OAuth client ID
    pub client_id: Option<String>,
    /// OAuth client secret
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    /// Redirect URI registered with Garmin (points at `/api/garmin/callback`)
    pub redirect_uri: Option<String>,
    /// Authorization page
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Wellness API base URL
    pub api_base_url: String,
}

impl Default for GarminConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            auth_url: garmin::AUTH_URL.to_owned(),
            token_url: garmin::TOKEN_URL.to_owned(),
            api_base_url: garmin::API_BASE_URL.to_owned(),
        }
    }
}

impl GarminConfig {
    /// Whether the client credentials needed for the OAuth flow are present
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.redirect_uri.is_some()
    }

    /// Load Garmin configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            client_id: env::var("GARMIN_CLIENT_ID").ok(),
            client_secret: env::var("GARMIN_CLIENT_SECRET").ok(),
            redirect_uri: env::var("GARMIN_REDIRECT_URI").ok(),
            auth_url: env_var_or("GARMIN_AUTH_URL", garmin::AUTH_URL),
            token_url: env_var_or("GARMIN_TOKEN_URL", garmin::TOKEN_URL),
            api_base_url: env_var_or("GARMIN_API_BASE_URL", garmin::API_BASE_URL),
        }
    }
}

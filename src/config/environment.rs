// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Loads the server configuration from environment variables and an optional .env file
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! Environment-based configuration management for production deployment

use std::env;
use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::database::DatabaseUrl;
use super::oauth::{FirebaseConfig, GarminConfig};

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/gofast.db";

/// Default frontend origin, used for CORS and the Garmin popup `postMessage` target
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any origin
    pub allowed_origins: Vec<String>,
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Database location
    pub database: DatabaseUrl,
    /// Web frontend origin
    pub frontend_url: String,
    /// CORS settings
    pub cors: CorsConfig,
    /// Firebase bearer verification settings
    pub firebase: FirebaseConfig,
    /// Garmin Connect OAuth and API settings
    pub garmin: GarminConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            http_port: DEFAULT_HTTP_PORT,
            environment: Environment::default(),
            database: DatabaseUrl::default(),
            frontend_url: DEFAULT_FRONTEND_URL.to_owned(),
            cors: CorsConfig::default(),
            firebase: FirebaseConfig::default(),
            garmin: GarminConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {e}");
        }

        let http_port = env_var_or("HTTP_PORT", &DEFAULT_HTTP_PORT.to_string())
            .parse()
            .context("Invalid HTTP_PORT value")?;
        let frontend_url = env_var_or("FRONTEND_URL", DEFAULT_FRONTEND_URL);
        let allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map_or_else(|_| vec![frontend_url.clone()], |v| parse_origins(&v));

        let config = Self {
            host: env_var_or("HOST", DEFAULT_HOST),
            http_port,
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            database: DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL)),
            frontend_url,
            cors: CorsConfig { allowed_origins },
            firebase: FirebaseConfig::from_env()?,
            garmin: GarminConfig::from_env(),
        };

        config.validate();
        Ok(config)
    }

    /// Warn about settings that will make some endpoints unusable
    pub fn validate(&self) {
        if !self.firebase.is_configured() {
            warn!("FIREBASE_PROJECT_ID not set: every authenticated endpoint will return 401");
        }
        if !self.garmin.is_configured() {
            warn!("Garmin OAuth credentials not set: /api/garmin/authorize will fail");
        }
        if self.environment.is_production() && self.cors.allowed_origins.iter().any(|o| o == "*") {
            warn!("CORS allows any origin in production");
        }
    }

    /// One-line summary for startup logs (no secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "environment={} host={} port={} database={} firebase={} garmin={}",
            self.environment,
            self.host,
            self.http_port,
            self.database,
            if self.firebase.is_configured() { "enabled" } else { "disabled" },
            if self.garmin.is_configured() { "configured" } else { "missing" },
        )
    }
}

/// Get environment variable or default value
pub(crate) fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse comma-separated CORS origins
#[must_use]
pub fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".into()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from_str_or_default("prod"), Environment::Production);
        assert_eq!(Environment::from_str_or_default("TEST"), Environment::Testing);
        assert_eq!(Environment::from_str_or_default("other"), Environment::Development);
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("https://gofast.run, http://localhost:3000,"),
            vec!["https://gofast.run", "http://localhost:3000"]
        );
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_and_overrides() {
        env::set_var("HTTP_PORT", "9191");
        env::set_var("CORS_ALLOWED_ORIGINS", "https://a.example,https://b.example");
        env::remove_var("DATABASE_URL");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.http_port, 9191);
        assert_eq!(config.cors.allowed_origins.len(), 2);
        assert_eq!(config.database, DatabaseUrl::parse_url(DEFAULT_DATABASE_URL));

        env::set_var("HTTP_PORT", "not-a-port");
        assert!(ServerConfig::from_env().is_err());

        env::remove_var("HTTP_PORT");
        env::remove_var("CORS_ALLOWED_ORIGINS");
    }
}

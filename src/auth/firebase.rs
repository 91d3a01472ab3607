// ABOUTME: Firebase Authentication ID token validation
// ABOUTME: Verifies RS256 tokens against Google's X.509 certificates with Cache-Control driven key caching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! Firebase ID token validation
//!
//! - Public keys are fetched from Google's certificate endpoint as X.509 PEMs
//! - Keys are cached for the `max-age` Google sends (never less than 5 minutes)
//! - Tokens are validated for signature, issuer, audience, and expiry

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use gofast_core::errors::{AppError, AppResult};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use x509_parser::prelude::*;

use super::{TokenVerifier, VerifiedIdentity};
use crate::config::FirebaseConfig;

/// Google's Firebase public key endpoint
const FIREBASE_CERTS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

/// Firebase issuer URL prefix (the project ID is appended)
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Minimum cache TTL in seconds
const MIN_CACHE_TTL_SECS: i64 = 300;

struct CachedKeys {
    /// Key ID to PEM-encoded public key
    keys: HashMap<String, String>,
    expires_at: DateTime<Utc>,
}

/// Firebase ID token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaims {
    /// Issuer (`https://securetoken.google.com/<project-id>`)
    pub iss: String,
    /// Audience (the Firebase project ID)
    pub aud: String,
    /// Subject (Firebase user UID)
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// User email
    pub email: Option<String>,
    /// User display name
    pub name: Option<String>,
    /// User profile picture URL
    pub picture: Option<String>,
}

impl From<FirebaseClaims> for VerifiedIdentity {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            firebase_id: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        }
    }
}

/// Firebase ID token verifier
pub struct FirebaseAuth {
    config: FirebaseConfig,
    http_client: Client,
    certs_url: String,
    cached_keys: Arc<RwLock<Option<CachedKeys>>>,
}

impl FirebaseAuth {
    /// Create a verifier that fetches keys from Google
    #[must_use]
    pub fn new(config: FirebaseConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
            certs_url: FIREBASE_CERTS_URL.to_owned(),
            cached_keys: Arc::new(RwLock::new(None)),
        }
    }

    /// Check if Firebase authentication is enabled and configured
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Validate a Firebase ID token
    ///
    /// # Errors
    ///
    /// Returns an authentication error if Firebase is not configured, the header
    /// has no known key id, or the signature, issuer, audience or expiry is wrong
    pub async fn validate_token(&self, token: &str) -> AppResult<FirebaseClaims> {
        let project_id = match (&self.config.project_id, self.config.enabled) {
            (Some(project_id), true) => project_id,
            _ => {
                warn!("Rejecting bearer token: Firebase authentication is not configured");
                return Err(AppError::auth_invalid(
                    "Firebase authentication is not configured",
                ));
            }
        };

        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode Firebase token header");
            AppError::auth_invalid("Invalid token format")
        })?;

        let kid = header
            .kid
            .ok_or_else(|| AppError::auth_invalid("Token missing key ID"))?;

        let pem_key = self.get_public_key(&kid).await?;
        let decoding_key = DecodingKey::from_rsa_pem(pem_key.as_bytes()).map_err(|e| {
            warn!(error = %e, kid = %kid, "Failed to create decoding key from PEM");
            AppError::internal(format!("Invalid public key: {e}"))
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[project_id]);
        validation.set_issuer(&[format!("{FIREBASE_ISSUER_PREFIX}{project_id}")]);

        let token_data =
            decode::<FirebaseClaims>(token, &decoding_key, &validation).map_err(|e| {
                debug!(error = %e, "Firebase token validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::auth_expired(),
                    ErrorKind::InvalidAudience => AppError::auth_invalid("Invalid token audience"),
                    ErrorKind::InvalidIssuer => AppError::auth_invalid("Invalid token issuer"),
                    _ => AppError::auth_invalid("Invalid token"),
                }
            })?;

        debug!(firebase_id = %token_data.claims.sub, "Firebase token validated");
        Ok(token_data.claims)
    }

    async fn get_public_key(&self, kid: &str) -> AppResult<String> {
        if let Some(key) = self.try_get_cached_key(kid).await {
            return Ok(key);
        }

        self.refresh_keys().await?;

        let cache = self.cached_keys.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| {
                debug!(kid = %kid, "Firebase public key not found for kid");
                AppError::auth_invalid("Unknown token signing key")
            })
    }

    async fn try_get_cached_key(&self, kid: &str) -> Option<String> {
        let cache = self.cached_keys.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.expires_at > Utc::now())
            .and_then(|cached| cached.keys.get(kid).cloned())
    }

    async fn refresh_keys(&self) -> AppResult<()> {
        info!("Fetching Firebase public keys from Google");

        let response = self
            .http_client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("Firebase", format!("Failed to fetch public keys: {e}"))
            })?;

        let default_ttl = i64::try_from(self.config.key_cache_ttl_secs).unwrap_or(i64::MAX);
        let cache_ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(default_ttl)
            .max(MIN_CACHE_TTL_SECS);

        let certs: HashMap<String, String> = response.json().await.map_err(|e| {
            AppError::external_service("Firebase", format!("Failed to parse public keys: {e}"))
        })?;

        let keys = convert_certs_to_keys(certs)?;
        let expires_at = Utc::now() + Duration::seconds(cache_ttl);
        info!(
            num_keys = keys.len(),
            cache_ttl_secs = cache_ttl,
            "Firebase public keys cached"
        );

        *self.cached_keys.write().await = Some(CachedKeys { keys, expires_at });
        Ok(())
    }
}

#[async_trait]
impl TokenVerifier for FirebaseAuth {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        self.validate_token(token).await.map(VerifiedIdentity::from)
    }
}

fn convert_certs_to_keys(certs: HashMap<String, String>) -> AppResult<HashMap<String, String>> {
    let mut keys = HashMap::with_capacity(certs.len());
    for (kid, cert_pem) in certs {
        match extract_public_key_from_cert(&cert_pem) {
            Ok(public_key_pem) => {
                keys.insert(kid, public_key_pem);
            }
            Err(e) => {
                warn!(kid = %kid, error = %e, "Failed to extract public key from certificate");
            }
        }
    }

    if keys.is_empty() {
        return Err(AppError::external_service(
            "Firebase",
            "No valid Firebase public keys found",
        ));
    }
    Ok(keys)
}

/// Parse `max-age` from a Cache-Control header ("public, max-age=3600, must-revalidate")
fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|s| s.strip_prefix("max-age="))
        .and_then(|s| s.parse().ok())
}

/// PEM-encode the SPKI public key of an X.509 certificate
fn extract_public_key_from_cert(cert_pem: &str) -> AppResult<String> {
    let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| AppError::internal(format!("Failed to parse X.509 PEM: {e}")))?;

    let (_, cert) = X509Certificate::from_der(&pem.contents)
        .map_err(|e| AppError::internal(format!("Failed to parse X.509 certificate: {e}")))?;

    let encoded = STANDARD.encode(cert.public_key().raw);
    let body = encoded
        .as_bytes()
        .chunks(64)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "-----BEGIN PUBLIC KEY-----\n{body}\n-----END PUBLIC KEY-----"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gofast_core::errors::ErrorCode;

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age("public, max-age=19845, must-revalidate"), Some(19845));
        assert_eq!(parse_max_age("no-cache"), None);
    }

    #[test]
    fn test_unparseable_certificates_rejected() {
        let certs = HashMap::from([("kid".to_owned(), "not a certificate".to_owned())]);
        assert!(convert_certs_to_keys(certs).is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_verifier_rejects_tokens() {
        let auth = FirebaseAuth::new(FirebaseConfig::default(), Client::new());
        assert!(!auth.is_enabled());
        let err = auth.verify("header.payload.signature").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }

    #[tokio::test]
    async fn test_garbage_token_rejected_before_key_fetch() {
        let config = FirebaseConfig {
            project_id: Some("gofast-test".to_owned()),
            enabled: true,
            key_cache_ttl_secs: 3600,
        };
        let auth = FirebaseAuth::new(config, Client::new());
        let err = auth.verify("not-a-jwt").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }
}

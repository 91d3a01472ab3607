// ABOUTME: Bearer credential verification and caller resolution
// ABOUTME: TokenVerifier trait, bearer header parsing, and the athlete lookup every route starts with
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! # Authentication
//!
//! Clients sign in with Firebase and send the resulting ID token as
//! `Authorization: Bearer <token>`. A [`TokenVerifier`] turns the token into a
//! [`VerifiedIdentity`]; [`authenticate`] then resolves the identity to an
//! athlete row.
//!
//! - missing or malformed header: 401
//! - token rejected by the verifier: 401
//! - valid token but no athlete row yet: 404 (clients call `POST /api/athletes` first)

/// Firebase ID token verification
pub mod firebase;

pub use firebase::FirebaseAuth;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use gofast_core::errors::{AppError, AppResult};
use gofast_core::models::Athlete;
use serde::{Deserialize, Serialize};

use crate::logging::AppLogger;
use crate::resources::ServerResources;

/// Identity proven by a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Identity provider user id (Firebase uid)
    pub firebase_id: String,
    /// Email address, when the provider shares it
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Profile picture URL
    pub picture: Option<String>,
}

/// Verifies opaque bearer tokens against an identity provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a token and return the identity it proves
    ///
    /// # Errors
    ///
    /// Returns an authentication error (401) if the token is not acceptable
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity>;
}

/// Extract the token from an `Authorization: Bearer` header
///
/// # Errors
///
/// Returns `AuthRequired` if the header is missing and `AuthInvalid` if it is malformed
pub fn extract_bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(AppError::auth_required)?
        .to_str()
        .map_err(|_| AppError::auth_invalid("Authorization header is not valid text"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AppError::auth_invalid("Expected 'Bearer <token>'"))?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AppError::auth_invalid("Expected 'Bearer <token>'"));
    }

    Ok(token.trim())
}

/// Verify the bearer token without requiring an athlete row
///
/// # Errors
///
/// Returns 401 if the header is missing or the token is rejected
pub async fn authenticate_identity(
    headers: &HeaderMap,
    resources: &ServerResources,
) -> AppResult<VerifiedIdentity> {
    let token = extract_bearer_token(headers)?;
    resources.verifier.verify(token).await.inspect_err(|e| {
        AppLogger::log_auth_event("unknown", "bearer_verification", false, Some(&e.message));
    })
}

/// Verify the bearer token and load the caller's athlete
///
/// # Errors
///
/// - 401 if the header is missing or the token is rejected
/// - 404 if the identity has no athlete row
pub async fn authenticate(headers: &HeaderMap, resources: &ServerResources) -> AppResult<Athlete> {
    let identity = authenticate_identity(headers, resources).await?;
    resources
        .database
        .athletes()
        .get_by_firebase_id(&identity.firebase_id)
        .await?
        .ok_or_else(|| AppError::not_found("Athlete"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use gofast_core::errors::ErrorCode;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(extract_bearer_token(&headers("bearer  xyz")).unwrap(), "xyz");
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()).unwrap_err().code,
            ErrorCode::AuthRequired
        );
        assert_eq!(
            extract_bearer_token(&headers("Basic dXNlcjpwYXNz")).unwrap_err().code,
            ErrorCode::AuthInvalid
        );
        assert_eq!(
            extract_bearer_token(&headers("Bearer")).unwrap_err().code,
            ErrorCode::AuthInvalid
        );
    }
}

// ABOUTME: Garmin Connect OAuth 2.0 PKCE client and Wellness API calls
// ABOUTME: PKCE generation, authorization URL, code exchange, token refresh, user id, and backfill requests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use gofast_core::constants::garmin;
use gofast_core::errors::{AppError, AppResult, ErrorCode};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::GarminConfig;

/// RFC 7636 unreserved characters
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// `PKCE` parameters for one authorization attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceParams {
    /// Random code verifier, kept server-side in a cookie
    pub code_verifier: String,
    /// base64url(SHA-256(verifier)), sent to Garmin
    pub code_challenge: String,
    /// Always `S256`
    pub code_challenge_method: String,
}

impl PkceParams {
    /// Generate `PKCE` parameters with `S256` challenge method
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code_verifier: String = (0..garmin::CODE_VERIFIER_LENGTH)
            .map(|_| VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())] as char)
            .collect();

        Self {
            code_challenge: code_challenge_for(&code_verifier),
            code_verifier,
            code_challenge_method: "S256".into(),
        }
    }
}

/// S256 code challenge for a verifier
#[must_use]
pub fn code_challenge_for(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Token pair returned by Garmin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GarminToken {
    /// Access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: Option<String>,
    /// Access token expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scope
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserIdResponse {
    #[serde(rename = "userId")]
    user_id: String,
}

/// Garmin Connect OAuth 2.0 client
pub struct GarminOAuthClient {
    config: GarminConfig,
    client: Client,
}

impl GarminOAuthClient {
    /// Create a client over a shared HTTP client
    #[must_use]
    pub const fn new(config: GarminConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// The configuration this client was built with
    #[must_use]
    pub const fn config(&self) -> &GarminConfig {
        &self.config
    }

    fn client_id(&self) -> AppResult<&str> {
        self.config
            .client_id
            .as_deref()
            .ok_or_else(|| AppError::config("GARMIN_CLIENT_ID is not set"))
    }

    fn client_secret(&self) -> AppResult<&str> {
        self.config
            .client_secret
            .as_deref()
            .ok_or_else(|| AppError::config("GARMIN_CLIENT_SECRET is not set"))
    }

    fn redirect_uri(&self) -> AppResult<&str> {
        self.config
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AppError::config("GARMIN_REDIRECT_URI is not set"))
    }

    /// Build the Garmin consent URL for `state` and the PKCE challenge
    ///
    /// # Errors
    ///
    /// Returns a configuration error if client credentials or URLs are missing or invalid
    pub fn authorization_url(&self, state: &str, pkce: &PkceParams) -> AppResult<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AppError::config(format!("Invalid GARMIN_AUTH_URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.client_id()?)
            .append_pair("redirect_uri", self.redirect_uri()?)
            .append_pair("state", state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", &pkce.code_challenge_method);

        Ok(url.into())
    }

    /// Exchange an authorization code and PKCE verifier for tokens (single POST, no retry)
    ///
    /// # Errors
    ///
    /// Returns `ExternalAuthFailed` if Garmin rejects the exchange
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<GarminToken> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id()?),
            ("client_secret", self.client_secret()?),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", self.redirect_uri()?),
        ];

        debug!("Exchanging Garmin authorization code");
        self.request_token(&params).await
    }

    /// Trade a refresh token for a new token pair
    ///
    /// # Errors
    ///
    /// Returns `ExternalAuthFailed` if Garmin rejects the refresh token
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<GarminToken> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id()?),
            ("client_secret", self.client_secret()?),
            ("refresh_token", refresh_token),
        ];

        info!("Refreshing Garmin access token");
        self.request_token(&params).await
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> AppResult<GarminToken> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::external_service("Garmin", format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Garmin token endpoint rejected request");
            return Err(AppError::new(
                ErrorCode::ExternalAuthFailed,
                format!("Garmin token endpoint returned {status}"),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::external_service("Garmin", format!("Invalid token response: {e}"))
        })?;

        Ok(token_from_response(token, Utc::now()))
    }

    /// Fetch the Garmin user id the access token belongs to
    ///
    /// # Errors
    ///
    /// Returns an external service error on transport or HTTP failure
    pub async fn fetch_user_id(&self, access_token: &str) -> AppResult<String> {
        let url = self.api_url(garmin::USER_ID_PATH);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::external_service("Garmin", format!("User id request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::external_service(
                "Garmin",
                format!("User id request returned {}", response.status()),
            ));
        }

        let body: UserIdResponse = response.json().await.map_err(|e| {
            AppError::external_service("Garmin", format!("Invalid user id response: {e}"))
        })?;
        Ok(body.user_id)
    }

    /// Ask Garmin to push activity summaries for `[start, end)` to the webhook
    ///
    /// # Errors
    ///
    /// - `ExternalAuthFailed` if the token is rejected
    /// - `ExternalServiceError` for any other failure (409 means a duplicate request)
    pub async fn request_backfill(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<()> {
        let url = self.api_url(garmin::BACKFILL_ACTIVITIES_PATH);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("summaryStartTimeInSeconds", start.timestamp()),
                ("summaryEndTimeInSeconds", end.timestamp()),
            ])
            .send()
            .await
            .map_err(|e| AppError::external_service("Garmin", format!("Backfill request failed: {e}")))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::new(
                ErrorCode::ExternalAuthFailed,
                "Garmin rejected the access token; reconnect Garmin",
            )),
            StatusCode::CONFLICT => Err(AppError::external_service(
                "Garmin",
                "A backfill for this period was already requested",
            )),
            status => Err(AppError::external_service(
                "Garmin",
                format!("Backfill request returned {status}"),
            )),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base_url.trim_end_matches('/'))
    }
}

fn token_from_response(response: TokenResponse, now: DateTime<Utc>) -> GarminToken {
    let expires_in = response
        .expires_in
        .unwrap_or(garmin::DEFAULT_TOKEN_EXPIRY_SECS);

    GarminToken {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        expires_at: Some(now + Duration::seconds(expires_in)),
        scope: response.scope,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> GarminOAuthClient {
        GarminOAuthClient::new(
            GarminConfig {
                client_id: Some("client-123".to_owned()),
                client_secret: Some("secret".to_owned()),
                redirect_uri: Some("https://api.gofast.run/api/garmin/callback".to_owned()),
                ..GarminConfig::default()
            },
            Client::new(),
        )
    }

    #[test]
    fn test_pkce_verifier_shape() {
        let pkce = PkceParams::generate();
        assert_eq!(pkce.code_verifier.len(), garmin::CODE_VERIFIER_LENGTH);
        assert!(pkce
            .code_verifier
            .bytes()
            .all(|b| VERIFIER_CHARSET.contains(&b)));
        assert_eq!(pkce.code_challenge_method, "S256");
        assert_eq!(pkce.code_challenge, code_challenge_for(&pkce.code_verifier));
    }

    #[test]
    fn test_challenge_matches_rfc7636_example() {
        // Appendix B of RFC 7636
        assert_eq!(
            code_challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_authorization_url() {
        let pkce = PkceParams::generate();
        let url = Url::parse(&configured().authorization_url("athlete-1", &pkce).unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with(garmin::AUTH_URL));
        assert!(pairs.contains(&("state".to_owned(), "athlete-1".to_owned())));
        assert!(pairs.contains(&("client_id".to_owned(), "client-123".to_owned())));
        assert!(pairs.contains(&("code_challenge".to_owned(), pkce.code_challenge.clone())));
        assert!(pairs.contains(&("code_challenge_method".to_owned(), "S256".to_owned())));
    }

    #[test]
    fn test_authorization_url_requires_credentials() {
        let client = GarminOAuthClient::new(GarminConfig::default(), Client::new());
        let err = client
            .authorization_url("state", &PkceParams::generate())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[test]
    fn test_token_expiry_defaults() {
        let now = Utc::now();
        let token = token_from_response(
            TokenResponse {
                access_token: "a".to_owned(),
                expires_in: None,
                refresh_token: None,
                scope: None,
            },
            now,
        );
        assert_eq!(
            token.expires_at,
            Some(now + Duration::seconds(garmin::DEFAULT_TOKEN_EXPIRY_SECS))
        );
    }
}

// ABOUTME: Garmin route handlers for OAuth PKCE, connection status, backfill, and the push webhook
// ABOUTME: The callback answers with a popup page that posts the result to the opener window
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! Garmin routes
//!
//! Connecting is a popup flow:
//!
//! 1. the app calls `GET /api/garmin/authorize` with its bearer token and opens
//!    the returned `auth_url` in a popup; the PKCE verifier rides along in a
//!    cookie keyed by the athlete id, which is also the OAuth `state`;
//! 2. Garmin redirects the popup to `GET /api/garmin/callback`, which trades
//!    the code for tokens and renders a page that `postMessage`s the outcome.
//!
//! The webhook acknowledges immediately and processes the delivery on a
//! detached task.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use gofast_core::constants::garmin::{MAX_BACKFILL_DAYS, WEBHOOK_MAX_BODY_BYTES};
use gofast_core::errors::{AppError, AppResult, ErrorCode};
use gofast_core::models::GarminConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::authenticate;
use crate::garmin::{ensure_fresh_connection, PkceParams, WebhookDispatcher};
use crate::logging::AppLogger;
use crate::resources::ServerResources;
use crate::security::cookies::{clear_pkce_cookie, get_cookie_value, pkce_cookie, pkce_cookie_name};

// ============================================================================
// Request / Response Types
// ============================================================================

/// Consent URL for the popup
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    /// Garmin consent page
    pub auth_url: String,
}

/// Garmin redirect parameters
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code
    pub code: Option<String>,
    /// Athlete id sent as OAuth state
    pub state: Option<String>,
    /// Error code when the athlete declined
    pub error: Option<String>,
}

/// Connection summary; never includes tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct GarminStatusResponse {
    /// Whether a connection is stored
    pub connected: bool,
    /// Garmin user id
    pub garmin_user_id: Option<String>,
    /// Granted scope
    pub scope: Option<String>,
    /// Permissions reported by Garmin
    pub permissions: Vec<String>,
    /// Access token expiry
    pub expires_at: Option<String>,
    /// First connection time
    pub connected_at: Option<String>,
    /// Last token update
    pub updated_at: Option<String>,
}

impl GarminStatusResponse {
    /// Summarize an optional connection
    #[must_use]
    pub fn from_connection(connection: Option<&GarminConnection>) -> Self {
        connection.map_or_else(
            || Self {
                connected: false,
                garmin_user_id: None,
                scope: None,
                permissions: Vec::new(),
                expires_at: None,
                connected_at: None,
                updated_at: None,
            },
            |c| Self {
                connected: true,
                garmin_user_id: c.garmin_user_id.clone(),
                scope: c.scope.clone(),
                permissions: c.permissions.clone(),
                expires_at: c.expires_at.map(|t| t.to_rfc3339()),
                connected_at: Some(c.connected_at.to_rfc3339()),
                updated_at: Some(c.updated_at.to_rfc3339()),
            },
        )
    }
}

/// Backfill request
#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    /// Days of history, 1 to 30
    pub days: i64,
}

/// Accepted backfill window
#[derive(Debug, Serialize, Deserialize)]
pub struct BackfillResponse {
    /// Always `accepted`; data arrives through the webhook
    pub status: String,
    /// Window start
    pub start: String,
    /// Window end
    pub end: String,
}

// ============================================================================
// Routes
// ============================================================================

/// Garmin routes implementation
pub struct GarminRoutes;

impl GarminRoutes {
    /// Create all Garmin routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/garmin/authorize", get(Self::handle_authorize))
            .route("/api/garmin/callback", get(Self::handle_callback))
            .route(
                "/api/garmin/webhook",
                post(Self::handle_webhook).layer(DefaultBodyLimit::max(WEBHOOK_MAX_BODY_BYTES)),
            )
            .route("/api/garmin/status", get(Self::handle_status))
            .route("/api/garmin/connection", delete(Self::handle_disconnect))
            .route("/api/garmin/backfill", post(Self::handle_backfill))
            .with_state(resources)
    }

    /// Handle GET /api/garmin/authorize - start the PKCE flow
    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let state = athlete.id.to_string();

        let pkce = PkceParams::generate();
        let auth_url = resources.garmin.authorization_url(&state, &pkce)?;
        let cookie = pkce_cookie(
            &state,
            &pkce.code_verifier,
            resources.config.environment.is_production(),
        )?;

        AppLogger::log_oauth_event(&state, "garmin_authorize", true);

        Ok((
            StatusCode::OK,
            [(header::SET_COOKIE, cookie)],
            Json(AuthorizeResponse { auth_url }),
        )
            .into_response())
    }

    /// Handle GET /api/garmin/callback - finish the PKCE flow inside the popup
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<CallbackQuery>,
    ) -> Response {
        let secure = resources.config.environment.is_production();
        let target_origin = resources.config.frontend_url.as_str();

        let result = Self::complete_connection(&resources, &headers, &query).await;
        let state = query.state.as_deref().unwrap_or("unknown");

        let mut response = match result {
            Ok(connection) => {
                info!(athlete_id = %connection.athlete_id, "Garmin connected");
                AppLogger::log_oauth_event(state, "garmin_callback", true);
                (
                    StatusCode::OK,
                    Html(render_callback_page(
                        true,
                        "Your Garmin account is connected.",
                        target_origin,
                    )),
                )
                    .into_response()
            }
            Err(e) => {
                if e.http_status() >= 500 {
                    error!(error = %e, state = %state, "Garmin callback failed");
                } else {
                    warn!(error = %e, state = %state, "Garmin callback rejected");
                }
                AppLogger::log_oauth_event(state, "garmin_callback", false);
                let status =
                    StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
                (
                    status,
                    Html(render_callback_page(false, &e.message, target_origin)),
                )
                    .into_response()
            }
        };

        if let Some(state) = query.state.as_deref() {
            if let Ok(cookie) = clear_pkce_cookie(state, secure) {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
        }
        response
    }

    async fn complete_connection(
        resources: &ServerResources,
        headers: &HeaderMap,
        query: &CallbackQuery,
    ) -> AppResult<GarminConnection> {
        if let Some(denied) = query.error.as_deref() {
            return Err(AppError::new(
                ErrorCode::ExternalAuthFailed,
                format!("Garmin authorization was not granted ({denied})"),
            ));
        }
        let state = query
            .state
            .as_deref()
            .ok_or_else(|| AppError::invalid_input("Missing state parameter"))?;
        let code = query
            .code
            .as_deref()
            .ok_or_else(|| AppError::invalid_input("Missing authorization code"))?;
        let athlete_id = Uuid::parse_str(state)
            .map_err(|_| AppError::invalid_input("Invalid state parameter"))?;

        let code_verifier = get_cookie_value(headers, &pkce_cookie_name(state)).ok_or_else(|| {
            AppError::invalid_input("Garmin authorization expired; start the connection again")
        })?;

        resources
            .database
            .athletes()
            .get(athlete_id)
            .await?
            .ok_or_else(|| AppError::not_found("Athlete"))?;

        let token = resources.garmin.exchange_code(code, &code_verifier).await?;

        let garmin_user_id = match resources.garmin.fetch_user_id(&token.access_token).await {
            Ok(user_id) => Some(user_id),
            Err(e) => {
                warn!(athlete_id = %athlete_id, error = %e, "Could not fetch Garmin user id");
                None
            }
        };

        let now = Utc::now();
        let connection = GarminConnection {
            athlete_id,
            garmin_user_id,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_at,
            scope: token.scope,
            permissions: Vec::new(),
            connected_at: now,
            updated_at: now,
        };
        resources
            .database
            .garmin()
            .upsert_connection(&connection)
            .await?;

        Ok(connection)
    }

    /// Handle POST /api/garmin/webhook - acknowledge, then process in the background
    async fn handle_webhook(
        State(resources): State<Arc<ServerResources>>,
        body: Bytes,
    ) -> StatusCode {
        let database = resources.database.clone();
        tokio::spawn(async move {
            let mut dispatcher = WebhookDispatcher::new(database);
            dispatcher.dispatch_bytes(&body).await;
        });
        StatusCode::OK
    }

    /// Handle GET /api/garmin/status
    async fn handle_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;
        let connection = resources.database.garmin().get_connection(athlete.id).await?;

        let response = GarminStatusResponse::from_connection(connection.as_ref());
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle DELETE /api/garmin/connection
    async fn handle_disconnect(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;

        if !resources.database.garmin().delete_connection(athlete.id).await? {
            return Err(AppError::not_found("Garmin connection"));
        }
        AppLogger::log_oauth_event(&athlete.id.to_string(), "garmin_disconnect", true);

        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Handle POST /api/garmin/backfill - ask Garmin to push past activities
    async fn handle_backfill(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<BackfillRequest>,
    ) -> Result<Response, AppError> {
        let athlete = authenticate(&headers, &resources).await?;

        if !(1..=MAX_BACKFILL_DAYS).contains(&body.days) {
            return Err(AppError::invalid_input(format!(
                "days must be between 1 and {MAX_BACKFILL_DAYS}"
            )));
        }

        let connection =
            ensure_fresh_connection(&resources.database, &resources.garmin, athlete.id).await?;

        let end = Utc::now();
        let start = end - Duration::days(body.days);
        resources
            .garmin
            .request_backfill(&connection.access_token, start, end)
            .await?;

        info!(athlete_id = %athlete.id, days = body.days, "Garmin backfill requested");

        let response = BackfillResponse {
            status: "accepted".to_owned(),
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        };
        Ok((StatusCode::ACCEPTED, Json(response)).into_response())
    }
}

/// JSON literal safe to embed inside a `<script>` block
fn script_literal(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Render the popup page that reports the outcome to the opener window
fn render_callback_page(success: bool, message: &str, target_origin: &str) -> String {
    const TEMPLATE: &str = include_str!("../../templates/garmin_callback.html");

    let payload = json!({
        "type": "garmin_oauth",
        "success": success,
        "message": message,
    });
    let (status, title) = if success {
        ("success", "Connected")
    } else {
        ("error", "Connection Failed")
    };

    TEMPLATE
        .replace("{{STATUS}}", status)
        .replace("{{TITLE}}", title)
        .replace("{{MESSAGE}}", &html_escape::encode_text(message))
        .replace("{{PAYLOAD}}", &script_literal(&payload))
        .replace(
            "{{TARGET_ORIGIN}}",
            &script_literal(&serde_json::Value::String(target_origin.to_owned())),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_page_escapes_message() {
        let page = render_callback_page(
            false,
            "<script>alert('x')</script>",
            "https://app.gofast.run",
        );
        assert!(page.contains("&lt;script&gt;alert('x')&lt;/script&gt;"));
        assert!(!page.contains("<script>alert"));
        assert!(page.contains(r#""success":false"#));
        assert!(page.contains(r#""https://app.gofast.run""#));
    }

    #[test]
    fn test_callback_page_success() {
        let page = render_callback_page(true, "Connected", "http://localhost:3000");
        assert!(page.contains("Garmin Connected"));
        assert!(page.contains(r#""type":"garmin_oauth""#));
    }

    #[test]
    fn test_status_without_connection() {
        let status = GarminStatusResponse::from_connection(None);
        assert!(!status.connected);
        assert!(status.permissions.is_empty());
    }
}

// ABOUTME: Lazy Garmin token refresh performed right before outbound API calls
// ABOUTME: Refreshes tokens inside the expiry buffer and persists the new pair
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::{Duration, Utc};
use gofast_core::constants::garmin;
use gofast_core::errors::{AppError, AppResult, ErrorCode};
use gofast_core::models::GarminConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::oauth::{GarminOAuthClient, GarminToken};
use crate::database::Database;
use crate::logging::AppLogger;

/// Merge a refreshed token pair into a stored connection
#[must_use]
pub fn apply_token(mut connection: GarminConnection, token: GarminToken) -> GarminConnection {
    connection.access_token = token.access_token;
    if token.refresh_token.is_some() {
        connection.refresh_token = token.refresh_token;
    }
    if token.scope.is_some() {
        connection.scope = token.scope;
    }
    connection.expires_at = token.expires_at;
    connection.updated_at = Utc::now();
    connection
}

/// Load the athlete's connection, refreshing the access token if it is close to expiry
///
/// # Errors
///
/// - 404 if the athlete has no Garmin connection
/// - `ExternalAuthFailed` if the token expired and cannot be refreshed
pub async fn ensure_fresh_connection(
    database: &Database,
    client: &GarminOAuthClient,
    athlete_id: Uuid,
) -> AppResult<GarminConnection> {
    let connection = database
        .garmin()
        .get_connection(athlete_id)
        .await?
        .ok_or_else(|| AppError::not_found("Garmin connection"))?;

    let now = Utc::now();
    if !connection.needs_refresh(now, Duration::seconds(garmin::TOKEN_REFRESH_BUFFER_SECS)) {
        return Ok(connection);
    }

    let Some(refresh_token) = connection.refresh_token.clone() else {
        if connection.expires_at.is_some_and(|expires_at| expires_at <= now) {
            warn!(athlete_id = %athlete_id, "Garmin token expired with no refresh token");
            return Err(AppError::new(
                ErrorCode::ExternalAuthFailed,
                "Garmin token expired; reconnect Garmin",
            ));
        }
        return Ok(connection);
    };

    let token = client.refresh_token(&refresh_token).await.inspect_err(|_| {
        AppLogger::log_oauth_event(&athlete_id.to_string(), "garmin_token_refresh", false);
    })?;

    let refreshed = apply_token(connection, token);
    database.garmin().upsert_connection(&refreshed).await?;

    info!(athlete_id = %athlete_id, "Garmin token refreshed");
    AppLogger::log_oauth_event(&athlete_id.to_string(), "garmin_token_refresh", true);
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> GarminConnection {
        GarminConnection {
            athlete_id: Uuid::new_v4(),
            garmin_user_id: Some("garmin-1".to_owned()),
            access_token: "old-access".to_owned(),
            refresh_token: Some("old-refresh".to_owned()),
            expires_at: Some(Utc::now()),
            scope: Some("ACTIVITY_EXPORT".to_owned()),
            permissions: Vec::new(),
            connected_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_token_keeps_missing_fields() {
        let expires_at = Utc::now() + Duration::hours(24);
        let updated = apply_token(
            connection(),
            GarminToken {
                access_token: "new-access".to_owned(),
                refresh_token: None,
                expires_at: Some(expires_at),
                scope: None,
            },
        );

        assert_eq!(updated.access_token, "new-access");
        assert_eq!(updated.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(updated.scope.as_deref(), Some("ACTIVITY_EXPORT"));
        assert_eq!(updated.expires_at, Some(expires_at));
    }

    #[test]
    fn test_apply_token_rotates_refresh_token() {
        let updated = apply_token(
            connection(),
            GarminToken {
                access_token: "new-access".to_owned(),
                refresh_token: Some("new-refresh".to_owned()),
                expires_at: None,
                scope: None,
            },
        );
        assert_eq!(updated.refresh_token.as_deref(), Some("new-refresh"));
    }
}

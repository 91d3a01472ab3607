// ABOUTME: Garmin device integration models for stored tokens and synced activities
// ABOUTME: GarminConnection with lazy refresh check, and GarminActivity summaries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An athlete's Garmin connection: token pair, expiry, and granted scope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GarminConnection {
    /// Owning athlete (at most one connection per athlete)
    pub athlete_id: Uuid,
    /// Garmin's user id, used to route webhook deliveries
    pub garmin_user_id: Option<String>,
    /// OAuth access token
    pub access_token: String,
    /// OAuth refresh token
    pub refresh_token: Option<String>,
    /// Access token expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted OAuth scope
    pub scope: Option<String>,
    /// Permissions reported by Garmin's permission-change webhook
    pub permissions: Vec<String>,
    /// When the connection was first made
    pub connected_at: DateTime<Utc>,
    /// When the connection was last updated
    pub updated_at: DateTime<Utc>,
}

impl GarminConnection {
    /// Whether the access token expires within `buffer` of `now`
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now + buffer)
    }
}

/// Activity summary synced from Garmin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GarminActivity {
    /// Unique identifier
    pub id: Uuid,
    /// Owning athlete
    pub athlete_id: Uuid,
    /// Garmin's activity id (unique)
    pub source_activity_id: String,
    /// Garmin's summary id
    pub summary_id: Option<String>,
    /// Activity name
    pub activity_name: Option<String>,
    /// Garmin activity type (`RUNNING`, `TRAIL_RUNNING`, ...)
    pub activity_type: Option<String>,
    /// Start time
    pub start_time: Option<DateTime<Utc>>,
    /// Elapsed duration
    pub duration_seconds: Option<i64>,
    /// Distance covered
    pub distance_meters: Option<f64>,
    /// Average heart rate
    pub average_heart_rate: Option<i64>,
    /// Active calories
    pub calories: Option<i64>,
    /// Detailed samples from the activity-details webhook
    pub detail: Option<serde_json::Value>,
    /// Whether Garmin reported a manual edit
    pub manually_updated: bool,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(expires_at: Option<DateTime<Utc>>) -> GarminConnection {
        GarminConnection {
            athlete_id: Uuid::new_v4(),
            garmin_user_id: None,
            access_token: "token".to_owned(),
            refresh_token: Some("refresh".to_owned()),
            expires_at,
            scope: None,
            permissions: Vec::new(),
            connected_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_needs_refresh_inside_buffer() {
        let now = Utc::now();
        let buffer = Duration::minutes(10);
        assert!(connection(Some(now + Duration::minutes(5))).needs_refresh(now, buffer));
        assert!(connection(Some(now - Duration::minutes(1))).needs_refresh(now, buffer));
        assert!(!connection(Some(now + Duration::hours(2))).needs_refresh(now, buffer));
        assert!(!connection(None).needs_refresh(now, buffer));
    }
}

// ABOUTME: Garmin push webhook payload parsing and event dispatch
// ABOUTME: Detects the event from the top-level key and upserts activities, permissions, or deregistrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! # Garmin webhook
//!
//! Garmin pushes one JSON object per delivery whose single top-level key names
//! the event (`activities`, `activityDetails`, ...) and holds a list of entries.
//! Every entry carries the Garmin `userId`, which is mapped back to an athlete
//! through the stored connection. Entries for unknown users are skipped.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use gofast_core::models::GarminActivity;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::logging::AppLogger;

/// Webhook event types, keyed by the payload's top-level field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GarminEvent {
    /// Activity summaries
    Activities,
    /// Activity summaries with samples and laps
    ActivityDetails,
    /// Activities the athlete edited in Garmin Connect
    ManuallyUpdatedActivities,
    /// The athlete disconnected GoFast from Garmin
    Deregistrations,
    /// The athlete changed the data they share
    UserPermissionsChange,
}

impl GarminEvent {
    const ALL: [Self; 5] = [
        Self::Activities,
        Self::ActivityDetails,
        Self::ManuallyUpdatedActivities,
        Self::Deregistrations,
        Self::UserPermissionsChange,
    ];

    /// Top-level payload key for this event
    #[must_use]
    pub const fn payload_key(self) -> &'static str {
        match self {
            Self::Activities => "activities",
            Self::ActivityDetails => "activityDetails",
            Self::ManuallyUpdatedActivities => "manuallyUpdatedActivities",
            Self::Deregistrations => "deregistrations",
            Self::UserPermissionsChange => "userPermissionsChange",
        }
    }

    /// Infer the event from the payload's top-level keys
    #[must_use]
    pub fn detect(payload: &Value) -> Option<Self> {
        let object = payload.as_object()?;
        Self::ALL
            .into_iter()
            .find(|event| object.contains_key(event.payload_key()))
    }
}

impl fmt::Display for GarminEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.payload_key())
    }
}

/// Garmin sends activity ids as numbers in summaries and strings elsewhere
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ActivityId {
    /// Numeric id
    Number(i64),
    /// String id
    Text(String),
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Activity summary fields shared by all activity events
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFields {
    /// Garmin summary id
    pub summary_id: Option<String>,
    /// Garmin activity id
    pub activity_id: Option<ActivityId>,
    /// Activity name
    pub activity_name: Option<String>,
    /// Activity type (`RUNNING`, ...)
    pub activity_type: Option<String>,
    /// Start time, Unix seconds
    pub start_time_in_seconds: Option<i64>,
    /// Elapsed duration
    pub duration_in_seconds: Option<i64>,
    /// Distance covered
    pub distance_in_meters: Option<f64>,
    /// Average heart rate
    pub average_heart_rate_in_beats_per_minute: Option<f64>,
    /// Active calories
    pub active_kilocalories: Option<f64>,
}

impl ActivityFields {
    fn source_activity_id(&self) -> Option<String> {
        self.activity_id
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| self.summary_id.clone())
    }

    fn fill_missing(&mut self, other: Self) {
        self.summary_id = self.summary_id.take().or(other.summary_id);
        self.activity_id = self.activity_id.take().or(other.activity_id);
        self.activity_name = self.activity_name.take().or(other.activity_name);
        self.activity_type = self.activity_type.take().or(other.activity_type);
        self.start_time_in_seconds = self.start_time_in_seconds.or(other.start_time_in_seconds);
        self.duration_in_seconds = self.duration_in_seconds.or(other.duration_in_seconds);
        self.distance_in_meters = self.distance_in_meters.or(other.distance_in_meters);
        self.average_heart_rate_in_beats_per_minute = self
            .average_heart_rate_in_beats_per_minute
            .or(other.average_heart_rate_in_beats_per_minute);
        self.active_kilocalories = self.active_kilocalories.or(other.active_kilocalories);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityEntry {
    user_id: String,
    #[serde(flatten)]
    fields: ActivityFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityDetailEntry {
    user_id: String,
    summary_id: Option<String>,
    activity_id: Option<ActivityId>,
    #[serde(default)]
    summary: ActivityFields,
    samples: Option<Value>,
    laps: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeregistrationEntry {
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionChangeEntry {
    user_id: String,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Result of processing one webhook delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookOutcome {
    /// Detected event
    pub event: GarminEvent,
    /// Entries applied
    pub processed: usize,
    /// Entries dropped (unknown user, unparseable, or failed write)
    pub skipped: usize,
}

impl WebhookOutcome {
    const fn new(event: GarminEvent) -> Self {
        Self {
            event,
            processed: 0,
            skipped: 0,
        }
    }

    fn record(&mut self, applied: bool) {
        if applied {
            self.processed += 1;
        } else {
            self.skipped += 1;
        }
    }
}

/// Applies webhook deliveries to the database
pub struct WebhookDispatcher {
    database: Database,
    athletes_by_user: HashMap<String, Option<Uuid>>,
}

impl WebhookDispatcher {
    /// Create a dispatcher over the shared database
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            database,
            athletes_by_user: HashMap::new(),
        }
    }

    /// Parse and apply a raw delivery body; `None` if the payload is not recognised
    pub async fn dispatch_bytes(&mut self, body: &[u8]) -> Option<WebhookOutcome> {
        match serde_json::from_slice::<Value>(body) {
            Ok(payload) => self.dispatch(&payload).await,
            Err(e) => {
                warn!(error = %e, "Dropping Garmin webhook with invalid JSON");
                None
            }
        }
    }

    /// Apply a parsed delivery; `None` if the payload is not recognised
    pub async fn dispatch(&mut self, payload: &Value) -> Option<WebhookOutcome> {
        let Some(event) = GarminEvent::detect(payload) else {
            let keys: Vec<&String> = payload
                .as_object()
                .map(|o| o.keys().collect())
                .unwrap_or_default();
            warn!(keys = ?keys, "Dropping Garmin webhook with unknown payload");
            return None;
        };

        let entries = payload
            .get(event.payload_key())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut outcome = WebhookOutcome::new(event);
        for entry in entries {
            let applied = match event {
                GarminEvent::Activities => self.apply_activity(entry, false).await,
                GarminEvent::ManuallyUpdatedActivities => self.apply_activity(entry, true).await,
                GarminEvent::ActivityDetails => self.apply_activity_detail(entry).await,
                GarminEvent::Deregistrations => self.apply_deregistration(entry).await,
                GarminEvent::UserPermissionsChange => self.apply_permissions(entry).await,
            };
            outcome.record(applied);
        }

        AppLogger::log_webhook_event(event.payload_key(), outcome.processed, outcome.skipped);
        Some(outcome)
    }

    async fn apply_activity(&mut self, entry: &Value, manually_updated: bool) -> bool {
        let Some(entry) = parse_entry::<ActivityEntry>(entry) else {
            return false;
        };
        let Some(athlete_id) = self.resolve_athlete(&entry.user_id).await else {
            return false;
        };
        let Some(activity) = build_activity(athlete_id, entry.fields, None, manually_updated)
        else {
            warn!(user_id = %entry.user_id, "Skipping Garmin activity without an id");
            return false;
        };
        self.store_activity(&activity).await
    }

    async fn apply_activity_detail(&mut self, entry: &Value) -> bool {
        let Some(entry) = parse_entry::<ActivityDetailEntry>(entry) else {
            return false;
        };
        let Some(athlete_id) = self.resolve_athlete(&entry.user_id).await else {
            return false;
        };

        let mut fields = entry.summary;
        fields.fill_missing(ActivityFields {
            summary_id: entry.summary_id,
            activity_id: entry.activity_id,
            ..ActivityFields::default()
        });
        let detail = serde_json::json!({
            "samples": entry.samples.unwrap_or(Value::Array(Vec::new())),
            "laps": entry.laps.unwrap_or(Value::Array(Vec::new())),
        });

        let Some(activity) = build_activity(athlete_id, fields, Some(detail), false) else {
            warn!(user_id = %entry.user_id, "Skipping Garmin activity detail without an id");
            return false;
        };
        self.store_activity(&activity).await
    }

    async fn apply_deregistration(&mut self, entry: &Value) -> bool {
        let Some(entry) = parse_entry::<DeregistrationEntry>(entry) else {
            return false;
        };
        let Some(athlete_id) = self.resolve_athlete(&entry.user_id).await else {
            return false;
        };

        match self.database.garmin().delete_connection(athlete_id).await {
            Ok(deleted) => {
                self.athletes_by_user.insert(entry.user_id, None);
                AppLogger::log_oauth_event(&athlete_id.to_string(), "garmin_deregistration", deleted);
                deleted
            }
            Err(e) => {
                warn!(athlete_id = %athlete_id, error = %e, "Failed to delete Garmin connection");
                false
            }
        }
    }

    async fn apply_permissions(&mut self, entry: &Value) -> bool {
        let Some(entry) = parse_entry::<PermissionChangeEntry>(entry) else {
            return false;
        };
        let Some(athlete_id) = self.resolve_athlete(&entry.user_id).await else {
            return false;
        };

        match self
            .database
            .garmin()
            .update_permissions(athlete_id, &entry.permissions)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(athlete_id = %athlete_id, error = %e, "Failed to update Garmin permissions");
                false
            }
        }
    }

    async fn store_activity(&self, activity: &GarminActivity) -> bool {
        match self.database.garmin().upsert_activity(activity).await {
            Ok(inserted) => {
                debug!(
                    source_activity_id = %activity.source_activity_id,
                    inserted,
                    "Garmin activity stored"
                );
                true
            }
            Err(e) => {
                warn!(
                    source_activity_id = %activity.source_activity_id,
                    error = %e,
                    "Failed to store Garmin activity"
                );
                false
            }
        }
    }

    async fn resolve_athlete(&mut self, garmin_user_id: &str) -> Option<Uuid> {
        if let Some(cached) = self.athletes_by_user.get(garmin_user_id) {
            return *cached;
        }

        let athlete_id = match self
            .database
            .garmin()
            .get_connection_by_garmin_user(garmin_user_id)
            .await
        {
            Ok(connection) => connection.map(|c| c.athlete_id),
            Err(e) => {
                warn!(user_id = %garmin_user_id, error = %e, "Garmin user lookup failed");
                return None;
            }
        };

        if athlete_id.is_none() {
            warn!(user_id = %garmin_user_id, "Skipping webhook entry for unknown Garmin user");
        }
        self.athletes_by_user
            .insert(garmin_user_id.to_owned(), athlete_id);
        athlete_id
    }
}

fn parse_entry<T: DeserializeOwned>(entry: &Value) -> Option<T> {
    serde_json::from_value(entry.clone())
        .inspect_err(|e| warn!(error = %e, "Skipping malformed Garmin webhook entry"))
        .ok()
}

fn build_activity(
    athlete_id: Uuid,
    fields: ActivityFields,
    detail: Option<Value>,
    manually_updated: bool,
) -> Option<GarminActivity> {
    let source_activity_id = fields.source_activity_id()?;
    let now = Utc::now();

    Some(GarminActivity {
        id: Uuid::new_v4(),
        athlete_id,
        source_activity_id,
        summary_id: fields.summary_id,
        activity_name: fields.activity_name,
        activity_type: fields.activity_type,
        start_time: fields
            .start_time_in_seconds
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        duration_seconds: fields.duration_in_seconds,
        distance_meters: fields.distance_in_meters,
        average_heart_rate: fields
            .average_heart_rate_in_beats_per_minute
            .map(|bpm| bpm.round() as i64),
        calories: fields.active_kilocalories.map(|kcal| kcal.round() as i64),
        detail,
        manually_updated,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_event_from_top_level_key() {
        assert_eq!(
            GarminEvent::detect(&json!({ "activities": [] })),
            Some(GarminEvent::Activities)
        );
        assert_eq!(
            GarminEvent::detect(&json!({ "activityDetails": [] })),
            Some(GarminEvent::ActivityDetails)
        );
        assert_eq!(
            GarminEvent::detect(&json!({ "manuallyUpdatedActivities": [] })),
            Some(GarminEvent::ManuallyUpdatedActivities)
        );
        assert_eq!(
            GarminEvent::detect(&json!({ "deregistrations": [] })),
            Some(GarminEvent::Deregistrations)
        );
        assert_eq!(
            GarminEvent::detect(&json!({ "userPermissionsChange": [] })),
            Some(GarminEvent::UserPermissionsChange)
        );
        assert_eq!(GarminEvent::detect(&json!({ "dailies": [] })), None);
        assert_eq!(GarminEvent::detect(&json!([1, 2])), None);
    }

    #[test]
    fn test_activity_entry_parsing() {
        let entry: ActivityEntry = serde_json::from_value(json!({
            "userId": "garmin-user",
            "userAccessToken": "ignored",
            "summaryId": "9001",
            "activityId": 9001,
            "activityName": "Morning Run",
            "activityType": "RUNNING",
            "startTimeInSeconds": 1_700_000_000,
            "durationInSeconds": 1800,
            "distanceInMeters": 5012.4,
            "averageHeartRateInBeatsPerMinute": 151,
            "activeKilocalories": 402.6
        }))
        .unwrap();

        let activity = build_activity(Uuid::new_v4(), entry.fields, None, false).unwrap();
        assert_eq!(activity.source_activity_id, "9001");
        assert_eq!(activity.activity_type.as_deref(), Some("RUNNING"));
        assert_eq!(activity.duration_seconds, Some(1800));
        assert_eq!(activity.average_heart_rate, Some(151));
        assert_eq!(activity.calories, Some(403));
        assert_eq!(
            activity.start_time,
            DateTime::from_timestamp(1_700_000_000, 0)
        );
    }

    #[test]
    fn test_string_activity_id_and_summary_fallback() {
        let with_text: ActivityFields =
            serde_json::from_value(json!({ "activityId": "abc-1" })).unwrap();
        assert_eq!(with_text.source_activity_id().as_deref(), Some("abc-1"));

        let summary_only: ActivityFields =
            serde_json::from_value(json!({ "summaryId": "s-7" })).unwrap();
        assert_eq!(summary_only.source_activity_id().as_deref(), Some("s-7"));

        assert!(ActivityFields::default().source_activity_id().is_none());
    }

    #[test]
    fn test_detail_fields_fill_from_envelope() {
        let entry: ActivityDetailEntry = serde_json::from_value(json!({
            "userId": "garmin-user",
            "summaryId": "9001-detail",
            "activityId": 9001,
            "summary": { "activityName": "Tempo", "durationInSeconds": 2400 },
            "samples": [{ "heartRate": 150 }]
        }))
        .unwrap();

        let mut fields = entry.summary;
        fields.fill_missing(ActivityFields {
            summary_id: entry.summary_id,
            activity_id: entry.activity_id,
            ..ActivityFields::default()
        });
        assert_eq!(fields.source_activity_id().as_deref(), Some("9001"));
        assert_eq!(fields.activity_name.as_deref(), Some("Tempo"));
        assert!(entry.laps.is_none());
    }

    #[test]
    fn test_outcome_counts() {
        let mut outcome = WebhookOutcome::new(GarminEvent::Activities);
        outcome.record(true);
        outcome.record(false);
        outcome.record(true);
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.skipped, 1);
    }
}

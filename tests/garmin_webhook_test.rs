// ABOUTME: Integration tests for the Garmin push webhook
// ABOUTME: Immediate acknowledgement, activity upserts, detail merge, permissions, and deregistration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use common::TestApp;
use gofast::garmin::{GarminEvent, WebhookDispatcher};
use gofast_core::models::GarminConnection;
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use uuid::Uuid;

async fn connect(app: &TestApp, athlete_id: Uuid, garmin_user_id: &str) {
    let now = Utc::now();
    let connection = GarminConnection {
        athlete_id,
        garmin_user_id: Some(garmin_user_id.to_owned()),
        access_token: "access".to_owned(),
        refresh_token: Some("refresh".to_owned()),
        expires_at: Some(now + Duration::hours(12)),
        scope: Some("ACTIVITY_EXPORT".to_owned()),
        permissions: Vec::new(),
        connected_at: now,
        updated_at: now,
    };
    app.database()
        .garmin()
        .upsert_connection(&connection)
        .await
        .unwrap();
}

fn activity(user_id: &str, activity_id: i64, name: &str) -> Value {
    json!({
        "userId": user_id,
        "userAccessToken": "ignored",
        "summaryId": activity_id.to_string(),
        "activityId": activity_id,
        "activityName": name,
        "activityType": "RUNNING",
        "startTimeInSeconds": 1_700_000_000,
        "durationInSeconds": 1800,
        "distanceInMeters": 5012.4,
        "averageHeartRateInBeatsPerMinute": 151.4,
        "activeKilocalories": 402.6
    })
}

#[tokio::test]
async fn test_webhook_acknowledges_then_stores_activity() {
    let app = TestApp::new().await;
    let (athlete, token) = app.create_athlete("uid-ada", "Ada").await;
    connect(&app, athlete.id, "garmin-ada").await;

    let response = AxumTestRequest::post("/api/garmin/webhook")
        .json(&json!({ "activities": [activity("garmin-ada", 9001, "Morning Run")] }))
        .send(app.router())
        .await;
    assert_eq!(response.status(), 200);

    let mut stored = None;
    for _ in 0..50 {
        stored = app
            .database()
            .garmin()
            .get_activity_by_source_id("9001")
            .await
            .unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    let stored = stored.expect("activity was not stored");
    assert_eq!(stored.athlete_id, athlete.id);
    assert_eq!(stored.average_heart_rate, Some(151));
    assert_eq!(stored.calories, Some(403));

    let listed: Value = AxumTestRequest::get("/api/athletes/me/activities")
        .bearer(&token)
        .send(app.router())
        .await
        .json();
    assert_eq!(listed["activities"][0]["activity_name"], "Morning Run");
    assert_eq!(listed["activities"][0]["has_detail"], false);
}

#[tokio::test]
async fn test_large_activity_details_push_is_accepted() {
    let app = TestApp::new().await;
    let (athlete, _) = app.create_athlete("uid-ada", "Ada").await;
    connect(&app, athlete.id, "garmin-ada").await;

    // a multi-hour run sampled every second
    let samples: Vec<Value> = (0..20_000)
        .map(|i| {
            json!({
                "startTimeInSeconds": 1_700_000_000 + i,
                "heartRate": 140 + i % 30,
                "speedMetersPerSecond": 3.2,
                "latitudeInDegree": 42.360_081,
                "longitudeInDegree": -71.058_884
            })
        })
        .collect();
    let payload = json!({
        "activityDetails": [{
            "userId": "garmin-ada",
            "summaryId": "555-detail",
            "activityId": 555,
            "summary": { "activityName": "Marathon", "durationInSeconds": 20_000 },
            "samples": samples
        }]
    });
    let body = serde_json::to_vec(&payload).unwrap();
    assert!(body.len() > 2 * 1024 * 1024);

    let response = AxumTestRequest::post("/api/garmin/webhook")
        .header("content-type", "application/json")
        .raw_body(body)
        .send(app.router())
        .await;
    assert_eq!(response.status(), 200);

    let mut stored = None;
    for _ in 0..100 {
        stored = app
            .database()
            .garmin()
            .get_activity_by_source_id("555")
            .await
            .unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    let stored = stored.expect("activity detail was not stored");
    assert_eq!(stored.athlete_id, athlete.id);
    let detail = stored.detail.unwrap();
    assert_eq!(detail["samples"].as_array().unwrap().len(), 20_000);
}

#[tokio::test]
async fn test_webhook_acknowledges_garbage() {
    let app = TestApp::new().await;

    let response = AxumTestRequest::post("/api/garmin/webhook")
        .header("content-type", "application/json")
        .raw_body("{not json")
        .send(app.router())
        .await;
    assert_eq!(response.status(), 200);

    let mut dispatcher = WebhookDispatcher::new(app.database().clone());
    assert!(dispatcher.dispatch_bytes(b"{not json").await.is_none());
    assert!(dispatcher.dispatch(&json!({ "dailies": [] })).await.is_none());
}

#[tokio::test]
async fn test_redelivery_updates_in_place() {
    let app = TestApp::new().await;
    let (athlete, _) = app.create_athlete("uid-ada", "Ada").await;
    connect(&app, athlete.id, "garmin-ada").await;

    let mut dispatcher = WebhookDispatcher::new(app.database().clone());
    let first = dispatcher
        .dispatch(&json!({ "activities": [activity("garmin-ada", 42, "Easy Run")] }))
        .await
        .unwrap();
    assert_eq!(first.processed, 1);

    let second = dispatcher
        .dispatch(&json!({
            "manuallyUpdatedActivities": [activity("garmin-ada", 42, "Easy Run (edited)")]
        }))
        .await
        .unwrap();
    assert_eq!(second.event, GarminEvent::ManuallyUpdatedActivities);
    assert_eq!(second.processed, 1);

    let activities = app
        .database()
        .garmin()
        .list_activities(athlete.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].activity_name.as_deref(), Some("Easy Run (edited)"));
    assert!(activities[0].manually_updated);

    // a later plain summary keeps the manual-edit flag
    dispatcher
        .dispatch(&json!({ "activities": [activity("garmin-ada", 42, "Easy Run (edited)")] }))
        .await
        .unwrap();
    let stored = app
        .database()
        .garmin()
        .get_activity_by_source_id("42")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.manually_updated);
}

#[tokio::test]
async fn test_details_merge_into_summary() {
    let app = TestApp::new().await;
    let (athlete, _) = app.create_athlete("uid-ada", "Ada").await;
    connect(&app, athlete.id, "garmin-ada").await;

    let mut dispatcher = WebhookDispatcher::new(app.database().clone());
    dispatcher
        .dispatch(&json!({ "activities": [activity("garmin-ada", 7, "Tempo")] }))
        .await
        .unwrap();

    let outcome = dispatcher
        .dispatch(&json!({
            "activityDetails": [{
                "userId": "garmin-ada",
                "summaryId": "7-detail",
                "activityId": 7,
                "summary": { "durationInSeconds": 2400 },
                "samples": [{ "startTimeInSeconds": 1_700_000_000, "heartRate": 150 }],
                "laps": [{ "startTimeInSeconds": 1_700_000_000 }]
            }]
        }))
        .await
        .unwrap();
    assert_eq!(outcome.event, GarminEvent::ActivityDetails);
    assert_eq!(outcome.processed, 1);

    let stored = app
        .database()
        .garmin()
        .get_activity_by_source_id("7")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.activity_name.as_deref(), Some("Tempo"));
    assert_eq!(stored.duration_seconds, Some(2400));
    let detail = stored.detail.unwrap();
    assert_eq!(detail["samples"][0]["heartRate"], 150);
    assert_eq!(detail["laps"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_users_and_bad_entries_are_skipped() {
    let app = TestApp::new().await;
    let (athlete, _) = app.create_athlete("uid-ada", "Ada").await;
    connect(&app, athlete.id, "garmin-ada").await;

    let mut dispatcher = WebhookDispatcher::new(app.database().clone());
    let outcome = dispatcher
        .dispatch(&json!({
            "activities": [
                activity("garmin-ada", 1, "Known"),
                activity("garmin-stranger", 2, "Unknown"),
                activity("garmin-stranger", 3, "Unknown again"),
                { "activityName": "no user id" },
                { "userId": "garmin-ada", "activityName": "no activity id" }
            ]
        }))
        .await
        .unwrap();

    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.skipped, 4);
}

#[tokio::test]
async fn test_permissions_change_and_deregistration() {
    let app = TestApp::new().await;
    let (athlete, token) = app.create_athlete("uid-ada", "Ada").await;
    connect(&app, athlete.id, "garmin-ada").await;

    let mut dispatcher = WebhookDispatcher::new(app.database().clone());
    let outcome = dispatcher
        .dispatch(&json!({
            "userPermissionsChange": [{
                "userId": "garmin-ada",
                "permissions": ["ACTIVITY_EXPORT", "HEALTH_EXPORT"]
            }]
        }))
        .await
        .unwrap();
    assert_eq!(outcome.processed, 1);

    let status: Value = AxumTestRequest::get("/api/garmin/status")
        .bearer(&token)
        .send(app.router())
        .await
        .json();
    assert_eq!(status["connected"], true);
    assert_eq!(status["permissions"], json!(["ACTIVITY_EXPORT", "HEALTH_EXPORT"]));
    assert!(status.get("access_token").is_none());

    let outcome = dispatcher
        .dispatch(&json!({ "deregistrations": [{ "userId": "garmin-ada" }] }))
        .await
        .unwrap();
    assert_eq!(outcome.processed, 1);

    let status: Value = AxumTestRequest::get("/api/garmin/status")
        .bearer(&token)
        .send(app.router())
        .await
        .json();
    assert_eq!(status["connected"], false);
}

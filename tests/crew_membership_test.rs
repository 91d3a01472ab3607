// ABOUTME: Integration tests for run crew creation, joining, roles, removal, leaving, and ownership transfer
// ABOUTME: Covers the admin/manager/member permission rules end to end
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use common::TestApp;
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};

fn str_field(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn test_create_crew_makes_caller_admin() {
    let app = TestApp::new().await;
    let (athlete, token) = app.create_athlete("uid-ada", "Ada").await;

    let response = AxumTestRequest::post("/api/runcrews")
        .bearer(&token)
        .json(&json!({ "name": "  Harbor Harriers ", "handle": "@Harbor" }))
        .send(app.router())
        .await;
    assert_eq!(response.status(), 201);

    let body: Value = response.json();
    assert_eq!(body["my_role"], "admin");
    assert_eq!(body["crew"]["name"], "Harbor Harriers");
    assert_eq!(body["crew"]["handle"], "harbor");
    assert_eq!(body["crew"]["join_code"].as_str().unwrap().len(), 6);
    assert_eq!(body["members"][0]["athlete_id"], athlete.id.to_string());
}

#[tokio::test]
async fn test_create_crew_rejects_blank_name() {
    let app = TestApp::new().await;
    let (_, token) = app.create_athlete("uid-ada", "Ada").await;

    let response = AxumTestRequest::post("/api/runcrews")
        .bearer(&token)
        .json(&json!({ "name": "   " }))
        .send(app.router())
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_missing_bearer_is_unauthorized() {
    let app = TestApp::new().await;

    let response = AxumTestRequest::get("/api/runcrews/mine").send(app.router()).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_join_by_code_and_preview_by_handle() {
    let app = TestApp::new().await;
    let (_, ada) = app.create_athlete("uid-ada", "Ada").await;
    let (_, bob) = app.create_athlete("uid-bob", "Bob").await;

    let crew = app.create_crew(&ada, "Harbor Harriers").await;
    let crew_id = str_field(&crew, "id");
    let join_code = str_field(&crew, "join_code");

    let response = AxumTestRequest::post("/api/runcrews/join")
        .bearer(&bob)
        .json(&json!({ "join_code": format!(" {} ", join_code.to_lowercase()) }))
        .send(app.router())
        .await;
    assert_eq!(response.status(), 201);
    let joined: Value = response.json();
    assert_eq!(joined["role"], "member");
    assert_eq!(joined["member_count"], 2);

    let again = AxumTestRequest::post("/api/runcrews/join")
        .bearer(&bob)
        .json(&json!({ "join_code": join_code }))
        .send(app.router())
        .await;
    assert_eq!(again.status(), 409);

    let unknown = AxumTestRequest::post("/api/runcrews/join")
        .bearer(&bob)
        .json(&json!({ "join_code": "ZZZZZZZZ" }))
        .send(app.router())
        .await;
    assert_eq!(unknown.status(), 404);

    let members = AxumTestRequest::get(&format!("/api/runcrews/{crew_id}/members"))
        .bearer(&bob)
        .send(app.router())
        .await;
    assert_eq!(members.status(), 200);
    let members: Value = members.json();
    assert_eq!(members["members"].as_array().unwrap().len(), 2);

    let mine = AxumTestRequest::get("/api/runcrews/mine")
        .bearer(&bob)
        .send(app.router())
        .await;
    let mine: Value = mine.json();
    assert_eq!(mine["crews"][0]["crew"]["id"], crew_id.as_str());
}

#[tokio::test]
async fn test_non_member_cannot_view_crew() {
    let app = TestApp::new().await;
    let (_, ada) = app.create_athlete("uid-ada", "Ada").await;
    let (_, eve) = app.create_athlete("uid-eve", "Eve").await;
    let crew = app.create_crew(&ada, "Harbor Harriers").await;

    let response = AxumTestRequest::get(&format!("/api/runcrews/{}", str_field(&crew, "id")))
        .bearer(&eve)
        .send(app.router())
        .await;
    assert_eq!(response.status(), 403);

    let bad_id = AxumTestRequest::get("/api/runcrews/not-a-uuid")
        .bearer(&eve)
        .send(app.router())
        .await;
    assert_eq!(bad_id.status(), 400);
}

#[tokio::test]
async fn test_role_changes_follow_permissions() {
    let app = TestApp::new().await;
    let (ada_athlete, ada) = app.create_athlete("uid-ada", "Ada").await;
    let (bob_athlete, bob) = app.create_athlete("uid-bob", "Bob").await;
    let (cat_athlete, cat) = app.create_athlete("uid-cat", "Cat").await;

    let crew = app.create_crew(&ada, "Harbor Harriers").await;
    let crew_id = str_field(&crew, "id");
    let join_code = str_field(&crew, "join_code");
    app.join_crew(&bob, &join_code).await;
    app.join_crew(&cat, &join_code).await;

    // members cannot change roles
    let status = app
        .set_role(&bob, &crew_id, &cat_athlete.id.to_string(), "manager")
        .await;
    assert_eq!(status, 403);

    // admins can
    let status = app
        .set_role(&ada, &crew_id, &bob_athlete.id.to_string(), "manager")
        .await;
    assert_eq!(status, 200);

    // managers still cannot
    let status = app
        .set_role(&bob, &crew_id, &cat_athlete.id.to_string(), "manager")
        .await;
    assert_eq!(status, 403);

    // admins cannot change their own role
    let status = app
        .set_role(&ada, &crew_id, &ada_athlete.id.to_string(), "member")
        .await;
    assert_eq!(status, 400);

    // unknown role name
    let status = app
        .set_role(&ada, &crew_id, &cat_athlete.id.to_string(), "captain")
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_removal_rules() {
    let app = TestApp::new().await;
    let (ada_athlete, ada) = app.create_athlete("uid-ada", "Ada").await;
    let (bob_athlete, bob) = app.create_athlete("uid-bob", "Bob").await;
    let (cat_athlete, cat) = app.create_athlete("uid-cat", "Cat").await;
    let (dan_athlete, dan) = app.create_athlete("uid-dan", "Dan").await;

    let crew = app.create_crew(&ada, "Harbor Harriers").await;
    let crew_id = str_field(&crew, "id");
    let join_code = str_field(&crew, "join_code");
    for token in [&bob, &cat, &dan] {
        app.join_crew(token, &join_code).await;
    }
    assert_eq!(
        app.set_role(&ada, &crew_id, &bob_athlete.id.to_string(), "manager")
            .await,
        200
    );
    assert_eq!(
        app.set_role(&ada, &crew_id, &cat_athlete.id.to_string(), "manager")
            .await,
        200
    );

    let remove = |token: String, target: String| {
        let router = app.router();
        let crew_id = crew_id.clone();
        async move {
            AxumTestRequest::delete(&format!("/api/runcrews/{crew_id}/members/{target}"))
                .bearer(&token)
                .send(router)
                .await
                .status()
        }
    };

    // a manager cannot remove another manager
    assert_eq!(remove(bob.clone(), cat_athlete.id.to_string()).await, 403);
    // a member cannot remove anyone
    assert_eq!(remove(dan.clone(), cat_athlete.id.to_string()).await, 403);
    // a manager can remove a member
    assert_eq!(remove(bob.clone(), dan_athlete.id.to_string()).await, 204);
    // the removed member is gone
    assert_eq!(remove(bob.clone(), dan_athlete.id.to_string()).await, 404);
    // nobody removes themselves
    assert_eq!(remove(ada.clone(), ada_athlete.id.to_string()).await, 400);
    assert_eq!(remove(bob.clone(), bob_athlete.id.to_string()).await, 400);
    // an admin can remove a manager
    assert_eq!(remove(ada.clone(), cat_athlete.id.to_string()).await, 204);
}

#[tokio::test]
async fn test_last_admin_cannot_leave() {
    let app = TestApp::new().await;
    let (_, ada) = app.create_athlete("uid-ada", "Ada").await;
    let (_, bob) = app.create_athlete("uid-bob", "Bob").await;

    let crew = app.create_crew(&ada, "Harbor Harriers").await;
    let crew_id = str_field(&crew, "id");
    app.join_crew(&bob, &str_field(&crew, "join_code")).await;

    let response = AxumTestRequest::post(&format!("/api/runcrews/{crew_id}/leave"))
        .bearer(&ada)
        .send(app.router())
        .await;
    assert_eq!(response.status(), 400);

    let response = AxumTestRequest::post(&format!("/api/runcrews/{crew_id}/leave"))
        .bearer(&bob)
        .send(app.router())
        .await;
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn test_transfer_ownership_demotes_caller() {
    let app = TestApp::new().await;
    let (ada_athlete, ada) = app.create_athlete("uid-ada", "Ada").await;
    let (bob_athlete, bob) = app.create_athlete("uid-bob", "Bob").await;

    let crew = app.create_crew(&ada, "Harbor Harriers").await;
    let crew_id = str_field(&crew, "id");
    app.join_crew(&bob, &str_field(&crew, "join_code")).await;

    let refused = AxumTestRequest::post(&format!("/api/runcrews/{crew_id}/transfer-ownership"))
        .bearer(&ada)
        .json(&json!({ "athlete_id": bob_athlete.id.to_string(), "demote_to": "admin" }))
        .send(app.router())
        .await;
    assert_eq!(refused.status(), 400);

    let response = AxumTestRequest::post(&format!("/api/runcrews/{crew_id}/transfer-ownership"))
        .bearer(&ada)
        .json(&json!({ "athlete_id": bob_athlete.id.to_string(), "demote_to": "manager" }))
        .send(app.router())
        .await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json();
    let role_of = |id: String| {
        body["members"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["athlete_id"] == id.as_str())
            .map(|m| m["role"].as_str().unwrap().to_owned())
            .unwrap()
    };
    assert_eq!(role_of(bob_athlete.id.to_string()), "admin");
    assert_eq!(role_of(ada_athlete.id.to_string()), "manager");

    // the old admin can no longer delete the crew
    let delete = AxumTestRequest::delete(&format!("/api/runcrews/{crew_id}"))
        .bearer(&ada)
        .send(app.router())
        .await;
    assert_eq!(delete.status(), 403);

    let delete = AxumTestRequest::delete(&format!("/api/runcrews/{crew_id}"))
        .bearer(&bob)
        .send(app.router())
        .await;
    assert_eq!(delete.status(), 204);

    let gone = AxumTestRequest::get(&format!("/api/runcrews/{crew_id}"))
        .bearer(&bob)
        .send(app.router())
        .await;
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn test_update_crew_requires_staff() {
    let app = TestApp::new().await;
    let (_, ada) = app.create_athlete("uid-ada", "Ada").await;
    let (_, bob) = app.create_athlete("uid-bob", "Bob").await;

    let crew = app.create_crew(&ada, "Harbor Harriers").await;
    let crew_id = str_field(&crew, "id");
    app.join_crew(&bob, &str_field(&crew, "join_code")).await;

    let denied = AxumTestRequest::put(&format!("/api/runcrews/{crew_id}"))
        .bearer(&bob)
        .json(&json!({ "name": "Bob's Crew" }))
        .send(app.router())
        .await;
    assert_eq!(denied.status(), 403);

    let updated = AxumTestRequest::put(&format!("/api/runcrews/{crew_id}"))
        .bearer(&ada)
        .json(&json!({ "description": "Tuesday tempo, Sunday long run" }))
        .send(app.router())
        .await;
    assert_eq!(updated.status(), 200);
    let body: Value = updated.json();
    assert_eq!(body["name"], "Harbor Harriers");
    assert_eq!(body["description"], "Tuesday tempo, Sunday long run");
}

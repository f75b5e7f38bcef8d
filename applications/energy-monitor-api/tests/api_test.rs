// HTTP tests for the router, backed by the in-memory stores.

use axum::http::StatusCode;
use axum_test::TestServer;
use energy_monitor_api::api::create_router;
use energy_monitor_api::auth::create_token;
use serde_json::{json, Value};
use std::sync::Arc;
use test_helpers::*;

mod test_helpers;

const USER_HEADER: &str = "x-auth-request-user";

fn server(store: &Arc<InMemoryStore>) -> TestServer {
    TestServer::new(create_router(test_state(store))).unwrap()
}

#[tokio::test]
async fn test_health_without_database() {
    let store = InMemoryStore::new();
    let server = server(&store);

    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"]["configured"], false);
}

#[tokio::test]
async fn test_requests_without_identity_are_rejected() {
    let store = InMemoryStore::new();
    let server = server(&store);

    server
        .get("/api/v1/homes")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/v1/homes")
        .add_header("Authorization", "Bearer invalid-token-here")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/v1/homes")
        .add_header("Authorization", "InvalidFormat token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_identifies_user() {
    let store = InMemoryStore::new();
    let server = server(&store);
    seed_home(&store, "alice", None).await;
    let token = create_token("alice", "test-secret-key", 1).unwrap();

    let response = server
        .get("/api/v1/homes")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["homes"].as_array().unwrap().len(), 1);
    assert_eq!(body["homes"][0]["name"], "Cabin");
}

#[tokio::test]
async fn test_home_room_appliance_lifecycle() {
    let store = InMemoryStore::new();
    let server = server(&store);

    let response = server
        .post("/api/v1/homes")
        .add_header(USER_HEADER, "alice")
        .json(&json!({ "name": "Flat", "address": "Main St 1" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let home_id = response.json::<Value>()["id"].as_i64().unwrap();

    let response = server
        .post(&format!("/api/v1/homes/{}/rooms", home_id))
        .add_header(USER_HEADER, "alice")
        .json(&json!({ "name": "Kitchen" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let room_id = response.json::<Value>()["id"].as_i64().unwrap();

    let response = server
        .post(&format!("/api/v1/homes/{}/appliances", home_id))
        .add_header(USER_HEADER, "alice")
        .json(&json!({ "name": "Oven", "room_id": room_id, "device_key": "oven-key" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let appliance: Value = response.json();
    assert_eq!(appliance["room_id"], room_id);
    // device keys are never echoed back
    assert!(appliance.get("device_key").is_none());

    let response = server
        .get(&format!("/api/v1/homes/{}/appliances", home_id))
        .add_header(USER_HEADER, "alice")
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["appliances"].as_array().unwrap().len(), 1);

    // another user cannot see or delete it
    server
        .get(&format!("/api/v1/homes/{}", home_id))
        .add_header(USER_HEADER, "mallory")
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .delete(&format!("/api/v1/homes/{}", home_id))
        .add_header(USER_HEADER, "mallory")
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .delete(&format!("/api/v1/homes/{}", home_id))
        .add_header(USER_HEADER, "alice")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/api/v1/homes/{}", home_id))
        .add_header(USER_HEADER, "alice")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert!(store.all_summaries().is_empty());
}

#[tokio::test]
async fn test_empty_home_name_is_rejected() {
    let store = InMemoryStore::new();
    let server = server(&store);

    let response = server
        .post("/api/v1/homes")
        .add_header(USER_HEADER, "alice")
        .json(&json!({ "name": "  " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_submit_reading_and_read_summaries() {
    let store = InMemoryStore::new();
    let server = server(&store);
    let fixture = seed_home(&store, "alice", None).await;

    let response = server
        .post("/api/v1/readings")
        .add_header(USER_HEADER, "alice")
        .json(&json!({
            "home_id": fixture.home.id,
            "appliance_id": fixture.appliance.id,
            "energy_kwh": 2.5,
            "power_w": 500,
            "current_a": 2,
            "voltage_v": 230,
            "recorded_at": "2025-03-15T10:00:00Z"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let reading: Value = response.json();
    assert_eq!(reading["cost"], 25.0);
    assert_eq!(reading["is_on"], true);

    let response = server
        .get(&format!("/api/v1/homes/{}/summaries", fixture.home.id))
        .add_header(USER_HEADER, "alice")
        .await;
    response.assert_status(StatusCode::OK);
    let summaries = response.json::<Value>()["summaries"].as_array().unwrap().clone();
    assert_eq!(summaries.len(), 3);

    let response = server
        .get(&format!(
            "/api/v1/homes/{}/summaries?period_type=monthly",
            fixture.home.id
        ))
        .add_header(USER_HEADER, "alice")
        .await;
    let monthly = response.json::<Value>()["summaries"].as_array().unwrap().clone();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0]["period_type"], "monthly");
    assert_eq!(monthly[0]["total_cost"], 25.0);
    assert_eq!(monthly[0]["period_start"], "2025-03-01T00:00:00Z");

    let response = server
        .get(&format!("/api/v1/homes/{}/readings?limit=10", fixture.home.id))
        .add_header(USER_HEADER, "alice")
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["readings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_reading_returns_bad_request() {
    let store = InMemoryStore::new();
    let server = server(&store);
    let fixture = seed_home(&store, "alice", None).await;

    let response = server
        .post("/api/v1/readings")
        .add_header(USER_HEADER, "alice")
        .json(&json!({
            "home_id": fixture.home.id,
            "appliance_id": fixture.appliance.id,
            "energy_kwh": -2.5,
            "power_w": 500,
            "current_a": 2,
            "voltage_v": 230
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("energy_kwh"));
    assert_eq!(store.reading_count(), 0);
}

#[tokio::test]
async fn test_reading_for_foreign_home_is_forbidden() {
    let store = InMemoryStore::new();
    let server = server(&store);
    let fixture = seed_home(&store, "alice", None).await;

    server
        .post("/api/v1/readings")
        .add_header(USER_HEADER, "bob")
        .json(&json!({
            "home_id": fixture.home.id,
            "appliance_id": fixture.appliance.id,
            "energy_kwh": 1.0,
            "power_w": 10,
            "current_a": 0.1,
            "voltage_v": 230
        }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_batch_endpoint() {
    let store = InMemoryStore::new();
    let server = server(&store);
    let fixture = seed_home(&store, "alice", None).await;
    let item = |energy: f64| {
        json!({
            "home_id": fixture.home.id,
            "appliance_id": fixture.appliance.id,
            "energy_kwh": energy,
            "power_w": 100,
            "current_a": 0.5,
            "voltage_v": 230,
            "recorded_at": "2025-03-15T10:00:00Z"
        })
    };

    let response = server
        .post("/api/v1/readings/batch")
        .add_header(USER_HEADER, "alice")
        .json(&json!([item(1.0), item(2.0)]))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["count"], 2);

    server
        .post("/api/v1/readings/batch")
        .add_header(USER_HEADER, "alice")
        .json(&json!([]))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_device_ingestion_uses_device_key() {
    let store = InMemoryStore::new();
    let server = server(&store);
    let fixture = seed_home(&store, "alice", Some("meter-secret")).await;
    let body = json!({
        "energy_kwh": 0.2,
        "power_w": 150,
        "current_a": 0.7,
        "voltage_v": 231,
        "is_randomized": true
    });

    server
        .post("/api/v1/devices/readings")
        .json(&body)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/api/v1/devices/readings")
        .add_header("x-device-key", "wrong")
        .json(&body)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/v1/devices/readings")
        .add_header("x-device-key", "meter-secret")
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    let reading: Value = response.json();
    assert_eq!(reading["user_id"], "alice");
    assert_eq!(reading["appliance_id"], fixture.appliance.id);
    assert_eq!(reading["is_randomized"], true);
}

#[tokio::test]
async fn test_profile_defaults_and_update() {
    let store = InMemoryStore::new();
    let server = server(&store);

    let response = server
        .get("/api/v1/profile")
        .add_header(USER_HEADER, "alice")
        .await;
    response.assert_status(StatusCode::OK);
    let profile: Value = response.json();
    assert_eq!(profile["email_notifications"], true);
    assert_eq!(profile["push_notifications"], false);
    assert_eq!(profile["in_app_notifications"], true);

    let response = server
        .put("/api/v1/profile")
        .add_header(USER_HEADER, "alice")
        .json(&json!({ "email_notifications": false, "display_name": "Alice" }))
        .await;
    response.assert_status(StatusCode::OK);
    let profile: Value = response.json();
    assert_eq!(profile["email_notifications"], false);
    assert_eq!(profile["in_app_notifications"], true);
    assert_eq!(profile["display_name"], "Alice");
}

#[tokio::test]
async fn test_first_home_stores_default_profile() {
    let store = InMemoryStore::new();
    let server = server(&store);

    server
        .post("/api/v1/homes")
        .add_header(USER_HEADER, "dave")
        .json(&json!({ "name": "Loft" }))
        .await
        .assert_status(StatusCode::CREATED);

    let stored = energy_monitor_api::repositories::ProfileStore::get(store.as_ref(), "dave")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.email_notifications);
    assert!(stored.in_app_notifications);
    assert!(!stored.push_notifications);
}

#[tokio::test]
async fn test_admin_billing_run_and_notification_flow() {
    let store = InMemoryStore::new();
    let server = server(&store);
    let fixture = seed_home(&store, "alice", None).await;

    server
        .put("/api/v1/profile")
        .add_header(USER_HEADER, "alice")
        .json(&json!({}))
        .await
        .assert_status(StatusCode::OK);
    server
        .post("/api/v1/readings")
        .add_header(USER_HEADER, "alice")
        .json(&json!({
            "home_id": fixture.home.id,
            "appliance_id": fixture.appliance.id,
            "energy_kwh": 50.0,
            "power_w": 900,
            "current_a": 4,
            "voltage_v": 230,
            "recorded_at": "2025-03-20T10:00:00Z"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    // only administrators may trigger the job
    server
        .post("/api/v1/admin/billing/run?date=2025-03-31T09:00:00Z")
        .add_header(USER_HEADER, "alice")
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post("/api/v1/admin/billing/run?date=2025-03-30T09:00:00Z")
        .add_header(USER_HEADER, "admin")
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["skipped_not_last_day"], true);

    let response = server
        .post("/api/v1/admin/billing/run?date=2025-03-31T09:00:00Z")
        .add_header(USER_HEADER, "admin")
        .await;
    response.assert_status(StatusCode::OK);
    let report: Value = response.json();
    assert_eq!(report["created"], 1);
    assert_eq!(report["run_at"], "2025-03-31T09:00:00Z");

    let response = server
        .get("/api/v1/notifications")
        .add_header(USER_HEADER, "alice")
        .await;
    response.assert_status(StatusCode::OK);
    let notifications = response.json::<Value>()["notifications"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(notifications.len(), 1);
    let reminder = &notifications[0];
    assert_eq!(reminder["status"], "sent");
    assert!(reminder["message"].as_str().unwrap().contains("March 2025"));
    assert!(reminder["channels"]
        .as_array()
        .unwrap()
        .contains(&json!("bill_reminder")));
    assert!(reminder.get("dedupe_key").is_none());
    let id = reminder["id"].as_i64().unwrap();

    server
        .post(&format!("/api/v1/notifications/{}/acknowledge", id))
        .add_header(USER_HEADER, "bob")
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post(&format!("/api/v1/notifications/{}/acknowledge", id))
        .add_header(USER_HEADER, "alice")
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "acknowledged");

    let response = server
        .get("/api/v1/notifications?status=sent")
        .add_header(USER_HEADER, "alice")
        .await;
    assert!(response.json::<Value>()["notifications"]
        .as_array()
        .unwrap()
        .is_empty());

    server
        .delete(&format!("/api/v1/notifications/{}", id))
        .add_header(USER_HEADER, "alice")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert!(store.all_notifications().is_empty());
}

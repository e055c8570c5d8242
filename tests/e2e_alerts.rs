//! E2E tests for alert listing and status updates

mod common;

use chrono::Utc;
use common::TestServer;
use wardwatch::data::{Alert, AlertStatus, EntityId};

async fn seed_alert(server: &TestServer, user_id: &str) -> String {
    let alert = Alert {
        id: EntityId::new().0,
        user_id: user_id.to_string(),
        lat: -6.2,
        lng: 106.8166,
        status: AlertStatus::Active,
        created_at: Utc::now(),
        resolved_at: None,
    };
    server.state.db.insert_alert(&alert).await.unwrap();
    alert.id
}

#[tokio::test]
async fn test_list_alerts() {
    let server = TestServer::new().await;
    seed_alert(&server, "u1").await;

    let response = server
        .client
        .get(server.url("/api/alerts"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let alerts: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["userId"], "u1");
    assert_eq!(alerts[0]["status"], "active");
}

#[tokio::test]
async fn test_resolving_alert_stamps_resolved_at() {
    let server = TestServer::new().await;
    let id = seed_alert(&server, "u1").await;

    let response = server
        .client
        .patch(server.url(&format!("/api/alerts/{}/status", id)))
        .json(&serde_json::json!({ "status": "resolved" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "resolved");
    assert!(!body["resolvedAt"].is_null());
}

#[tokio::test]
async fn test_false_alarm_status() {
    let server = TestServer::new().await;
    let id = seed_alert(&server, "u2").await;

    let response = server
        .client
        .patch(server.url(&format!("/api/alerts/{}/status", id)))
        .json(&serde_json::json!({ "status": "false_alarm" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "false_alarm");
}

#[tokio::test]
async fn test_update_status_of_unknown_alert_is_404() {
    let server = TestServer::new().await;

    let response = server
        .client
        .patch(server.url("/api/alerts/missing/status"))
        .json(&serde_json::json!({ "status": "resolved" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

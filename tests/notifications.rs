//! Notification log and the read-only endpoints

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

async fn asaas(app: &TestApp, token: &str, order_id: &str) -> StatusCode {
    let body = json!({
        "event": "PAYMENT_RECEIVED",
        "payment": {"id": format!("pay_{}", order_id), "status": "RECEIVED", "externalReference": order_id}
    });
    post_webhook(
        app.router(),
        "/webhook/asaas",
        &[("asaas-access-token", token)],
        body.to_string(),
    )
    .await
    .0
}

#[tokio::test]
async fn test_every_delivery_is_recorded() {
    let app = TestApp::new(test_providers());
    create_test_order(&app.conn(), text_key("1"), OrderStatus::Pendente, 100);

    assert_eq!(asaas(&app, "wrong", "1").await, StatusCode::UNAUTHORIZED);
    assert_eq!(asaas(&app, ASAAS_TOKEN, "1").await, StatusCode::OK);
    assert_eq!(asaas(&app, ASAAS_TOKEN, "1").await, StatusCode::OK);

    let log = app.notifications();
    assert_eq!(log.len(), 3);

    // Newest first.
    assert_eq!(log[0].outcome, "already_paid");
    assert_eq!(log[1].outcome, "transitioned");
    assert_eq!(log[1].provider, "asaas");
    assert_eq!(log[1].event_type, "PAYMENT_RECEIVED");
    assert_eq!(log[1].provider_payment_id.as_deref(), Some("pay_1"));
    assert_eq!(log[1].order_id.as_deref(), Some("1"));
    assert_eq!(log[1].http_status, 200);

    assert_eq!(log[2].outcome, "authentication_failed");
    assert_eq!(log[2].event_type, "unknown");
    assert_eq!(log[2].http_status, 401);
    assert!(log[2].order_id.is_none());
}

#[tokio::test]
async fn test_list_notifications_filters() {
    let app = TestApp::new(test_providers());
    create_test_order(&app.conn(), text_key("1"), OrderStatus::Pendente, 100);
    create_test_order(&app.conn(), text_key("2"), OrderStatus::Pendente, 100);
    asaas(&app, ASAAS_TOKEN, "1").await;
    asaas(&app, ASAAS_TOKEN, "2").await;
    asaas(&app, ASAAS_TOKEN, "2").await;

    let (status, body) = get_json(app.router(), "/notifications?order_id=2").await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|n| n["order_id"] == "2"));

    // Provider names are normalized.
    let (status, body) = get_json(app.router(), "/notifications?provider=ASAAS&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["provider"], "asaas");

    let (_, body) = get_json(app.router(), "/notifications?provider=stripe").await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_provider_filter_is_bad_request() {
    let app = TestApp::new(test_providers());
    let (status, body) = get_json(app.router(), "/notifications?provider=paypal").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad request");
}

#[tokio::test]
async fn test_purge_keeps_recent_notifications() {
    let app = TestApp::new(test_providers());
    let conn = app.conn();
    let input = CreatePaymentNotification {
        provider: "stripe".into(),
        event_type: "checkout.session.completed".into(),
        provider_payment_id: Some("cs_1".into()),
        order_id: Some("1".into()),
        outcome: "transitioned".into(),
        http_status: 200,
    };
    let old = queries::record_notification(&conn, &input).unwrap();
    queries::record_notification(&conn, &input).unwrap();

    let hundred_days_ago = chrono::Utc::now().timestamp() - 100 * 86400;
    conn.execute(
        "UPDATE payment_notifications SET created_at = ?1 WHERE id = ?2",
        rusqlite::params![hundred_days_ago, old.id],
    )
    .unwrap();

    assert_eq!(queries::purge_old_notifications(&conn, 90).unwrap(), 1);
    let remaining = app.notifications();
    assert_eq!(remaining.len(), 1);
    assert_ne!(remaining[0].id, old.id);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(test_providers());
    let (status, body) = get_json(app.router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

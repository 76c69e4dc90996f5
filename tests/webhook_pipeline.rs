//! Cross-provider pipeline behavior: store failures, write verification,
//! routing.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::json;
use tower::ServiceExt;

fn stripe_paid(order_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": format!("cs_{}", order_id),
            "payment_status": "paid",
            "metadata": {"orderId": order_id}
        }}
    }))
    .unwrap()
}

fn asaas_received(order_id: &str) -> String {
    json!({
        "event": "PAYMENT_RECEIVED",
        "payment": {"id": format!("pay_{}", order_id), "status": "RECEIVED", "externalReference": order_id}
    })
    .to_string()
}

async fn post_stripe(app: &TestApp, payload: Vec<u8>) -> (StatusCode, serde_json::Value) {
    let signature = stripe_signature(&payload, STRIPE_SECRET);
    post_webhook(app.router(), "/webhook/stripe", &[("stripe-signature", signature.as_str())], payload).await
}

fn flaky_app() -> (TestApp, Arc<FlakyStore>) {
    let app = TestApp::new(test_providers());
    let store = Arc::new(FlakyStore::new(app.db.pool.clone()));
    let app = app.with_order_store(store.clone());
    (app, store)
}

#[tokio::test]
async fn test_lost_write_is_recovered() {
    let (app, store) = flaky_app();
    create_test_order(&app.conn(), text_key("1"), OrderStatus::Pendente, 100);
    store.lost_writes.store(1, Ordering::SeqCst);

    let (status, body) = post_stripe(&app, stripe_paid("1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "recovered");
    assert_eq!(app.status(&text_key("1")), OrderStatus::Pago);
}

#[tokio::test]
async fn test_unrecoverable_write_is_acknowledged() {
    let (app, store) = flaky_app();
    create_test_order(&app.conn(), text_key("2"), OrderStatus::Pendente, 100);
    store.lost_writes.store(1, Ordering::SeqCst);
    store.lost_forces.store(1, Ordering::SeqCst);

    let (status, body) = post_stripe(&app, stripe_paid("2")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "reconciliation_anomaly");
    assert_eq!(app.status(&text_key("2")), OrderStatus::Pendente);
}

#[tokio::test]
async fn test_store_down_before_write_asks_for_redelivery() {
    let (app, store) = flaky_app();
    create_test_order(&app.conn(), text_key("3"), OrderStatus::Pendente, 100);
    store.fail_reads.store(true, Ordering::SeqCst);

    let (status, body) = post_webhook(
        app.router(),
        "/webhook/asaas",
        &[("asaas-access-token", ASAAS_TOKEN)],
        asaas_received("3"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["outcome"], "store_unavailable");

    // Redelivery once the store is back succeeds.
    store.fail_reads.store(false, Ordering::SeqCst);
    let (status, _) = post_webhook(
        app.router(),
        "/webhook/asaas",
        &[("asaas-access-token", ASAAS_TOKEN)],
        asaas_received("3"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.status(&text_key("3")), OrderStatus::Pago);
}

#[tokio::test]
async fn test_store_failure_after_write_is_acknowledged() {
    let (app, store) = flaky_app();
    create_test_order(&app.conn(), text_key("4"), OrderStatus::Pendente, 100);
    store.fail_writes.store(true, Ordering::SeqCst);

    let (status, body) = post_stripe(&app, stripe_paid("4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "store_failed_after_write");
}

#[tokio::test]
async fn test_malformed_body_is_acknowledged() {
    let app = TestApp::new(unauthenticated_providers());
    for uri in ["/webhook/stripe", "/webhook/asaas", "/webhook/abacatepay", "/webhook/mercadopago"] {
        let (status, body) = post_webhook(app.router(), uri, &[], "{not json").await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body["outcome"], "ignored", "{}", uri);
    }
}

#[tokio::test]
async fn test_unauthenticated_delivery_rejected_before_parsing() {
    let app = TestApp::new(test_providers());
    let (status, _) = post_webhook(app.router(), "/webhook/asaas", &[], "{not json").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cancelled_order_is_not_reopened() {
    let app = TestApp::new(test_providers());
    create_test_order(&app.conn(), text_key("5"), OrderStatus::Cancelado, 100);

    let (status, body) = post_stripe(&app, stripe_paid("5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
    assert_eq!(app.status(&text_key("5")), OrderStatus::Cancelado);
}

#[tokio::test]
async fn test_webhooks_only_accept_post() {
    let app = TestApp::new(test_providers());
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/webhook/stripe")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_provider_route_is_not_found() {
    let app = TestApp::new(test_providers());
    let (status, _) = post_webhook(app.router(), "/webhook/paypal", &[], "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

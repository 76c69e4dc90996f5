//! Test utilities and fixtures for Totem Pay integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub use totem_pay::config::{ProviderConfig, ProvidersConfig, ResponsePolicy};
pub use totem_pay::db::{AppState, DbPool, init_db, queries};
pub use totem_pay::error::{AppError, Result};
pub use totem_pay::models::*;
pub use totem_pay::reconcile::{OrderStore, SqliteOrderStore};

pub const STRIPE_SECRET: &str = "whsec_test123secret456";
pub const MERCADOPAGO_SECRET: &str = "mp_test_secret";
pub const ASAAS_TOKEN: &str = "asaas_test_token";
pub const ABACATEPAY_SECRET: &str = "abacate_test_secret";
pub const ABACATEPAY_HMAC_KEY: &str = "abacate_test_hmac";

/// A file-backed test database. Every pooled connection sees the same data,
/// which an in-memory pool would not guarantee.
pub struct TestDb {
    pub pool: DbPool,
    _dir: TempDir,
}

pub fn setup_test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let manager = SqliteConnectionManager::file(dir.path().join("test.db"));
    let pool = Pool::builder().max_size(4).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    TestDb { pool, _dir: dir }
}

/// Provider config with every secret set and lookups disabled.
pub fn test_providers() -> ProvidersConfig {
    ProvidersConfig {
        mercadopago: ProviderConfig::new(Provider::MercadoPago).with_webhook_secret(MERCADOPAGO_SECRET),
        stripe: ProviderConfig::new(Provider::Stripe).with_webhook_secret(STRIPE_SECRET),
        asaas: ProviderConfig::new(Provider::Asaas).with_webhook_secret(ASAAS_TOKEN),
        abacatepay: ProviderConfig::new(Provider::AbacatePay).with_webhook_secret(ABACATEPAY_SECRET),
        http_timeout: Duration::from_secs(2),
    }
}

/// Provider config with no secrets at all (permissive mode).
pub fn unauthenticated_providers() -> ProvidersConfig {
    ProvidersConfig {
        http_timeout: Duration::from_secs(2),
        ..ProvidersConfig::default()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub db: TestDb,
}

impl TestApp {
    pub fn new(providers: ProvidersConfig) -> Self {
        let db = setup_test_db();
        let state = AppState::new(db.pool.clone(), providers).expect("Failed to build app state");
        Self { state, db }
    }

    pub fn with_order_store(mut self, store: Arc<dyn OrderStore>) -> Self {
        self.state = self.state.with_order_store(store);
        self
    }

    pub fn router(&self) -> Router {
        totem_pay::app(self.state.clone())
    }

    pub fn conn(&self) -> r2d2::PooledConnection<SqliteConnectionManager> {
        self.db.pool.get().unwrap()
    }

    pub fn order(&self, key: &OrderKey) -> Option<Order> {
        queries::get_order(&self.conn(), key).unwrap()
    }

    pub fn status(&self, key: &OrderKey) -> OrderStatus {
        self.order(key).expect("order should exist").status
    }

    pub fn notifications(&self) -> Vec<PaymentNotification> {
        queries::list_notifications(&self.conn(), &NotificationQuery::default()).unwrap()
    }
}

/// Create a test order with defaults for the optional fields.
pub fn create_test_order(conn: &Connection, id: OrderKey, status: OrderStatus, price_cents: i64) -> Order {
    queries::create_order(
        conn,
        &CreateOrder {
            id,
            status,
            price_cents,
            billing_type: None,
            installments: None,
        },
    )
    .expect("Failed to create test order")
}

pub fn text_key(id: &str) -> OrderKey {
    OrderKey::Text(id.to_string())
}

// ============ Requests ============

/// POST a webhook and return the status plus the parsed JSON reply.
pub async fn post_webhook(
    app: Router,
    uri: &str,
    headers: &[(&str, &str)],
    body: impl Into<Body>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = app
        .oneshot(request.body(body.into()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// ============ Signatures ============

fn hmac(key: &str, data: &[u8]) -> Vec<u8> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// `stripe-signature` header value for `payload`, timestamped now.
pub fn stripe_signature(payload: &[u8], secret: &str) -> String {
    stripe_signature_rolling(payload, &[secret])
}

/// Header Stripe sends while a secret roll is in progress: one `v1` entry per
/// secret, all over the same timestamp.
pub fn stripe_signature_rolling(payload: &[u8], secrets: &[&str]) -> String {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let mut signed = format!("{}.", timestamp).into_bytes();
    signed.extend_from_slice(payload);
    let mut header = format!("t={}", timestamp);
    for secret in secrets {
        header.push_str(&format!(",v1={}", hex::encode(hmac(secret, &signed))));
    }
    header
}

/// `x-signature` header value for a Mercado Pago notification.
pub fn mercadopago_signature(secret: &str, data_id: &str, request_id: &str) -> String {
    let ts = chrono::Utc::now().timestamp().to_string();
    let manifest = format!("id:{};request-id:{};ts:{};", data_id.to_lowercase(), request_id, ts);
    format!("ts={},v1={}", ts, hex::encode(hmac(secret, manifest.as_bytes())))
}

/// `x-webhook-signature` header value for an AbacatePay body.
pub fn abacatepay_signature(payload: &[u8], key: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(hmac(key, payload))
}

// ============ Fake upstream ============

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============ Scripted order store ============

/// SQLite order store that can be told to lose writes or fail reads, for
/// exercising the verify-after-write path end to end.
pub struct FlakyStore {
    inner: SqliteOrderStore,
    /// Upcoming `mark_paid` calls that report success without writing.
    pub lost_writes: AtomicU32,
    /// Upcoming `force_status` calls that report success without writing.
    pub lost_forces: AtomicU32,
    /// Fail every read while set.
    pub fail_reads: AtomicBool,
    /// Fail every write while set.
    pub fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            inner: SqliteOrderStore::new(pool),
            lost_writes: AtomicU32::new(0),
            lost_forces: AtomicU32::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl OrderStore for FlakyStore {
    fn find_order(&self, key: &OrderKey) -> Result<Option<Order>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Internal("connection reset by peer".into()));
        }
        self.inner.find_order(key)
    }

    fn mark_paid(&self, key: &OrderKey, provider_payment_id: Option<&str>) -> Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("connection reset by peer".into()));
        }
        if Self::take(&self.lost_writes) {
            return Ok(true);
        }
        self.inner.mark_paid(key, provider_payment_id)
    }

    fn force_status(&self, key: &OrderKey, status: OrderStatus) -> Result<bool> {
        if Self::take(&self.lost_forces) {
            return Ok(true);
        }
        self.inner.force_status(key, status)
    }
}

//! Shared webhook pipeline for all payment providers.
//!
//! Every provider endpoint runs the same steps: authenticate, adapt the body
//! into a [`PaymentEvent`], optionally complete it from the provider's API,
//! resolve the order id, reconcile, and map the result to a status code using
//! the provider's [`ResponsePolicy`]. Providers only supply the adapter pieces
//! through [`WebhookProvider`].

use std::collections::HashMap;
use std::future::Future;

use axum::{
    Json,
    body::Bytes,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;
use serde_json::Value;

use crate::config::{ProviderConfig, ResponsePolicy};
use crate::db::{AppState, queries};
use crate::models::{CreatePaymentNotification, PaymentEvent, PaymentStatus, Provider};
use crate::reconcile::{ReconciliationEngine, Reconciled, WebhookError, resolve_order_id};

/// Everything an adapter may look at in a delivery.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub body: Bytes,
}

impl WebhookRequest {
    pub fn new(headers: HeaderMap, query: HashMap<String, String>, body: Bytes) -> Self {
        Self {
            headers,
            query,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// `orderId` passed on the webhook URL, the last-resort correlation hint.
    pub fn query_order_id(&self) -> Option<String> {
        self.query("orderId").map(str::to_string)
    }

    /// Parse the body as typed JSON. An unparseable body is something we do
    /// not recognize, so it is ignored rather than rejected.
    pub fn json<T: serde::de::DeserializeOwned>(&self, provider: Provider) -> Result<T, WebhookError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            tracing::warn!("Failed to parse {} webhook body: {}", provider, e);
            WebhookError::not_relevant("malformed body")
        })
    }
}

/// Trait for payment provider webhook handling.
///
/// Implementors provide provider-specific authentication and parsing; the
/// shared pipeline in [`handle_webhook`] handles correlation, reconciliation
/// and the response.
pub trait WebhookProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Check the delivery's secret or signature. Only called when the provider
    /// has a secret configured.
    fn authenticate(&self, state: &AppState, req: &WebhookRequest) -> Result<(), WebhookError>;

    /// Normalize the payload. Recognized-but-irrelevant deliveries return
    /// [`WebhookError::NotRelevant`].
    fn parse_event(&self, req: &WebhookRequest) -> Result<PaymentEvent, WebhookError>;

    /// Fill in what an id-only payload left out by asking the provider's API.
    /// Default: the payload is already complete.
    fn complete_event(
        &self,
        _state: &AppState,
        event: PaymentEvent,
    ) -> impl Future<Output = Result<PaymentEvent, WebhookError>> + Send {
        async move { Ok(event) }
    }
}

/// JSON body returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookReply {
    pub outcome: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// What the notification log records about a delivery, filled in as the
/// pipeline learns it.
#[derive(Debug, Default)]
struct DeliveryRecord {
    event_type: Option<String>,
    provider_payment_id: Option<String>,
    order_id: Option<String>,
}

impl DeliveryRecord {
    fn observe(&mut self, event: &PaymentEvent) {
        self.event_type = Some(event.provider_event_type.clone());
        if event.provider_payment_id.is_some() {
            self.provider_payment_id = event.provider_payment_id.clone();
        }
    }
}

/// Map an outcome to the status code the provider sees.
///
/// Everything is acknowledged with 200 except failed authentication, a store
/// failure before any write (safe to redeliver), and the two outcomes whose
/// code is a per-provider choice.
pub fn response_status(result: &Result<Reconciled, WebhookError>, policy: &ResponsePolicy) -> StatusCode {
    match result {
        Ok(_) => StatusCode::OK,
        Err(WebhookError::AuthenticationFailed(_)) => StatusCode::UNAUTHORIZED,
        Err(WebhookError::NotRelevant(_)) => StatusCode::OK,
        Err(WebhookError::CorrelationFailed) => policy.correlation_failed,
        Err(WebhookError::OrderNotFound { .. }) => policy.order_not_found,
        Err(WebhookError::ReconciliationAnomaly { .. }) => StatusCode::OK,
        Err(WebhookError::TransientStore {
            after_write: false, ..
        }) => StatusCode::INTERNAL_SERVER_ERROR,
        Err(WebhookError::TransientStore {
            after_write: true, ..
        }) => StatusCode::OK,
    }
}

fn reply_message(result: &Result<Reconciled, WebhookError>) -> String {
    match result {
        Ok(Reconciled::Transitioned { .. }) | Ok(Reconciled::Recovered { .. }) => {
            "Payment confirmed".into()
        }
        Ok(Reconciled::AlreadyPaid { .. }) => "Already processed".into(),
        Err(WebhookError::AuthenticationFailed(reason)) => (*reason).into(),
        Err(WebhookError::NotRelevant(reason)) => format!("Event ignored: {}", reason),
        Err(WebhookError::CorrelationFailed) => "No order id in payload".into(),
        Err(WebhookError::OrderNotFound { .. }) => "Order not found".into(),
        Err(WebhookError::TransientStore {
            after_write: false, ..
        }) => "Database error".into(),
        Err(WebhookError::ReconciliationAnomaly { .. })
        | Err(WebhookError::TransientStore {
            after_write: true, ..
        }) => "Received".into(),
    }
}

/// Run one delivery through the pipeline and build the response.
pub async fn handle_webhook<P: WebhookProvider>(
    provider: &P,
    state: &AppState,
    req: WebhookRequest,
) -> (StatusCode, Json<WebhookReply>) {
    let name = provider.provider();
    let config = state.providers.get(name);

    let mut record = DeliveryRecord::default();
    let result = process(provider, state, config, &req, &mut record).await;
    let status = response_status(&result, &config.policy);

    match &result {
        Ok(outcome) => tracing::debug!(
            "{} webhook handled: outcome={} order={}",
            name,
            outcome.label(),
            outcome.order()
        ),
        Err(WebhookError::NotRelevant(reason)) => tracing::info!(
            "{} webhook ignored ({}): event={:?} payment={:?}",
            name,
            reason,
            record.event_type,
            record.provider_payment_id
        ),
        Err(e) => tracing::debug!("{} webhook failed with {}: {}", name, status, e),
    }

    save_record(state, name, &record, &result, status);

    let reply = WebhookReply {
        outcome: match &result {
            Ok(outcome) => outcome.label(),
            Err(e) => e.label(),
        },
        message: reply_message(&result),
        order_id: record.order_id,
    };
    (status, Json(reply))
}

async fn process<P: WebhookProvider>(
    provider: &P,
    state: &AppState,
    config: &ProviderConfig,
    req: &WebhookRequest,
    record: &mut DeliveryRecord,
) -> Result<Reconciled, WebhookError> {
    let name = provider.provider();

    if config.webhook_secret.is_some() || config.hmac_key.is_some() {
        if let Err(e) = provider.authenticate(state, req) {
            tracing::warn!("{} webhook rejected: {}", name, e);
            return Err(e);
        }
    } else {
        tracing::warn!(
            "{} webhook secret not configured, accepting unauthenticated delivery",
            name
        );
    }

    let event = provider.parse_event(req)?;
    record.observe(&event);

    let event = provider.complete_event(state, event).await?;
    record.observe(&event);

    if event.payment_status != PaymentStatus::Confirmed {
        return Err(WebhookError::not_relevant(format!(
            "payment status {:?}",
            event.payment_status
        )));
    }

    let order_id = resolve_order_id(&event).ok_or_else(|| {
        tracing::error!(
            "CORRELATION FAILED: {} event {} payment {:?} carries no usable order id (hints={:?})",
            name,
            event.provider_event_type,
            event.provider_payment_id,
            event.correlation_hints
        );
        WebhookError::CorrelationFailed
    })?;
    record.order_id = Some(order_id.raw.clone());

    ReconciliationEngine::new(state.orders.as_ref()).reconcile(&order_id, &event)
}

fn save_record(
    state: &AppState,
    provider: Provider,
    record: &DeliveryRecord,
    result: &Result<Reconciled, WebhookError>,
    status: StatusCode,
) {
    let input = CreatePaymentNotification {
        provider: provider.as_str().to_string(),
        event_type: record
            .event_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        provider_payment_id: record.provider_payment_id.clone(),
        order_id: record.order_id.clone(),
        outcome: match result {
            Ok(outcome) => outcome.label(),
            Err(e) => e.label(),
        }
        .to_string(),
        http_status: status.as_u16(),
    };

    let saved = state
        .db
        .get()
        .map_err(crate::error::AppError::from)
        .and_then(|conn| queries::record_notification(&conn, &input));
    if let Err(e) = saved {
        tracing::warn!("Failed to record {} notification: {}", provider, e);
    }
}

// ============ JSON helpers for loosely-shaped payloads ============

/// A field that may arrive as a string or a number, as a trimmed string.
pub fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `metadata.orderId`, falling back to `metadata.order_id`.
pub fn metadata_order_id(value: &Value) -> Option<String> {
    let metadata = value.get("metadata")?;
    string_field(metadata, "orderId").or_else(|| string_field(metadata, "order_id"))
}

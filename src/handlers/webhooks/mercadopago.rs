use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde_json::Value;

use crate::db::AppState;
use crate::error::msg;
use crate::models::{BillingType, HintSource, PaymentEvent, PaymentStatus, Provider, to_cents};
use crate::payments::{MercadoPagoClient, MercadoPagoPayment};
use crate::reconcile::WebhookError;

use super::common::{WebhookProvider, WebhookRequest, handle_webhook, string_field};

/// The only notification topic that concerns payments.
const PAYMENT_TOPIC: &str = "payment";

fn map_status(status: &str) -> PaymentStatus {
    match status {
        "approved" => PaymentStatus::Confirmed,
        "pending" | "in_process" | "authorized" => PaymentStatus::Pending,
        "rejected" | "cancelled" | "refunded" | "charged_back" => PaymentStatus::Rejected,
        _ => PaymentStatus::Unknown,
    }
}

/// Notification body, or `Null` for query-string-only (IPN style) deliveries.
fn notification_body(req: &WebhookRequest) -> Result<Value, WebhookError> {
    if req.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    req.json(Provider::MercadoPago)
}

/// The payment id the notification refers to. The signed manifest uses the
/// `data.id` query parameter, so it wins over the body.
fn notification_payment_id(req: &WebhookRequest, body: &Value) -> Option<String> {
    req.query("data.id")
        .map(str::to_string)
        .or_else(|| body.get("data").and_then(|d| string_field(d, "id")))
        .or_else(|| req.query("id").map(str::to_string))
}

/// Mercado Pago webhook provider implementation.
pub struct MercadoPagoWebhookProvider;

impl WebhookProvider for MercadoPagoWebhookProvider {
    fn provider(&self) -> Provider {
        Provider::MercadoPago
    }

    fn authenticate(&self, state: &AppState, req: &WebhookRequest) -> Result<(), WebhookError> {
        let signature = req
            .header("x-signature")
            .ok_or(WebhookError::AuthenticationFailed("Missing x-signature header"))?;

        // An unparseable body cannot contribute an id; the query may still have one.
        let body = notification_body(req).unwrap_or(Value::Null);
        let data_id = notification_payment_id(req, &body);

        let client = MercadoPagoClient::new(&state.http_client, &state.providers.mercadopago);
        match client.verify_webhook_signature(signature, req.header("x-request-id"), data_id.as_deref()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(WebhookError::AuthenticationFailed("Invalid signature")),
            Err(e) => {
                tracing::debug!("Mercado Pago signature header rejected: {}", e);
                Err(WebhookError::AuthenticationFailed(msg::INVALID_SIGNATURE_FORMAT))
            }
        }
    }

    fn parse_event(&self, req: &WebhookRequest) -> Result<PaymentEvent, WebhookError> {
        let body = notification_body(req)?;

        let topic = string_field(&body, "type")
            .or_else(|| req.query("type").map(str::to_string))
            .or_else(|| req.query("topic").map(str::to_string))
            .unwrap_or_default();
        if topic != PAYMENT_TOPIC {
            return Err(WebhookError::not_relevant(format!("topic {:?}", topic)));
        }

        let payment_id = notification_payment_id(req, &body)
            .ok_or_else(|| WebhookError::not_relevant("notification without payment id"))?;

        let event_type = string_field(&body, "action").unwrap_or(topic);
        let mut event = PaymentEvent::new(Provider::MercadoPago, event_type, PaymentStatus::Unknown);
        event.provider_payment_id = Some(payment_id);
        event.hint(HintSource::QueryParam, req.query_order_id());
        Ok(event)
    }

    async fn complete_event(
        &self,
        state: &AppState,
        event: PaymentEvent,
    ) -> Result<PaymentEvent, WebhookError> {
        let client = MercadoPagoClient::new(&state.http_client, &state.providers.mercadopago);
        if !client.can_fetch() {
            tracing::warn!("Mercado Pago access token not configured, cannot look up payments");
            return Err(WebhookError::not_relevant("payment lookup unavailable"));
        }

        let Some(payment_id) = event.provider_payment_id.clone() else {
            return Err(WebhookError::not_relevant("notification without payment id"));
        };

        let payment = client.get_payment(&payment_id).await.map_err(|e| {
            tracing::warn!("Mercado Pago payment lookup failed for {}: {}", payment_id, e);
            WebhookError::not_relevant("payment lookup failed")
        })?;

        Ok(apply_payment(event, &payment))
    }
}

fn apply_payment(mut event: PaymentEvent, payment: &MercadoPagoPayment) -> PaymentEvent {
    event.payment_status = map_status(&payment.status);
    event.provider_payment_id = Some(payment.id.to_string());
    event.billing_type = payment.payment_type_id.as_deref().map(BillingType::parse);
    event.installments = payment.installments;
    event.amount_cents = payment.transaction_amount.map(to_cents);

    let metadata_order_id = payment.metadata.as_ref().and_then(|m| {
        string_field(m, "order_id").or_else(|| string_field(m, "orderId"))
    });
    event.hint(HintSource::Metadata, metadata_order_id);
    event.hint(HintSource::ExternalReference, payment.external_reference.clone());

    if event.payment_status != PaymentStatus::Confirmed {
        tracing::debug!(
            "Mercado Pago payment {} is {} ({:?})",
            payment.id,
            payment.status,
            payment.status_detail
        );
    }
    event
}

pub async fn handle_mercadopago_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(
        &MercadoPagoWebhookProvider,
        &state,
        WebhookRequest::new(headers, query, body),
    )
    .await
}

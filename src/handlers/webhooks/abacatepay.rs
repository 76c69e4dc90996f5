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
use crate::models::{BillingType, HintSource, PaymentEvent, PaymentStatus, Provider};
use crate::payments::AbacatePayVerifier;
use crate::reconcile::WebhookError;

use super::common::{WebhookProvider, WebhookRequest, handle_webhook, metadata_order_id, string_field};

/// Events that mean a charge was paid.
const PAID_EVENTS: &[&str] = &[
    "billing.paid",
    "billing.completed",
    "pix.paid",
    "pixQrCode.paid",
    "payment.paid",
    "checkout.completed",
];

/// Where the payment object can sit, outermost first. The payload shape
/// differs between billing, PIX QR code and checkout events.
const LEVELS: &[&[&str]] = &[
    &[],
    &["data"],
    &["data", "billing"],
    &["data", "pixQrCode"],
    &["data", "payment"],
];

fn level<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |v, key| v.get(key))
        .filter(|v| v.is_object())
}

fn levels(root: &Value) -> impl Iterator<Item = &Value> {
    LEVELS.iter().filter_map(move |path| level(root, path))
}

/// AbacatePay webhook provider implementation.
pub struct AbacatePayWebhookProvider;

impl WebhookProvider for AbacatePayWebhookProvider {
    fn provider(&self) -> Provider {
        Provider::AbacatePay
    }

    fn authenticate(&self, state: &AppState, req: &WebhookRequest) -> Result<(), WebhookError> {
        let verifier = AbacatePayVerifier::new(&state.providers.abacatepay);

        if verifier.has_secret() && !verifier.verify_query_secret(req.query("webhookSecret")) {
            return Err(WebhookError::AuthenticationFailed(msg::INVALID_WEBHOOK_SECRET));
        }

        if verifier.has_hmac_key() {
            let signature = req
                .header("x-webhook-signature")
                .ok_or(WebhookError::AuthenticationFailed("Missing x-webhook-signature header"))?;
            match verifier.verify_body_signature(&req.body, signature) {
                Ok(true) => {}
                Ok(false) => return Err(WebhookError::AuthenticationFailed("Invalid signature")),
                Err(e) => {
                    tracing::debug!("AbacatePay signature rejected: {}", e);
                    return Err(WebhookError::AuthenticationFailed(msg::INVALID_BASE64_SIGNATURE));
                }
            }
        }

        Ok(())
    }

    fn parse_event(&self, req: &WebhookRequest) -> Result<PaymentEvent, WebhookError> {
        let body: Value = req.json(Provider::AbacatePay)?;

        let event_type = string_field(&body, "event").unwrap_or_default();
        if !PAID_EVENTS.contains(&event_type.as_str()) {
            return Err(WebhookError::not_relevant(format!("event {:?}", event_type)));
        }

        let mut event = PaymentEvent::new(Provider::AbacatePay, event_type.as_str(), PaymentStatus::Confirmed);

        // Most specific object id wins: billing/QR code/payment over the envelope.
        event.provider_payment_id = levels(&body)
            .skip(1)
            .filter_map(|v| string_field(v, "id"))
            .last();
        event.amount_cents = levels(&body)
            .filter_map(|v| v.get("amount").and_then(Value::as_i64))
            .last();
        event.billing_type = if event_type.starts_with("pix") || level(&body, &["data", "pixQrCode"]).is_some() {
            Some(BillingType::Pix)
        } else {
            levels(&body)
                .filter_map(|v| v.get("methods")?.as_array()?.first()?.as_str().map(BillingType::parse))
                .next()
        };

        for v in levels(&body) {
            event.hint(HintSource::Metadata, metadata_order_id(v));
        }
        for v in levels(&body) {
            event.hint(HintSource::PrefixedExternalId, string_field(v, "externalId"));
        }
        event.hint(HintSource::QueryParam, req.query_order_id());

        Ok(event)
    }
}

pub async fn handle_abacatepay_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(
        &AbacatePayWebhookProvider,
        &state,
        WebhookRequest::new(headers, query, body),
    )
    .await
}

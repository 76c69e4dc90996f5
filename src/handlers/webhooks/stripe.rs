use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};

use crate::db::AppState;
use crate::error::msg;
use crate::models::{BillingType, HintSource, PaymentEvent, PaymentStatus, Provider};
use crate::payments::{StripeCheckoutSession, StripeClient, StripeWebhookEvent};
use crate::reconcile::WebhookError;

use super::common::{WebhookProvider, WebhookRequest, handle_webhook};

/// Checkout events that can carry a completed payment.
const PAYMENT_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

/// Stripe webhook provider implementation.
pub struct StripeWebhookProvider;

impl WebhookProvider for StripeWebhookProvider {
    fn provider(&self) -> Provider {
        Provider::Stripe
    }

    fn authenticate(&self, state: &AppState, req: &WebhookRequest) -> Result<(), WebhookError> {
        let signature = req
            .header("stripe-signature")
            .ok_or(WebhookError::AuthenticationFailed("Missing stripe-signature header"))?;

        let client = StripeClient::new(&state.http_client, &state.providers.stripe);
        match client.verify_webhook_signature(&req.body, signature) {
            Ok(true) => Ok(()),
            Ok(false) => Err(WebhookError::AuthenticationFailed("Invalid signature")),
            Err(e) => {
                tracing::debug!("Stripe signature header rejected: {}", e);
                Err(WebhookError::AuthenticationFailed(msg::INVALID_SIGNATURE_FORMAT))
            }
        }
    }

    fn parse_event(&self, req: &WebhookRequest) -> Result<PaymentEvent, WebhookError> {
        let event: StripeWebhookEvent = req.json(Provider::Stripe)?;

        if !PAYMENT_EVENTS.contains(&event.event_type.as_str()) {
            return Err(WebhookError::not_relevant(format!(
                "event type {}",
                event.event_type
            )));
        }

        let session: StripeCheckoutSession = serde_json::from_value(event.data.object)
            .map_err(|e| {
                tracing::warn!("Failed to parse Stripe checkout session: {}", e);
                WebhookError::not_relevant("unrecognized checkout session")
            })?;

        Ok(session_event(&event.event_type, &session, req.query_order_id()))
    }

    async fn complete_event(
        &self,
        state: &AppState,
        event: PaymentEvent,
    ) -> Result<PaymentEvent, WebhookError> {
        let has_session_hint = event
            .correlation_hints
            .iter()
            .any(|h| h.source != HintSource::QueryParam);
        if has_session_hint || event.payment_status != PaymentStatus::Confirmed {
            return Ok(event);
        }

        let client = StripeClient::new(&state.http_client, &state.providers.stripe);
        let Some(session_id) = event.provider_payment_id.clone() else {
            return Ok(event);
        };
        if !client.can_fetch() {
            return Ok(event);
        }

        tracing::debug!("Stripe session {} has no order id, re-fetching", session_id);
        let session = client.get_checkout_session(&session_id).await.map_err(|e| {
            tracing::warn!("Stripe session lookup failed for {}: {}", session_id, e);
            WebhookError::not_relevant("session lookup failed")
        })?;

        let query_hint = event
            .correlation_hints
            .iter()
            .find(|h| h.source == HintSource::QueryParam)
            .map(|h| h.value.clone());
        Ok(session_event(&event.provider_event_type, &session, query_hint))
    }
}

fn session_event(
    event_type: &str,
    session: &StripeCheckoutSession,
    query_order_id: Option<String>,
) -> PaymentEvent {
    let status = match session.payment_status.as_deref() {
        Some("paid") => PaymentStatus::Confirmed,
        Some("unpaid") => PaymentStatus::Pending,
        _ => PaymentStatus::Unknown,
    };

    let mut event = PaymentEvent::new(Provider::Stripe, event_type, status);
    event.provider_payment_id = Some(session.id.clone());
    event.amount_cents = session.amount_total;
    event.billing_type = session
        .payment_method_types
        .first()
        .map(|m| BillingType::parse(m));

    event.hint(HintSource::Metadata, session.metadata_order_id());
    event.hint(HintSource::ExternalReference, session.client_reference_id.clone());
    event.hint(HintSource::QueryParam, query_order_id);
    event
}

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(
        &StripeWebhookProvider,
        &state,
        WebhookRequest::new(headers, query, body),
    )
    .await
}

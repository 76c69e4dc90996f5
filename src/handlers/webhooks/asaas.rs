use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};

use crate::db::AppState;
use crate::models::{BillingType, HintSource, PaymentEvent, PaymentStatus, Provider, to_cents};
use crate::payments::{AsaasClient, AsaasPayment, AsaasWebhookEvent};
use crate::reconcile::WebhookError;

use super::common::{WebhookProvider, WebhookRequest, handle_webhook};

/// Events that mean the money arrived.
const CONFIRMING_EVENTS: &[&str] = &[
    "PAYMENT_RECEIVED",
    "PAYMENT_CONFIRMED",
    "PAYMENT_RECEIVED_IN_CASH",
];

/// Payment statuses that mean the same, for events such as `PAYMENT_UPDATED`.
const CONFIRMED_STATUSES: &[&str] = &["RECEIVED", "CONFIRMED", "RECEIVED_IN_CASH"];

/// Asaas webhook provider implementation.
pub struct AsaasWebhookProvider;

impl WebhookProvider for AsaasWebhookProvider {
    fn provider(&self) -> Provider {
        Provider::Asaas
    }

    fn authenticate(&self, state: &AppState, req: &WebhookRequest) -> Result<(), WebhookError> {
        let client = AsaasClient::new(&state.http_client, &state.providers.asaas);
        if client.verify_access_token(req.header("asaas-access-token")) {
            Ok(())
        } else {
            Err(WebhookError::AuthenticationFailed("Invalid access token"))
        }
    }

    fn parse_event(&self, req: &WebhookRequest) -> Result<PaymentEvent, WebhookError> {
        let event: AsaasWebhookEvent = req.json(Provider::Asaas)?;

        let payment = event
            .payment
            .ok_or_else(|| WebhookError::not_relevant(format!("{} without payment", event.event)))?;

        let confirmed = CONFIRMING_EVENTS.contains(&event.event.as_str())
            || payment
                .status
                .as_deref()
                .is_some_and(|s| CONFIRMED_STATUSES.contains(&s));
        if !confirmed {
            return Err(WebhookError::not_relevant(format!(
                "event {} with status {:?}",
                event.event, payment.status
            )));
        }

        let mut normalized = PaymentEvent::new(Provider::Asaas, event.event, PaymentStatus::Confirmed);
        apply_payment(&mut normalized, &payment);
        normalized.hint(HintSource::QueryParam, req.query_order_id());
        Ok(normalized)
    }

    async fn complete_event(
        &self,
        state: &AppState,
        mut event: PaymentEvent,
    ) -> Result<PaymentEvent, WebhookError> {
        let has_reference = event
            .correlation_hints
            .iter()
            .any(|h| h.source == HintSource::ExternalReference);
        let client = AsaasClient::new(&state.http_client, &state.providers.asaas);
        if has_reference || !client.can_fetch() {
            return Ok(event);
        }
        let Some(payment_id) = event.provider_payment_id.clone() else {
            return Ok(event);
        };

        tracing::debug!("Asaas payment {} has no externalReference, re-fetching", payment_id);
        let payment = client.get_payment(&payment_id).await.map_err(|e| {
            tracing::warn!("Asaas payment lookup failed for {}: {}", payment_id, e);
            WebhookError::not_relevant("payment lookup failed")
        })?;

        apply_payment(&mut event, &payment);
        Ok(event)
    }
}

/// Copy payment fields onto the event, keeping anything already known.
fn apply_payment(event: &mut PaymentEvent, payment: &AsaasPayment) {
    event.provider_payment_id = Some(payment.id.clone());
    if event.billing_type.is_none() {
        event.billing_type = payment.billing_type.as_deref().map(BillingType::parse);
    }
    event.installments = event.installments.or(payment.installment_count);
    event.installment_number = event.installment_number.or(payment.installment_number);
    event.amount_cents = event.amount_cents.or(payment.value.map(to_cents));
    event.hint(HintSource::ExternalReference, payment.external_reference.clone());
}

pub async fn handle_asaas_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(
        &AsaasWebhookProvider,
        &state,
        WebhookRequest::new(headers, query, body),
    )
    .await
}

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result, msg};

use super::signature::{constant_time_eq, hmac_sha256};

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
}

impl StripeClient {
    pub fn new(client: &Client, config: &ProviderConfig) -> Self {
        Self {
            client: client.clone(),
            api_base: config.api_base.clone(),
            secret_key: config.api_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    pub fn can_fetch(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Re-fetch a checkout session by id.
    pub async fn get_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::Internal("Stripe secret key not configured".into()))?;

        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .basic_auth(secret_key, None::<&str>)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Stripe response: {}", e)))
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    /// Allowed clock skew for timestamps from the future (in seconds).
    const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

    /// Check a `stripe-signature` header (`t=<ts>,v1=<hex>`) against the raw body.
    ///
    /// Malformed headers are errors; well-formed but wrong or stale signatures
    /// are `Ok(false)`.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;

        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in signature.split(',') {
            let part = part.trim();
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                // One v1 per active secret while a secret roll is in progress.
                signatures.push(s);
            }
        }

        let timestamp_str =
            timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        if signatures.is_empty() {
            return Err(AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()));
        }

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let age = chrono::Utc::now().timestamp() - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        if age < -Self::WEBHOOK_FUTURE_SKEW_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Ok(false);
        }

        let mut signed_payload = Vec::with_capacity(timestamp_str.len() + 1 + payload.len());
        signed_payload.extend_from_slice(timestamp_str.as_bytes());
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(payload);

        let expected = hex::encode(hmac_sha256(secret.as_bytes(), &signed_payload)?);
        Ok(signatures
            .iter()
            .any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes())))
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.* ============

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: Option<String>, // "paid", "unpaid", "no_payment_required"
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
}

impl StripeCheckoutSession {
    /// `metadata.orderId` or `metadata.order_id`, whichever is set.
    pub fn metadata_order_id(&self) -> Option<String> {
        let metadata = self.metadata.as_ref()?;
        metadata
            .get("orderId")
            .or_else(|| metadata.get("order_id"))
            .cloned()
    }
}

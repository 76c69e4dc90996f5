use reqwest::Client;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result, msg};

use super::signature::{constant_time_eq, hmac_sha256};

#[derive(Debug, Clone)]
pub struct MercadoPagoClient {
    client: Client,
    api_base: String,
    access_token: Option<String>,
    webhook_secret: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(client: &Client, config: &ProviderConfig) -> Self {
        Self {
            client: client.clone(),
            api_base: config.api_base.clone(),
            access_token: config.api_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    pub fn can_fetch(&self) -> bool {
        self.access_token.is_some()
    }

    /// Webhooks only carry the payment id; everything else comes from here.
    pub async fn get_payment(&self, payment_id: &str) -> Result<MercadoPagoPayment> {
        let access_token = self
            .access_token
            .as_deref()
            .ok_or_else(|| AppError::Internal("Mercado Pago access token not configured".into()))?;

        let response = self
            .client
            .get(format!("{}/v1/payments/{}", self.api_base, payment_id))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Mercado Pago API error ({}): {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::Upstream(format!("Failed to parse Mercado Pago response: {}", e))
        })
    }

    /// Check an `x-signature` header (`ts=<ts>,v1=<hex>`).
    ///
    /// The signed manifest is `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`,
    /// with any part whose value is absent left out.
    pub fn verify_webhook_signature(
        &self,
        signature: &str,
        request_id: Option<&str>,
        data_id: Option<&str>,
    ) -> Result<bool> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;

        let mut ts = None;
        let mut v1 = None;
        for part in signature.split(',') {
            let mut kv = part.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("ts"), Some(value)) => ts = Some(value.trim()),
                (Some("v1"), Some(value)) => v1 = Some(value.trim()),
                _ => {}
            }
        }

        let ts = ts.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        let v1 = v1.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;

        let manifest = signature_manifest(data_id, request_id, ts);
        let expected = hex::encode(hmac_sha256(secret.as_bytes(), manifest.as_bytes())?);
        Ok(constant_time_eq(expected.as_bytes(), v1.as_bytes()))
    }
}

pub(crate) fn signature_manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if let Some(id) = data_id.filter(|s| !s.is_empty()) {
        // Alphanumeric ids are signed lowercased.
        manifest.push_str(&format!("id:{};", id.to_lowercase()));
    }
    if let Some(rid) = request_id.filter(|s| !s.is_empty()) {
        manifest.push_str(&format!("request-id:{};", rid));
    }
    manifest.push_str(&format!("ts:{};", ts));
    manifest
}

#[derive(Debug, Clone, Deserialize)]
pub struct MercadoPagoPayment {
    pub id: i64,
    pub status: String, // "approved", "pending", "in_process", "rejected", ...
    pub status_detail: Option<String>,
    #[serde(default, deserialize_with = "super::string_or_number")]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub payment_type_id: Option<String>, // "credit_card", "ticket", "bank_transfer", ...
    pub installments: Option<u32>,
    pub transaction_amount: Option<f64>,
}

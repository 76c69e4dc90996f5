use reqwest::Client;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};

use super::signature::constant_time_eq;

#[derive(Debug, Clone)]
pub struct AsaasClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    webhook_token: Option<String>,
}

impl AsaasClient {
    pub fn new(client: &Client, config: &ProviderConfig) -> Self {
        Self {
            client: client.clone(),
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            webhook_token: config.webhook_secret.clone(),
        }
    }

    pub fn can_fetch(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<AsaasPayment> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Internal("Asaas API key not configured".into()))?;

        let response = self
            .client
            .get(format!("{}/v3/payments/{}", self.api_base, payment_id))
            .header("access_token", api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Asaas API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Asaas response: {}", e)))
    }

    /// Asaas authenticates webhooks with a static token in `asaas-access-token`.
    pub fn verify_access_token(&self, provided: Option<&str>) -> bool {
        match (self.webhook_token.as_deref(), provided) {
            (Some(expected), Some(provided)) => {
                constant_time_eq(expected.as_bytes(), provided.trim().as_bytes())
            }
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AsaasWebhookEvent {
    pub event: String,
    pub payment: Option<AsaasPayment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasPayment {
    pub id: String,
    pub status: Option<String>, // "PENDING", "RECEIVED", "CONFIRMED", "OVERDUE", ...
    #[serde(default, deserialize_with = "super::string_or_number")]
    pub external_reference: Option<String>,
    pub billing_type: Option<String>, // "PIX", "BOLETO", "CREDIT_CARD", "UNDEFINED"
    pub installment_count: Option<u32>,
    pub installment_number: Option<u32>,
    pub value: Option<f64>,
}

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result, msg};

use super::signature::{constant_time_eq, hmac_sha256};

/// AbacatePay webhook authentication.
///
/// Deliveries carry the configured secret as a `webhookSecret` query
/// parameter. When an HMAC key is also configured, the raw body must be signed
/// with it in `x-webhook-signature` (base64).
#[derive(Debug, Clone)]
pub struct AbacatePayVerifier {
    webhook_secret: Option<String>,
    hmac_key: Option<String>,
}

impl AbacatePayVerifier {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            webhook_secret: config.webhook_secret.clone(),
            hmac_key: config.hmac_key.clone(),
        }
    }

    pub fn has_secret(&self) -> bool {
        self.webhook_secret.is_some()
    }

    pub fn has_hmac_key(&self) -> bool {
        self.hmac_key.is_some()
    }

    pub fn verify_query_secret(&self, provided: Option<&str>) -> bool {
        match (self.webhook_secret.as_deref(), provided) {
            (Some(expected), Some(provided)) => {
                constant_time_eq(expected.as_bytes(), provided.as_bytes())
            }
            _ => false,
        }
    }

    pub fn verify_body_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let key = self
            .hmac_key
            .as_deref()
            .ok_or_else(|| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;

        let provided = BASE64
            .decode(signature.trim())
            .map_err(|_| AppError::BadRequest(msg::INVALID_BASE64_SIGNATURE.into()))?;
        let expected = hmac_sha256(key.as_bytes(), payload)?;
        Ok(constant_time_eq(&expected, &provided))
    }
}

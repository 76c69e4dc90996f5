use std::env;
use std::time::Duration;

use axum::http::StatusCode;

use crate::models::Provider;

/// How a provider endpoint answers the two outcomes whose "right" status code
/// depends on that provider's retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsePolicy {
    pub correlation_failed: StatusCode,
    pub order_not_found: StatusCode,
}

impl ResponsePolicy {
    /// Report both outcomes with their natural error codes (400 / 404).
    pub const STRICT: Self = Self {
        correlation_failed: StatusCode::BAD_REQUEST,
        order_not_found: StatusCode::NOT_FOUND,
    };

    /// Acknowledge both outcomes with 200 so the provider stops redelivering.
    pub const ACKNOWLEDGE: Self = Self {
        correlation_failed: StatusCode::OK,
        order_not_found: StatusCode::OK,
    };

    /// Default per provider. Mercado Pago and Asaas retry (and, for Asaas,
    /// pause the whole webhook queue) on 4xx, so they get 200.
    pub fn default_for(provider: Provider) -> Self {
        match provider {
            Provider::MercadoPago | Provider::Asaas => Self::ACKNOWLEDGE,
            Provider::Stripe | Provider::AbacatePay => Self::STRICT,
        }
    }
}

/// Credentials and knobs for a single payment processor.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Shared secret / HMAC key used to authenticate inbound webhooks.
    /// `None` means deliveries are accepted unauthenticated (logged).
    pub webhook_secret: Option<String>,
    /// Secondary HMAC key (AbacatePay body signature). Unused elsewhere.
    pub hmac_key: Option<String>,
    /// API credential for fetching full payment details when a webhook only
    /// carries an id.
    pub api_key: Option<String>,
    pub api_base: String,
    pub policy: ResponsePolicy,
}

impl ProviderConfig {
    pub fn new(provider: Provider) -> Self {
        Self {
            webhook_secret: None,
            hmac_key: None,
            api_key: None,
            api_base: provider.default_api_base().to_string(),
            policy: ResponsePolicy::default_for(provider),
        }
    }

    fn from_env(provider: Provider) -> Self {
        let prefix = provider.env_prefix();
        let defaults = ResponsePolicy::default_for(provider);

        let secret_var = match provider {
            Provider::Asaas => "ASAAS_WEBHOOK_TOKEN".to_string(),
            _ => format!("{}_WEBHOOK_SECRET", prefix),
        };
        let api_key_var = match provider {
            Provider::MercadoPago => Some("MERCADOPAGO_ACCESS_TOKEN".to_string()),
            Provider::Stripe => Some("STRIPE_SECRET_KEY".to_string()),
            Provider::Asaas => Some("ASAAS_API_KEY".to_string()),
            Provider::AbacatePay => None,
        };

        Self {
            webhook_secret: non_empty_var(&secret_var),
            hmac_key: match provider {
                Provider::AbacatePay => non_empty_var("ABACATEPAY_HMAC_KEY"),
                _ => None,
            },
            api_key: api_key_var.as_deref().and_then(non_empty_var),
            api_base: env::var(format!("{}_API_BASE", prefix))
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| provider.default_api_base().to_string()),
            policy: ResponsePolicy {
                correlation_failed: status_var(
                    &format!("{}_CORRELATION_FAILED_STATUS", prefix),
                    defaults.correlation_failed,
                ),
                order_not_found: status_var(
                    &format!("{}_ORDER_NOT_FOUND_STATUS", prefix),
                    defaults.order_not_found,
                ),
            },
        }
    }

    pub fn with_webhook_secret(mut self, secret: &str) -> Self {
        self.webhook_secret = Some(secret.to_string());
        self
    }

    pub fn with_hmac_key(mut self, key: &str) -> Self {
        self.hmac_key = Some(key.to_string());
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_policy(mut self, policy: ResponsePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Per-processor configuration, one entry per [`Provider`].
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub mercadopago: ProviderConfig,
    pub stripe: ProviderConfig,
    pub asaas: ProviderConfig,
    pub abacatepay: ProviderConfig,
    /// Bound on outbound payment-detail lookups.
    pub http_timeout: Duration,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            mercadopago: ProviderConfig::new(Provider::MercadoPago),
            stripe: ProviderConfig::new(Provider::Stripe),
            asaas: ProviderConfig::new(Provider::Asaas),
            abacatepay: ProviderConfig::new(Provider::AbacatePay),
            http_timeout: Duration::from_secs(5),
        }
    }
}

impl ProvidersConfig {
    pub fn from_env() -> Self {
        let http_timeout = env::var("PROVIDER_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(5));

        Self {
            mercadopago: ProviderConfig::from_env(Provider::MercadoPago),
            stripe: ProviderConfig::from_env(Provider::Stripe),
            asaas: ProviderConfig::from_env(Provider::Asaas),
            abacatepay: ProviderConfig::from_env(Provider::AbacatePay),
            http_timeout,
        }
    }

    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::MercadoPago => &self.mercadopago,
            Provider::Stripe => &self.stripe,
            Provider::Asaas => &self.asaas,
            Provider::AbacatePay => &self.abacatepay,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub dev_mode: bool,
    /// Days of webhook notification history kept at startup. 0 keeps everything.
    pub notification_retention_days: i64,
    pub providers: ProvidersConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TOTEM_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "totem_pay.db".to_string()),
            dev_mode,
            notification_retention_days: env::var("NOTIFICATION_RETENTION_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(90),
            providers: ProvidersConfig::from_env(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn status_var(name: &str, default: StatusCode) -> StatusCode {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u16>().ok().and_then(|c| StatusCode::from_u16(c).ok()) {
            Some(code) => code,
            None => {
                tracing::warn!("Ignoring invalid status code in {}: {:?}", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

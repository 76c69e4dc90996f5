use serde::Serialize;

/// The payment processors that send us webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    MercadoPago,
    Stripe,
    Asaas,
    AbacatePay,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::MercadoPago,
        Provider::Stripe,
        Provider::Asaas,
        Provider::AbacatePay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MercadoPago => "mercadopago",
            Self::Stripe => "stripe",
            Self::Asaas => "asaas",
            Self::AbacatePay => "abacatepay",
        }
    }

    pub(crate) fn env_prefix(&self) -> &'static str {
        match self {
            Self::MercadoPago => "MERCADOPAGO",
            Self::Stripe => "STRIPE",
            Self::Asaas => "ASAAS",
            Self::AbacatePay => "ABACATEPAY",
        }
    }

    pub(crate) fn default_api_base(&self) -> &'static str {
        match self {
            Self::MercadoPago => "https://api.mercadopago.com",
            Self::Stripe => "https://api.stripe.com",
            Self::Asaas => "https://api.asaas.com",
            Self::AbacatePay => "https://api.abacatepay.com",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mercadopago" | "mercado_pago" | "mp" => Ok(Self::MercadoPago),
            "stripe" => Ok(Self::Stripe),
            "asaas" => Ok(Self::Asaas),
            "abacatepay" | "abacate" => Ok(Self::AbacatePay),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse, provider-independent payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Confirmed,
    Pending,
    Rejected,
    Unknown,
}

/// How the customer paid. Only card payments can arrive in installments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    Pix,
    Boleto,
    CreditCard,
    DebitCard,
    Other(String),
}

impl BillingType {
    /// Normalize the billing/payment-method labels the processors use
    /// (`PIX`, `BOLETO`, `CREDIT_CARD`, `bank_transfer`, `ticket`, ...).
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pix" | "bank_transfer" => Self::Pix,
            "boleto" | "bank_slip" | "ticket" => Self::Boleto,
            "credit_card" | "creditcard" | "card" => Self::CreditCard,
            "debit_card" | "debitcard" => Self::DebitCard,
            other => Self::Other(other.to_string()),
        }
    }

    /// Single-shot methods: one notification is one completed payment.
    pub fn is_single_shot(&self) -> bool {
        matches!(self, Self::Pix | Self::Boleto)
    }
}

/// Where a candidate order id came from. Variant order is resolution priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintSource {
    /// `metadata.orderId` / `metadata.order_id` at any nesting level.
    Metadata,
    /// The processor's external reference field.
    ExternalReference,
    /// A processor-namespaced id such as `ORDER_123`.
    PrefixedExternalId,
    /// `orderId` on the webhook URL's query string.
    QueryParam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationHint {
    pub source: HintSource,
    pub value: String,
}

impl CorrelationHint {
    pub fn new(source: HintSource, value: impl Into<String>) -> Self {
        Self {
            source,
            value: value.into(),
        }
    }
}

/// A webhook delivery normalized to provider-independent terms.
///
/// Built per request and dropped at the end of it; redelivery by the provider
/// is the only retry mechanism.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    pub provider: Provider,
    /// Raw event/type string as the provider sent it.
    pub provider_event_type: String,
    pub provider_payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    /// Candidate order ids, in the order the adapter found them.
    pub correlation_hints: Vec<CorrelationHint>,
    pub billing_type: Option<BillingType>,
    pub installments: Option<u32>,
    pub installment_number: Option<u32>,
    /// Charged amount in minor units, when the payload carries one.
    pub amount_cents: Option<i64>,
}

impl PaymentEvent {
    pub fn new(provider: Provider, event_type: impl Into<String>, status: PaymentStatus) -> Self {
        Self {
            provider,
            provider_event_type: event_type.into(),
            provider_payment_id: None,
            payment_status: status,
            correlation_hints: Vec::new(),
            billing_type: None,
            installments: None,
            installment_number: None,
            amount_cents: None,
        }
    }

    pub fn hint(&mut self, source: HintSource, value: Option<String>) {
        if let Some(v) = value {
            self.correlation_hints.push(CorrelationHint::new(source, v));
        }
    }

    /// Whether this notification completes the order's payment.
    ///
    /// PIX and boleto always do. Card payments do unless this is a later
    /// installment of a multi-installment plan: the order is already paid when
    /// installment 1 lands, and the rest is bookkeeping.
    pub fn completes_payment(&self) -> bool {
        if self
            .billing_type
            .as_ref()
            .is_some_and(BillingType::is_single_shot)
        {
            return true;
        }

        let number = self.installment_number.unwrap_or(1);
        let multi = self.installments.map_or(true, |n| n > 1);
        !(number > 1 && multi)
    }
}

/// Convert a decimal amount in major units (e.g. `149.9` reais) to cents.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

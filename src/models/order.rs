use serde::{Deserialize, Serialize};

/// Key an order is stored under.
///
/// The orders table has drifted between text and integer ids over time, so the
/// same logical order may be stored as `'42'` or as `42`. The two forms are
/// distinct keys at the storage level and must both be tried on lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderKey {
    Text(String),
    Integer(i64),
}

impl OrderKey {
    /// Candidate keys for a raw correlation value, in lookup order: the value
    /// as given, then its numeric coercion when it is all digits.
    pub fn candidates(raw: &str) -> Vec<OrderKey> {
        let mut keys = vec![OrderKey::Text(raw.to_string())];
        if let Some(n) = Self::numeric(raw) {
            keys.push(OrderKey::Integer(n));
        }
        keys
    }

    fn numeric(raw: &str) -> Option<i64> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok()
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKey::Text(s) => write!(f, "{}", s),
            OrderKey::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// Lifecycle of a campaign order.
///
/// Webhooks only ever move `draft`/`pendente` to `pago`. Cancellation and
/// expiry are administrative and are read, never written, here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Pendente,
    Pago,
    Cancelado,
    Expirado,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pendente => "pendente",
            Self::Pago => "pago",
            Self::Cancelado => "cancelado",
            Self::Expirado => "expirado",
        }
    }

    /// States a confirmed payment may move to `pago`.
    pub fn accepts_payment(&self) -> bool {
        matches!(self, Self::Draft | Self::Pendente)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pendente" => Ok(Self::Pendente),
            "pago" => Ok(Self::Pago),
            "cancelado" => Ok(Self::Cancelado),
            "expirado" => Ok(Self::Expirado),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderKey,
    pub status: OrderStatus,
    /// Order total in minor units (centavos).
    pub price_cents: i64,
    /// Processor-side payment/session id, set once known.
    pub provider_payment_id: Option<String>,
    pub billing_type: Option<String>,
    pub installments: Option<i64>,
    pub installment_number: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to insert an order (used by seeding and tests; the storefront
/// creates real orders elsewhere).
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub id: OrderKey,
    pub status: OrderStatus,
    pub price_cents: i64,
    pub billing_type: Option<String>,
    pub installments: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_for_digits_include_integer() {
        assert_eq!(
            OrderKey::candidates("42"),
            vec![OrderKey::Text("42".into()), OrderKey::Integer(42)]
        );
    }

    #[test]
    fn test_candidates_for_non_digits_are_text_only() {
        assert_eq!(OrderKey::candidates("abc-1"), vec![OrderKey::Text("abc-1".into())]);
        assert_eq!(OrderKey::candidates("-5"), vec![OrderKey::Text("-5".into())]);
        assert_eq!(OrderKey::candidates("1.5"), vec![OrderKey::Text("1.5".into())]);
    }

    #[test]
    fn test_candidates_overflow_stays_text() {
        let huge = "99999999999999999999999";
        assert_eq!(OrderKey::candidates(huge), vec![OrderKey::Text(huge.into())]);
    }

    #[test]
    fn test_only_draft_and_pending_accept_payment() {
        assert!(OrderStatus::Draft.accepts_payment());
        assert!(OrderStatus::Pendente.accepts_payment());
        assert!(!OrderStatus::Pago.accepts_payment());
        assert!(!OrderStatus::Cancelado.accepts_payment());
        assert!(!OrderStatus::Expirado.accepts_payment());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for s in ["draft", "pendente", "pago", "cancelado", "expirado"] {
            let status: OrderStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert!("paid".parse::<OrderStatus>().is_err());
    }
}

//! Clients for the payment processors' APIs and webhook authentication.
//!
//! Each client is cheap to build per request: it borrows the shared
//! `reqwest::Client` (with its bounded timeout) and the provider's config.

mod abacatepay;
mod asaas;
mod mercadopago;
mod signature;
mod stripe;

pub use abacatepay::*;
pub use asaas::*;
pub use mercadopago::*;
pub use signature::{constant_time_eq, hmac_sha256};
pub use stripe::*;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reference fields that checkout code fills with either a string or a bare
/// number. Anything else reads as absent.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

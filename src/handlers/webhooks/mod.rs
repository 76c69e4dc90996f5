pub mod abacatepay;
pub mod asaas;
pub mod common;
pub mod mercadopago;
pub mod stripe;

pub use abacatepay::handle_abacatepay_webhook;
pub use asaas::handle_asaas_webhook;
pub use mercadopago::handle_mercadopago_webhook;
pub use stripe::handle_stripe_webhook;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook/mercadopago", post(handle_mercadopago_webhook))
        .route("/webhook/stripe", post(handle_stripe_webhook))
        .route("/webhook/asaas", post(handle_asaas_webhook))
        .route("/webhook/abacatepay", post(handle_abacatepay_webhook))
}

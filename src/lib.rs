//! Totem Pay - payment webhook reconciliation for campaign orders
//!
//! Receives payment notifications from Mercado Pago, Stripe, Asaas and
//! AbacatePay, normalizes them into one event model, resolves which order they
//! belong to, and moves that order to `pago` exactly once.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod reconcile;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::AppState;

/// The full HTTP surface: health, notification log, and one webhook endpoint
/// per provider.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::router())
        .merge(handlers::webhooks::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Payment reconciliation core: correlating a normalized [`PaymentEvent`] to
//! an order and driving the one-way `draft/pendente -> pago` transition.
//!
//! [`PaymentEvent`]: crate::models::PaymentEvent

mod correlation;
mod engine;
mod outcome;
mod store;

pub use correlation::{ResolvedOrderId, resolve_order_id, strip_order_prefix};
pub use engine::ReconciliationEngine;
pub use outcome::{Reconciled, WebhookError};
pub use store::{OrderStore, SqliteOrderStore};

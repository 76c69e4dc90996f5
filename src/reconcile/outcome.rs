use thiserror::Error;

use crate::error::AppError;
use crate::models::{OrderKey, OrderStatus};

/// Successful end states of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// This delivery moved the order to `pago`.
    Transitioned { order: OrderKey },
    /// The write did not show up on re-read; the forced retry fixed it.
    Recovered { order: OrderKey },
    /// The order was already `pago`; nothing was written.
    AlreadyPaid { order: OrderKey },
}

impl Reconciled {
    pub fn order(&self) -> &OrderKey {
        match self {
            Self::Transitioned { order } | Self::Recovered { order } | Self::AlreadyPaid { order } => {
                order
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Transitioned { .. } => "transitioned",
            Self::Recovered { .. } => "recovered",
            Self::AlreadyPaid { .. } => "already_paid",
        }
    }
}

/// Everything that can stop a webhook short of a successful reconciliation.
///
/// This is the internal taxonomy. The HTTP status each variant maps to is
/// decided at the webhook boundary, per provider.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature/secret configured but missing or wrong.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// Recognized but irrelevant: wrong event type, non-confirmed status,
    /// later installment, order in an administrative state.
    #[error("not relevant: {0}")]
    NotRelevant(String),

    /// No order id could be derived from the event.
    #[error("no order id could be derived from the event")]
    CorrelationFailed,

    /// The resolved id matched no order under any key form.
    #[error("order {raw} not found (tried {tried:?})")]
    OrderNotFound { raw: String, tried: Vec<OrderKey> },

    /// The write was reported applied but the order still isn't `pago` after
    /// the forced retry.
    #[error("order {order} still {observed:?} after forced update")]
    ReconciliationAnomaly {
        order: OrderKey,
        observed: Option<OrderStatus>,
    },

    /// Transport failure talking to the order store. `after_write` is set
    /// once a write may have been applied.
    #[error("order store unavailable (after_write={after_write}): {source}")]
    TransientStore {
        after_write: bool,
        #[source]
        source: AppError,
    },
}

impl WebhookError {
    pub fn not_relevant(reason: impl Into<String>) -> Self {
        Self::NotRelevant(reason.into())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::NotRelevant(_) => "ignored",
            Self::CorrelationFailed => "correlation_failed",
            Self::OrderNotFound { .. } => "order_not_found",
            Self::ReconciliationAnomaly { .. } => "reconciliation_anomaly",
            Self::TransientStore {
                after_write: false, ..
            } => "store_unavailable",
            Self::TransientStore {
                after_write: true, ..
            } => "store_failed_after_write",
        }
    }
}

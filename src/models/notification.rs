use serde::{Deserialize, Serialize};

/// One recorded webhook delivery and what we did with it.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentNotification {
    pub id: String,
    pub provider: String,
    pub event_type: String,
    pub provider_payment_id: Option<String>,
    /// Resolved order id, if correlation succeeded.
    pub order_id: Option<String>,
    /// Outcome label, e.g. "transitioned", "already_paid", "correlation_failed".
    pub outcome: String,
    pub http_status: u16,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentNotification {
    pub provider: String,
    pub event_type: String,
    pub provider_payment_id: Option<String>,
    pub order_id: Option<String>,
    pub outcome: String,
    pub http_status: u16,
}

/// Filters for listing recorded notifications.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct NotificationQuery {
    pub provider: Option<String>,
    pub order_id: Option<String>,
    pub limit: Option<i64>,
}

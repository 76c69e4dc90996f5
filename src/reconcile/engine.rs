use crate::error::AppError;
use crate::models::{Order, OrderKey, OrderStatus, PaymentEvent, PaymentStatus};

use super::correlation::ResolvedOrderId;
use super::outcome::{Reconciled, WebhookError};
use super::store::OrderStore;

/// Applies confirmed payments to orders.
///
/// The only write this performs is `draft/pendente -> pago`. It takes no lock:
/// concurrent deliveries for the same order are made safe by the idempotent
/// short-circuit on `pago` and by re-reading after every write.
pub struct ReconciliationEngine<'a> {
    store: &'a dyn OrderStore,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(store: &'a dyn OrderStore) -> Self {
        Self { store }
    }

    pub fn reconcile(
        &self,
        order_id: &ResolvedOrderId,
        event: &PaymentEvent,
    ) -> Result<Reconciled, WebhookError> {
        if event.payment_status != PaymentStatus::Confirmed {
            return Err(WebhookError::not_relevant(format!(
                "payment status {:?}",
                event.payment_status
            )));
        }

        let (key, order) = self.lookup(order_id)?;

        if order.status == OrderStatus::Pago {
            tracing::info!(
                "{} delivery for order {} already paid, nothing to do (event={}, payment={:?})",
                event.provider,
                key,
                event.provider_event_type,
                event.provider_payment_id
            );
            return Ok(Reconciled::AlreadyPaid { order: key });
        }

        if !event.completes_payment() {
            tracing::warn!(
                "{} installment {}/{} for order {} recorded, status left at {} (payment={:?})",
                event.provider,
                event.installment_number.unwrap_or(0),
                event
                    .installments
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".into()),
                key,
                order.status,
                event.provider_payment_id
            );
            return Err(WebhookError::not_relevant("later installment"));
        }

        if !order.status.accepts_payment() {
            tracing::warn!(
                "{} confirmed payment {:?} for order {} in status {}; leaving it for an admin",
                event.provider,
                event.provider_payment_id,
                key,
                order.status
            );
            return Err(WebhookError::not_relevant(format!("order is {}", order.status)));
        }

        check_amount(&order, event);

        let applied = self
            .store
            .mark_paid(&key, event.provider_payment_id.as_deref())
            .map_err(|e| after_write(&key, e))?;

        if !applied {
            tracing::warn!(
                "Conditional update for order {} matched no row; verifying current state",
                key
            );
        }

        self.verify(key, applied, event)
    }

    /// Find the order under the id as given, then under its integer form.
    fn lookup(&self, order_id: &ResolvedOrderId) -> Result<(OrderKey, Order), WebhookError> {
        let candidates = order_id.candidates();
        for key in &candidates {
            match self.store.find_order(key) {
                Ok(Some(order)) => return Ok((key.clone(), order)),
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("Order store lookup failed for {}: {}", key, e);
                    return Err(WebhookError::TransientStore {
                        after_write: false,
                        source: e,
                    });
                }
            }
        }

        tracing::error!(
            "Order not found: raw={:?} source={:?} tried={:?}",
            order_id.raw,
            order_id.source,
            candidates
        );
        Err(WebhookError::OrderNotFound {
            raw: order_id.raw.clone(),
            tried: candidates,
        })
    }

    /// Prove the write stuck. One forced status write if it didn't.
    fn verify(
        &self,
        key: OrderKey,
        applied: bool,
        event: &PaymentEvent,
    ) -> Result<Reconciled, WebhookError> {
        let observed = self.read_status(&key)?;

        match observed {
            Some(OrderStatus::Pago) if applied => {
                tracing::info!(
                    "{} payment confirmed: order={} status=pago payment={:?} event={}",
                    event.provider,
                    key,
                    event.provider_payment_id,
                    event.provider_event_type
                );
                return Ok(Reconciled::Transitioned { order: key });
            }
            Some(OrderStatus::Pago) => {
                // A concurrent delivery got there first.
                return Ok(Reconciled::AlreadyPaid { order: key });
            }
            Some(status) if !applied && !status.accepts_payment() => {
                tracing::warn!(
                    "Order {} moved to {} while {} payment {:?} was being applied",
                    key,
                    status,
                    event.provider,
                    event.provider_payment_id
                );
                return Err(WebhookError::not_relevant(format!("order is {}", status)));
            }
            Some(status) if applied && !status.accepts_payment() => {
                tracing::warn!(
                    "Order {} reads {} after the {} payment {:?} write reported success; \
                     forced update will overwrite the administrative state {}",
                    key,
                    status,
                    event.provider,
                    event.provider_payment_id,
                    status
                );
            }
            _ => {}
        }

        tracing::warn!(
            "Verification mismatch for order {}: expected pago, read {:?}; forcing status",
            key,
            observed
        );

        self.store
            .force_status(&key, OrderStatus::Pago)
            .map_err(|e| after_write(&key, e))?;

        match self.read_status(&key)? {
            Some(OrderStatus::Pago) => {
                tracing::info!(
                    "{} payment confirmed after forced update: order={} payment={:?}",
                    event.provider,
                    key,
                    event.provider_payment_id
                );
                Ok(Reconciled::Recovered { order: key })
            }
            observed => {
                tracing::error!(
                    "RECONCILIATION ANOMALY: order {} still {:?} after forced update ({} payment {:?})",
                    key,
                    observed,
                    event.provider,
                    event.provider_payment_id
                );
                Err(WebhookError::ReconciliationAnomaly {
                    order: key,
                    observed,
                })
            }
        }
    }

    fn read_status(&self, key: &OrderKey) -> Result<Option<OrderStatus>, WebhookError> {
        self.store
            .find_order(key)
            .map(|o| o.map(|o| o.status))
            .map_err(|e| after_write(key, e))
    }
}

fn after_write(key: &OrderKey, e: AppError) -> WebhookError {
    tracing::error!(
        "ALARM: order store failed after a write attempt on order {}: {}",
        key,
        e
    );
    WebhookError::TransientStore {
        after_write: true,
        source: e,
    }
}

/// Mismatched amounts are worth a look but never block the transition.
fn check_amount(order: &Order, event: &PaymentEvent) {
    if let Some(paid) = event.amount_cents {
        if paid != order.price_cents {
            tracing::warn!(
                "Amount mismatch on order {}: order price {} cents, {} reported {} cents",
                order.id,
                order.price_cents,
                event.provider,
                paid
            );
        }
    }
}

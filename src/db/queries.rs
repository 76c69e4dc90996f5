use chrono::Utc;
use rusqlite::{Connection, ToSql, params, types::Value};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{NOTIFICATION_COLS, ORDER_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn key_value(key: &OrderKey) -> Value {
    match key {
        OrderKey::Text(s) => Value::Text(s.clone()),
        OrderKey::Integer(n) => Value::Integer(*n),
    }
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query for efficiency.
struct UpdateBuilder {
    table: &'static str,
    id: Value,
    fields: Vec<(&'static str, Value)>,
    /// Raw SQL assignments that reference existing column values.
    raw_sets: Vec<(&'static str, &'static str, Value)>,
    condition: Option<&'static str>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: Value) -> Self {
        Self {
            table,
            id,
            fields: Vec::new(),
            raw_sets: Vec::new(),
            condition: None,
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// Set a column only if it is currently NULL.
    fn set_if_null<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.raw_sets.push((column, "COALESCE({col}, ?)", v.into()));
        }
        self
    }

    /// Extra predicate ANDed onto `WHERE id = ?`.
    fn only_if(mut self, condition: &'static str) -> Self {
        self.condition = Some(condition);
        self
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() && self.raw_sets.is_empty() {
            return Ok(false);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let mut sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        sets.extend(
            self.raw_sets
                .iter()
                .map(|(col, expr, _)| format!("{} = {}", col, expr.replace("{col}", col))),
        );
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.extend(self.raw_sets.into_iter().map(|(_, _, v)| v));
        values.push(self.id);
        let sql = match self.condition {
            Some(cond) => format!(
                "UPDATE {} SET {} WHERE id = ? AND ({})",
                self.table,
                sets.join(", "),
                cond
            ),
            None => format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", ")),
        };
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Orders ============

/// Insert an order. Used by dev seeding and tests; the storefront owns
/// order creation in production.
pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let now = now();
    conn.execute(
        "INSERT INTO orders (id, status, price_cents, billing_type, installments, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            &input.id,
            input.status.as_str(),
            input.price_cents,
            &input.billing_type,
            input.installments,
            now
        ],
    )?;

    Ok(Order {
        id: input.id.clone(),
        status: input.status,
        price_cents: input.price_cents,
        provider_payment_id: None,
        billing_type: input.billing_type.clone(),
        installments: input.installments,
        installment_number: None,
        created_at: now,
        updated_at: now,
    })
}

/// Point lookup by exact stored key (no text/integer coercion here).
pub fn get_order(conn: &Connection, key: &OrderKey) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[key],
    )
}

/// Move a payable order (draft/pendente) to `pago`.
///
/// Refreshes `updated_at` and records `provider_payment_id` only when none is
/// stored yet. Returns false when no row matched (missing, or no longer payable).
pub fn mark_order_paid(
    conn: &Connection,
    key: &OrderKey,
    provider_payment_id: Option<&str>,
) -> Result<bool> {
    UpdateBuilder::new("orders", key_value(key))
        .set("status", OrderStatus::Pago.as_str().to_string())
        .set_if_null("provider_payment_id", provider_payment_id.map(str::to_string))
        .with_updated_at()
        .only_if("status IN ('draft', 'pendente')")
        .execute(conn)
}

/// Unconditionally set an order's status.
pub fn force_order_status(conn: &Connection, key: &OrderKey, status: OrderStatus) -> Result<bool> {
    UpdateBuilder::new("orders", key_value(key))
        .set("status", status.as_str().to_string())
        .with_updated_at()
        .execute(conn)
}

pub fn count_orders(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
        .map_err(Into::into)
}

// ============ Payment Notifications ============

pub fn record_notification(
    conn: &Connection,
    input: &CreatePaymentNotification,
) -> Result<PaymentNotification> {
    let id = gen_id();
    let now = now();
    conn.execute(
        &format!(
            "INSERT INTO payment_notifications ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            NOTIFICATION_COLS
        ),
        params![
            &id,
            &input.provider,
            &input.event_type,
            &input.provider_payment_id,
            &input.order_id,
            &input.outcome,
            input.http_status,
            now
        ],
    )?;

    Ok(PaymentNotification {
        id,
        provider: input.provider.clone(),
        event_type: input.event_type.clone(),
        provider_payment_id: input.provider_payment_id.clone(),
        order_id: input.order_id.clone(),
        outcome: input.outcome.clone(),
        http_status: input.http_status,
        created_at: now,
    })
}

/// Most recent notifications first, optionally filtered by provider and order.
pub fn list_notifications(
    conn: &Connection,
    query: &NotificationQuery,
) -> Result<Vec<PaymentNotification>> {
    let mut sql = format!(
        "SELECT {} FROM payment_notifications WHERE 1 = 1",
        NOTIFICATION_COLS
    );
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let mut args: Vec<&dyn ToSql> = Vec::new();

    if let Some(ref provider) = query.provider {
        sql.push_str(" AND provider = ?");
        args.push(provider);
    }
    if let Some(ref order_id) = query.order_id {
        sql.push_str(" AND order_id = ?");
        args.push(order_id);
    }

    sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");
    args.push(&limit);

    query_all(conn, &sql, &args)
}

/// Delete notifications older than the retention period.
/// Returns the number of deleted records.
pub fn purge_old_notifications(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM payment_notifications WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! This module provides a `FromRow` trait that models can implement to
//! define how they are constructed from database rows, plus helper functions
//! for common query patterns.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
///
/// This provides graceful error handling instead of panicking when database
/// contains invalid enum values (from corruption, migration errors, etc.).
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    /// Construct an instance from a database row.
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ OrderKey <-> SQLite ============

// Keys bind with their own storage class so text '42' never matches integer 42.
impl ToSql for OrderKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            OrderKey::Text(s) => s.to_sql(),
            OrderKey::Integer(n) => n.to_sql(),
        }
    }
}

impl FromSql for OrderKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => Ok(OrderKey::Integer(n)),
            ValueRef::Text(t) => std::str::from_utf8(t)
                .map(|s| OrderKey::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

// ============ SQL SELECT Constants ============

pub const ORDER_COLS: &str = "id, status, price_cents, provider_payment_id, billing_type, installments, installment_number, created_at, updated_at";

pub const NOTIFICATION_COLS: &str =
    "id, provider, event_type, provider_payment_id, order_id, outcome, http_status, created_at";

// ============ FromRow Implementations ============

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            status: parse_enum(row, 1, "status")?,
            price_cents: row.get(2)?,
            provider_payment_id: row.get(3)?,
            billing_type: row.get(4)?,
            installments: row.get(5)?,
            installment_number: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for PaymentNotification {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentNotification {
            id: row.get(0)?,
            provider: row.get(1)?,
            event_type: row.get(2)?,
            provider_payment_id: row.get(3)?,
            order_id: row.get(4)?,
            outcome: row.get(5)?,
            http_status: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

use crate::db::{DbPool, queries};
use crate::error::Result;
use crate::models::{Order, OrderKey, OrderStatus};

/// Persistent order records, as seen by the reconciliation engine.
///
/// Keys are exact: `OrderKey::Text("42")` and `OrderKey::Integer(42)` are
/// different rows as far as the store is concerned. Coercion between the two
/// is the engine's job.
pub trait OrderStore: Send + Sync {
    /// Point lookup by exact key.
    fn find_order(&self, key: &OrderKey) -> Result<Option<Order>>;

    /// Conditional update to `pago` from `draft`/`pendente`. Also refreshes
    /// `updated_at` and stores `provider_payment_id` if none is set yet.
    /// Returns whether a row was updated.
    fn mark_paid(&self, key: &OrderKey, provider_payment_id: Option<&str>) -> Result<bool>;

    /// Unconditional status write (plus `updated_at`).
    fn force_status(&self, key: &OrderKey, status: OrderStatus) -> Result<bool>;
}

/// [`OrderStore`] over the service's SQLite pool.
///
/// Each call checks out its own connection and returns it immediately, so the
/// engine never holds a connection across steps.
#[derive(Clone)]
pub struct SqliteOrderStore {
    db: DbPool,
}

impl SqliteOrderStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl OrderStore for SqliteOrderStore {
    fn find_order(&self, key: &OrderKey) -> Result<Option<Order>> {
        let conn = self.db.get()?;
        queries::get_order(&conn, key)
    }

    fn mark_paid(&self, key: &OrderKey, provider_payment_id: Option<&str>) -> Result<bool> {
        let conn = self.db.get()?;
        queries::mark_order_paid(&conn, key, provider_payment_id)
    }

    fn force_status(&self, key: &OrderKey, status: OrderStatus) -> Result<bool> {
        let conn = self.db.get()?;
        queries::force_order_status(&conn, key, status)
    }
}

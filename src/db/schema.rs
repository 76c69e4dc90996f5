use rusqlite::Connection;

/// Initialize the database schema
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Orders (campaign purchases). The storefront owns creation; webhooks
        -- only move draft/pendente -> pago.
        -- id has no declared type on purpose: legacy rows hold integer ids,
        -- newer rows hold text ids, and both must keep their stored form.
        CREATE TABLE IF NOT EXISTS orders (
            id PRIMARY KEY NOT NULL,
            status TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'pendente', 'pago', 'cancelado', 'expirado')),
            price_cents INTEGER NOT NULL,
            provider_payment_id TEXT,
            billing_type TEXT,
            installments INTEGER,
            installment_number INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
        CREATE INDEX IF NOT EXISTS idx_orders_provider_payment ON orders(provider_payment_id);

        -- Every webhook delivery that reached the dispatcher, with its outcome
        CREATE TABLE IF NOT EXISTS payment_notifications (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL
                CHECK (provider IN ('mercadopago', 'stripe', 'asaas', 'abacatepay')),
            event_type TEXT NOT NULL,
            provider_payment_id TEXT,
            order_id TEXT,
            outcome TEXT NOT NULL,
            http_status INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_order ON payment_notifications(order_id);
        CREATE INDEX IF NOT EXISTS idx_notifications_created ON payment_notifications(created_at);
        "#,
    )
}

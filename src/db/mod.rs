mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::ProvidersConfig;
use crate::reconcile::OrderStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Main database pool (orders, notification log)
    pub db: DbPool,
    /// Order store the reconciliation engine reads and writes through
    pub orders: Arc<dyn OrderStore>,
    /// Per-provider secrets, API credentials and response policies
    pub providers: Arc<ProvidersConfig>,
    /// HTTP client for payment-detail lookups (bounded timeout)
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Build state backed by the SQLite order store on `db`.
    pub fn new(db: DbPool, providers: ProvidersConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(providers.http_timeout)
            .build()?;
        Ok(Self {
            orders: Arc::new(crate::reconcile::SqliteOrderStore::new(db.clone())),
            db,
            providers: Arc::new(providers),
            http_client,
        })
    }

    /// Swap the order store (tests inject stores with scripted failures).
    pub fn with_order_store(mut self, store: Arc<dyn OrderStore>) -> Self {
        self.orders = store;
        self
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}

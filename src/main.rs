use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use totem_pay::config::Config;
use totem_pay::db::{AppState, create_pool, init_db, queries};
use totem_pay::error::Result;
use totem_pay::models::{CreateOrder, OrderKey, OrderStatus};

#[derive(Parser, Debug)]
#[command(name = "totem-pay")]
#[command(about = "Payment webhook reconciliation for campaign orders")]
struct Cli {
    /// Seed the database with sample orders (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Sample orders covering both id shapes the orders table holds.
fn seed_dev_data(state: &AppState) -> Result<()> {
    let conn = state.db.get()?;

    if queries::count_orders(&conn)? > 0 {
        tracing::info!("Database already has orders, skipping seed");
        return Ok(());
    }

    let samples = [
        (OrderKey::Text("1001".into()), OrderStatus::Pendente, 4990, Some("pix"), None),
        (OrderKey::Integer(1002), OrderStatus::Draft, 14990, Some("credit_card"), Some(3)),
        (OrderKey::Text("camp-1003".into()), OrderStatus::Pendente, 2500, Some("boleto"), None),
    ];

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    for (id, status, price_cents, billing_type, installments) in samples {
        let order = queries::create_order(
            &conn,
            &CreateOrder {
                id,
                status,
                price_cents,
                billing_type: billing_type.map(str::to_string),
                installments,
            },
        )?;
        tracing::info!(
            "Order {:?}: status={} price={} cents",
            order.id,
            order.status,
            order.price_cents
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "totem_pay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    for provider in totem_pay::models::Provider::ALL {
        let provider_config = config.providers.get(provider);
        if provider_config.webhook_secret.is_none() {
            tracing::warn!(
                "{} webhook secret not set; deliveries will be accepted unauthenticated",
                provider
            );
        }
    }

    let state = AppState::new(db_pool, config.providers.clone())
        .expect("Failed to build HTTP client");

    // Purge old notification records on startup (0 = never purge)
    if config.notification_retention_days > 0 {
        match state
            .db
            .get()
            .map_err(Into::into)
            .and_then(|conn| queries::purge_old_notifications(&conn, config.notification_retention_days))
        {
            Ok(count) if count > 0 => {
                tracing::info!(
                    "Purged {} notification records older than {} days",
                    count,
                    config.notification_retention_days
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to purge old notifications: {}", e);
            }
        }
    }

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set TOTEM_ENV=dev)");
        } else if let Err(e) = seed_dev_data(&state) {
            tracing::error!("Failed to seed dev data: {}", e);
        }
    }

    let app = totem_pay::app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Totem Pay listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

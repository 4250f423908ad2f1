//! Warehouse inventory ledger - backend server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wms_ledger_backend::{
    config::{Config, StorageKind},
    create_app,
    external::StaticMasterData,
    store::{LedgerStore, MemoryLedgerStore, PgLedgerStore},
    AppState, Services,
};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "wms_server=debug,wms_ledger_backend=debug,tower_http=debug,sqlx=warn".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.ledger.storage {
        StorageKind::Memory => {
            tracing::info!("Using in-memory ledger store");
            Ok(Arc::new(MemoryLedgerStore::new()))
        }
        StorageKind::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("database.url is required for postgres storage"))?;

            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }
            Ok(Arc::new(PgLedgerStore::new(db_pool)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    init_tracing(config.log.json);

    tracing::info!("Starting warehouse inventory ledger");
    tracing::info!("Environment: {}", config.environment);

    let store = open_store(&config).await?;
    // Master data is owned by another system; the demo set stands in for it here
    let master = Arc::new(StaticMasterData::demo());
    let services = Services::new(&config, store, master);
    let state = AppState::new(config.clone(), services);

    if config.snapshot.enabled {
        let interval = Duration::from_secs(config.snapshot.interval_secs.max(1));
        state.services.reporting.clone().spawn_snapshot_task(interval);
        tracing::info!("Inventory snapshot every {:?}", interval);
    }

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

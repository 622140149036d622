pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Repository, Store};

use config::{AppConfig, StoreBackend};
use std::sync::Arc;

/// Initialize logging: `info` by default, sqlx capped at `warn`, `RUST_LOG` overrides both.
pub fn init_logging() {
    use env_logger::{Builder, Env};
    use log::LevelFilter;

    let _ = Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_env(Env::default())
        .try_init();
}

/// Serve the API on the configured address with the given store.
pub async fn serve<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    let app = routes::build_app(store, &config.application.name);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}

/// Load configuration, build the configured store and serve until shutdown.
pub async fn run_server() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}, store={:?}",
        config.server.host,
        config.server.port,
        config.store.backend
    );

    match config.store.backend {
        StoreBackend::Memory => {
            log::warn!("Using in-memory store; data is lost on shutdown");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
        StoreBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let postgres_store = PostgresStore::new(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            postgres_store.migrate().await?;

            serve(Arc::new(postgres_store), &config).await
        }
    }
}

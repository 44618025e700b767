use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use boardserver::config::{AppConfig, StorageBackend};
use boardserver::core::shared::utils::{create_conn, run_migrations};
use boardserver::main_module::run_axum_server;
use boardserver::store::{MemoryStore, PgStore, Store};
use boardserver::AppState;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let log_json = std::env::var("BOARD_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    match config.storage {
        StorageBackend::Memory => {
            info!("Using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let db = config.database.clone();
            let pool = tokio::task::spawn_blocking(move || -> Result<_> {
                let pool = create_conn(&db).context("Failed to create database pool")?;
                run_migrations(&pool).map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
                Ok(pool)
            })
            .await
            .context("Database setup task panicked")??;
            info!("Database ready, migrations applied");
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()?;
    info!(
        storage = ?config.storage,
        bind = %config.bind_address(),
        "Starting boardserver {}",
        env!("CARGO_PKG_VERSION")
    );

    let store = open_store(&config).await?;
    let state = Arc::new(AppState::new(config, store)?);

    run_axum_server(state).await?;
    info!("Server stopped");
    Ok(())
}

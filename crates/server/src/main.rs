use std::sync::Arc;

use anyhow::Context;
use server::app::{self, AppState};
use server::clients::engine::{EngineClient, MoveGenerator};
use server::config::Config;
use server::db;
use server::store::{Directory, Logs, MemoryStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let (directory, logs): (Directory, Logs) = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::pool::create_pool(url)
                .await
                .context("Failed to connect to database")?;

            tracing::info!("Running migrations...");
            db::pool::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            let store = Arc::new(db::PgStore::new(pool));
            (store.clone() as Directory, store as Logs)
        }
        None => {
            tracing::warn!("DATABASE_URL not set - games are kept in memory only");
            let store = Arc::new(MemoryStore::new());
            (store.clone() as Directory, store as Logs)
        }
    };

    let engine: Option<Arc<dyn MoveGenerator>> = match &config.engine_url {
        Some(url) => {
            let client = EngineClient::new(url, config.store_timeout * 6)
                .context("Failed to build engine client")?;
            tracing::info!("Engine configured at {url}");
            Some(Arc::new(client) as Arc<dyn MoveGenerator>)
        }
        None => {
            tracing::info!("ENGINE_URL not set - engine games disabled");
            None
        }
    };

    let state = AppState::new(config.clone(), directory, logs, engine);
    state
        .registry
        .clone()
        .spawn_sweeper(config.session_idle_ttl, config.session_sweep_interval);

    let app = app::router(&state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

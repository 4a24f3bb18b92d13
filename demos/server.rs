//! Demo server: serves the resources described in a config directory.
//!
//! Run from repo root: `cargo run --example server`
//! With `DATABASE_URL` set the PostgreSQL store is used; otherwise an in-memory
//! store is seeded from `seed.json` in the config directory, when present.

use jsonapi_bridge::{app, load_from_dir, resolve, AppState, DataStore, MemoryStore, PgStore};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jsonapi_bridge=info")),
        )
        .init();

    let config_dir = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "sample".into());
    let mut config = load_from_dir(&config_dir).await?;
    if let Ok(base_url) = std::env::var("JSONAPI_BASE_URL") {
        config.api.base_url = base_url;
    }
    let registry = Arc::new(resolve(&config)?);

    let store: Arc<dyn DataStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            Arc::new(PgStore::new(pool, Arc::clone(&registry)))
        }
        Err(_) => {
            let store = MemoryStore::new(Arc::clone(&registry));
            let seed_path = std::path::Path::new(&config_dir).join("seed.json");
            if let Ok(bytes) = tokio::fs::read(&seed_path).await {
                store.seed_from_value(serde_json::from_slice(&bytes)?)?;
                tracing::info!(path = %seed_path.display(), "seeded in-memory store");
            }
            Arc::new(store)
        }
    };

    let state = AppState::new(store, registry);
    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:1337".into());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

// src/main.rs

use std::{env, sync::Arc};

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use restroom_api::{
    app, config,
    db::{self, schema},
    services::{actor::HeaderActorResolver, users},
    store::{MemoryStore, PgStore, Store},
    AppState,
};

const DEFAULT_LOG_FILTER: &str = "info,sqlx::query=warn";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            env::var("LOG_LEVEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .and_then(|v| EnvFilter::try_new(v).ok())
        })
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let store: Arc<dyn Store> = match cfg.db_url.as_deref() {
        Some(url) => {
            let pool = db::connect(url, cfg.db_pool_max).await?;
            schema::create_schema(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data lives in memory only");
            Arc::new(MemoryStore::seeded())
        }
    };

    users::ensure_admin(store.as_ref(), &cfg.admin_username, &cfg.admin_password).await?;

    let state = AppState { store, actors: Arc::new(HeaderActorResolver) };

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("API listening on {addr}");

    axum::serve(listener, app(state).into_make_service()).await?;
    Ok(())
}

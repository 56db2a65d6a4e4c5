// src/db/mod.rs

use sqlx::{Pool, Postgres};

pub mod schema;

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Pool<Postgres>> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to PostgreSQL: {e}"))?;

    tracing::info!("connected to PostgreSQL");
    Ok(pool)
}

// src/routes/health.rs

use axum::Json;
use serde_json::{json, Value};

/// GET /health, outside `/api`. No store access.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

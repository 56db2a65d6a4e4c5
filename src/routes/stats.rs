// src/routes/stats.rs

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use super::ApiResult;
use crate::{services::stats::{self, AdminStats}, AppState};

#[derive(Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub stats: AdminStats,
}

/// GET /api/admin/stats
pub async fn admin_stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let stats = stats::admin_stats(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(StatsResponse { success: true, message: "ok".into(), stats }))
}

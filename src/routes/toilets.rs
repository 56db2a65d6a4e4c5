// src/routes/toilets.rs

use axum::{extract::State, Json};
use serde_json::json;

use super::ApiResult;
use crate::{
    models::ProblemType,
    services::{status, ServiceError},
    AppState,
};

/// GET /api/toilets
pub async fn list_toilets(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let rows = state
        .store
        .list_toilets(true)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(json!({ "success": true, "message": "ok", "data": rows })))
}

/// GET /api/toilets/status
pub async fn toilets_status(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let rows = status::toilet_statuses(state.store.as_ref()).await?;
    Ok(Json(json!({ "success": true, "message": "ok", "data": rows })))
}

/// GET /api/problem-types
pub async fn problem_types() -> Json<serde_json::Value> {
    let data: Vec<_> = ProblemType::ALL
        .iter()
        .map(|p| json!({ "id": p.code(), "label": p.label() }))
        .collect();
    Json(json!({ "success": true, "message": "ok", "data": data }))
}

// src/routes/ratings.rs

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::{
    models::{Pagination, Rating},
    services::ratings,
    AppState,
};

#[derive(Deserialize)]
pub struct CreateRatingBody {
    pub toilet_id: i64,
    pub rating: i32,
    #[serde(default)]
    pub problems: Option<Vec<i32>>,
    #[serde(default)]
    pub other_text: String,
}

#[derive(Serialize)]
pub struct RatingResponse {
    pub success: bool,
    pub message: String,
    pub id: i64,
}

#[derive(Deserialize)]
pub struct PageQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct RatingPageResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<Rating>,
    pub pagination: Pagination,
}

/// POST /api/rating
pub async fn create_rating(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<CreateRatingBody>,
) -> ApiResult<(StatusCode, Json<RatingResponse>)> {
    let problems = b.problems.unwrap_or_default();
    let rating =
        ratings::submit(state.store.as_ref(), b.toilet_id, b.rating, &problems, &b.other_text)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(RatingResponse { success: true, message: "rating saved".into(), id: rating.id }),
    ))
}

/// GET /api/ratings
pub async fn list_ratings(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let rows = ratings::list(state.store.as_ref(), None).await?;
    Ok(Json(json!({ "success": true, "message": "ok", "data": rows })))
}

/// GET /api/ratings/paginated?page=&limit=
pub async fn list_ratings_paginated(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PageQ>,
) -> ApiResult<Json<RatingPageResponse>> {
    let page = ratings::page(state.store.as_ref(), q.page, q.limit).await?;
    Ok(Json(RatingPageResponse {
        success: true,
        message: "ok".into(),
        data: page.data,
        pagination: page.pagination,
    }))
}

/// GET /api/rating/:id
pub async fn get_rating(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let row = ratings::get(state.store.as_ref(), id).await?;
    Ok(Json(json!({ "success": true, "message": "ok", "data": row })))
}

/// GET /api/toilet/:toilet_id/ratings
pub async fn toilet_ratings(
    State(state): State<AppState>,
    ApiPath(toilet_id): ApiPath<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let rows = ratings::list(state.store.as_ref(), Some(toilet_id)).await?;
    Ok(Json(json!({
        "success": true,
        "message": "ok",
        "toilet_id": toilet_id,
        "count": rows.len(),
        "data": rows,
    })))
}

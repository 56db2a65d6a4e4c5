// src/routes/cleaning.rs

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::{
    models::{CleaningTask, TaskFilter},
    services::lifecycle,
    AppState,
};

#[derive(Deserialize)]
pub struct StartBody {
    pub toilet_id: i64,
}

#[derive(Serialize)]
pub struct CleaningTaskResponse {
    pub success: bool,
    pub message: String,
    pub task: CleaningTask,
}

fn task_response(message: &str, task: CleaningTask) -> Json<CleaningTaskResponse> {
    Json(CleaningTaskResponse { success: true, message: message.into(), task })
}

/// POST /api/cleaning/start
pub async fn start_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(b): ApiJson<StartBody>,
) -> ApiResult<(StatusCode, Json<CleaningTaskResponse>)> {
    let actor = state.actors.resolve(&headers)?;
    let task = lifecycle::start(state.store.as_ref(), b.toilet_id, &actor).await?;
    Ok((StatusCode::CREATED, task_response("cleaning task created", task)))
}

/// PUT /api/cleaning/begin/:id
pub async fn begin_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<CleaningTaskResponse>> {
    let task = lifecycle::begin(state.store.as_ref(), id).await?;
    Ok(task_response("cleaning started", task))
}

/// PUT /api/cleaning/complete/:id
pub async fn complete_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<CleaningTaskResponse>> {
    let task = lifecycle::complete(state.store.as_ref(), id).await?;
    Ok(task_response("cleaning completed", task))
}

/// GET /api/cleaning/tasks?status=&toilet_id=
pub async fn list_tasks(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<TaskFilter>,
) -> ApiResult<Json<serde_json::Value>> {
    let rows = lifecycle::list_tasks(state.store.as_ref(), q).await?;
    Ok(Json(json!({ "success": true, "message": "ok", "data": rows })))
}

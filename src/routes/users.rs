// src/routes/users.rs

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use super::{ApiJson, ApiPath, ApiResult};
use crate::{
    models::User,
    services::users::{self, CreateUserRequest, UpdateUserRequest},
    AppState,
};

#[derive(Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub message: String,
    pub users: Vec<User>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

fn user_response(message: &str, user: Option<User>) -> Json<UserResponse> {
    Json(UserResponse { success: true, message: message.into(), user })
}

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UsersResponse>> {
    let rows = users::list(state.store.as_ref()).await?;
    Ok(Json(UsersResponse { success: true, message: "ok".into(), users: rows }))
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = users::create(state.store.as_ref(), b).await?;
    Ok((StatusCode::CREATED, user_response("user created", Some(user))))
}

/// PUT /api/admin/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(b): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = users::update(state.store.as_ref(), id, b).await?;
    Ok(user_response("user updated", Some(user)))
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<UserResponse>> {
    users::delete(state.store.as_ref(), id).await?;
    Ok(user_response("user deleted", None))
}

// src/routes/auth.rs

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{ApiJson, ApiResult};
use crate::{models::User, services::users, AppState};

#[derive(Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: User,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(b): ApiJson<LoginBody>,
) -> ApiResult<Json<LoginResponse>> {
    let user = users::verify_credentials(state.store.as_ref(), &b.username, &b.password).await?;
    tracing::info!(user_id = user.id, "login");

    Ok(Json(LoginResponse {
        success: true,
        message: "login successful".into(),
        token: users::session_token(&user.username),
        user,
    }))
}

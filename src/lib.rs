// src/lib.rs

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use services::actor::ActorResolver;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub actors: Arc<dyn ActorResolver>,
}

/// Any OPTIONS request ends as an empty 204, preflight or not.
async fn options_no_content(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }
    let (mut parts, _) = next.run(req).await.into_parts();
    parts.status = StatusCode::NO_CONTENT;
    Response::from_parts(parts, axum::body::Body::empty()).into_response()
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health))
        // auth
        .route("/api/login", post(routes::auth::login))
        // ratings
        .route("/api/rating", post(routes::ratings::create_rating))
        .route("/api/rating/:id", get(routes::ratings::get_rating))
        .route("/api/ratings", get(routes::ratings::list_ratings))
        .route("/api/ratings/paginated", get(routes::ratings::list_ratings_paginated))
        .route("/api/toilet/:toilet_id/ratings", get(routes::ratings::toilet_ratings))
        // toilets
        .route("/api/toilets", get(routes::toilets::list_toilets))
        .route("/api/toilets/status", get(routes::toilets::toilets_status))
        .route("/api/problem-types", get(routes::toilets::problem_types))
        // cleaning
        .route("/api/cleaning/start", post(routes::cleaning::start_task))
        .route("/api/cleaning/begin/:id", put(routes::cleaning::begin_task))
        .route("/api/cleaning/complete/:id", put(routes::cleaning::complete_task))
        .route("/api/cleaning/tasks", get(routes::cleaning::list_tasks))
        // admin
        .route(
            "/api/admin/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/api/admin/users/:id",
            put(routes::users::update_user).delete(routes::users::delete_user),
        )
        .route("/api/admin/stats", get(routes::stats::admin_stats))
        // state & middleware
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(options_no_content))
        .layer(TraceLayer::new_for_http())
}

// src/store/mod.rs

//! Persistence collaborator.
//!
//! Every component talks to storage through [`Store`]. Two backends exist:
//! [`PgStore`] over a PostgreSQL pool and [`MemoryStore`] for tests and
//! database-less runs. Handles are built once in `main` and shared behind an
//! `Arc<dyn Store>`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    CleanerTaskMetrics, CleaningTask, NewCleaningTask, NewRating, NewUser, Rating,
    RatingAggregate, TaskFilter, Toilet, User, UserChanges, UserRole,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A uniqueness guarantee held by the backend rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Windows for the per-cleaner rollup, all anchored at request time.
#[derive(Debug, Clone, Copy)]
pub struct MetricWindows {
    pub last_week: DateTime<Utc>,
    pub last_month: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // toilets
    async fn list_toilets(&self, active_only: bool) -> StoreResult<Vec<Toilet>>;
    /// (total, active)
    async fn count_toilets(&self) -> StoreResult<(i64, i64)>;

    // ratings
    async fn insert_rating(&self, rating: NewRating) -> StoreResult<Rating>;
    async fn find_rating(&self, id: i64) -> StoreResult<Option<Rating>>;
    async fn list_ratings(&self, toilet_id: Option<i64>) -> StoreResult<Vec<Rating>>;
    /// Newest first. Returns the page and the unpaged total.
    async fn page_ratings(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Rating>, i64)>;
    /// `None` aggregates over every rating.
    async fn rating_aggregate(&self, toilet_id: Option<i64>) -> StoreResult<RatingAggregate>;
    async fn latest_ratings(&self, toilet_ids: &[i64]) -> StoreResult<HashMap<i64, Rating>>;
    async fn rating_aggregates(
        &self,
        toilet_ids: &[i64],
    ) -> StoreResult<HashMap<i64, RatingAggregate>>;
    /// Distinct toilets with a non-empty problem list reported after `since`.
    async fn count_toilets_with_problems(&self, since: DateTime<Utc>) -> StoreResult<i64>;

    // cleaning tasks
    async fn find_active_task(&self, toilet_id: i64) -> StoreResult<Option<CleaningTask>>;
    async fn active_tasks(&self, toilet_ids: &[i64]) -> StoreResult<HashMap<i64, CleaningTask>>;
    /// Fails with [`StoreError::UniqueViolation`] when the toilet already has
    /// an active task and the backend enforces it.
    async fn insert_task(&self, task: NewCleaningTask) -> StoreResult<CleaningTask>;
    async fn find_task(&self, id: i64) -> StoreResult<Option<CleaningTask>>;
    async fn save_task(&self, task: &CleaningTask) -> StoreResult<CleaningTask>;
    /// Persists the completed task and inserts `rating` in one transaction.
    async fn complete_task(
        &self,
        task: &CleaningTask,
        rating: NewRating,
    ) -> StoreResult<CleaningTask>;
    async fn list_tasks(&self, filter: TaskFilter) -> StoreResult<Vec<CleaningTask>>;
    async fn count_completed_since(&self, since: DateTime<Utc>) -> StoreResult<i64>;
    async fn count_active_tasks(&self) -> StoreResult<i64>;
    async fn cleaner_metrics(
        &self,
        windows: MetricWindows,
    ) -> StoreResult<HashMap<i64, CleanerTaskMetrics>>;

    // users
    async fn list_users(&self, role: Option<UserRole>) -> StoreResult<Vec<User>>;
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>>;
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;
    /// (total, active) for one role.
    async fn count_users(&self, role: UserRole) -> StoreResult<(i64, i64)>;
}

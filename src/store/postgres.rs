// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, query_scalar, PgPool};

use super::{MetricWindows, Store, StoreError, StoreResult};
use crate::models::{
    CleanerTaskMetrics, CleaningTask, NewCleaningTask, NewRating, NewUser, Rating,
    RatingAggregate, TaskFilter, Toilet, User, UserChanges, UserRole,
};

const RATING_COLS: &str = "id, toilet_id, rating, problems, other_text, created_at, updated_at";
const TASK_COLS: &str =
    "id, toilet_id, cleaner_id, cleaner_name, status, started_at, completed_at, created_at, updated_at";
const USER_COLS: &str = "id, username, password_hash, name, role, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// Unique violations carry meaning for callers (duplicate active task,
// duplicate username); everything else is an opaque database failure.
fn map_unique(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(db.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PgStore {
    async fn list_toilets(&self, active_only: bool) -> StoreResult<Vec<Toilet>> {
        let rows = if active_only {
            query_as::<_, Toilet>(
                r#"SELECT id, name, location, is_active FROM public.toilets WHERE is_active ORDER BY id"#,
            )
            .fetch_all(&self.pool)
            .await?
        } else {
            query_as::<_, Toilet>(r#"SELECT id, name, location, is_active FROM public.toilets ORDER BY id"#)
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows)
    }

    async fn count_toilets(&self) -> StoreResult<(i64, i64)> {
        let counts = query_as::<_, (i64, i64)>(
            r#"SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM public.toilets"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn insert_rating(&self, r: NewRating) -> StoreResult<Rating> {
        let sql = format!(
            r#"INSERT INTO public.ratings (toilet_id, rating, problems, other_text, created_at, updated_at)
               VALUES ($1,$2,$3,$4,$5,$5)
               RETURNING {RATING_COLS}"#
        );
        let row = query_as::<_, Rating>(&sql)
            .bind(r.toilet_id)
            .bind(r.rating)
            .bind(r.problems)
            .bind(r.other_text)
            .bind(r.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_rating(&self, id: i64) -> StoreResult<Option<Rating>> {
        let sql = format!("SELECT {RATING_COLS} FROM public.ratings WHERE id = $1");
        let row = query_as::<_, Rating>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    async fn list_ratings(&self, toilet_id: Option<i64>) -> StoreResult<Vec<Rating>> {
        let sql = format!(
            r#"SELECT {RATING_COLS} FROM public.ratings
               WHERE ($1::bigint IS NULL OR toilet_id = $1)
               ORDER BY id"#
        );
        let rows = query_as::<_, Rating>(&sql).bind(toilet_id).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn page_ratings(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Rating>, i64)> {
        let total: i64 = query_scalar(r#"SELECT COUNT(*) FROM public.ratings"#)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            r#"SELECT {RATING_COLS} FROM public.ratings
               ORDER BY created_at DESC, id DESC
               LIMIT $1 OFFSET $2"#
        );
        let rows = query_as::<_, Rating>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok((rows, total))
    }

    async fn rating_aggregate(&self, toilet_id: Option<i64>) -> StoreResult<RatingAggregate> {
        let agg = query_as::<_, RatingAggregate>(
            r#"SELECT COALESCE(AVG(rating), 0)::float8 AS average, COUNT(*) AS count
               FROM public.ratings
               WHERE ($1::bigint IS NULL OR toilet_id = $1)"#,
        )
        .bind(toilet_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(agg)
    }

    async fn latest_ratings(&self, toilet_ids: &[i64]) -> StoreResult<HashMap<i64, Rating>> {
        let sql = format!(
            r#"SELECT DISTINCT ON (toilet_id) {RATING_COLS}
               FROM public.ratings
               WHERE toilet_id = ANY($1)
               ORDER BY toilet_id, created_at DESC, id DESC"#
        );
        let rows = query_as::<_, Rating>(&sql)
            .bind(toilet_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| (r.toilet_id, r)).collect())
    }

    async fn rating_aggregates(
        &self,
        toilet_ids: &[i64],
    ) -> StoreResult<HashMap<i64, RatingAggregate>> {
        let rows = query_as::<_, (i64, f64, i64)>(
            r#"SELECT toilet_id, COALESCE(AVG(rating), 0)::float8, COUNT(*)
               FROM public.ratings
               WHERE toilet_id = ANY($1)
               GROUP BY toilet_id"#,
        )
        .bind(toilet_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, average, count)| (id, RatingAggregate { average, count }))
            .collect())
    }

    async fn count_toilets_with_problems(&self, since: DateTime<Utc>) -> StoreResult<i64> {
        let n: i64 = query_scalar(
            r#"SELECT COUNT(DISTINCT toilet_id) FROM public.ratings
               WHERE problems IS NOT NULL AND problems <> '' AND problems <> '[]'
                 AND created_at > $1"#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    async fn find_active_task(&self, toilet_id: i64) -> StoreResult<Option<CleaningTask>> {
        let sql = format!(
            r#"SELECT {TASK_COLS} FROM public.cleaning_tasks
               WHERE toilet_id = $1 AND status IN ('assigned','in_progress')
               ORDER BY created_at DESC
               LIMIT 1"#
        );
        let row = query_as::<_, CleaningTask>(&sql)
            .bind(toilet_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn active_tasks(&self, toilet_ids: &[i64]) -> StoreResult<HashMap<i64, CleaningTask>> {
        let sql = format!(
            r#"SELECT DISTINCT ON (toilet_id) {TASK_COLS}
               FROM public.cleaning_tasks
               WHERE toilet_id = ANY($1) AND status IN ('assigned','in_progress')
               ORDER BY toilet_id, created_at DESC"#
        );
        let rows = query_as::<_, CleaningTask>(&sql)
            .bind(toilet_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|t| (t.toilet_id, t)).collect())
    }

    async fn insert_task(&self, t: NewCleaningTask) -> StoreResult<CleaningTask> {
        let sql = format!(
            r#"INSERT INTO public.cleaning_tasks
                 (toilet_id, cleaner_id, cleaner_name, status, started_at, completed_at, created_at, updated_at)
               VALUES ($1,$2,$3,'assigned',NULL,NULL,$4,$4)
               RETURNING {TASK_COLS}"#
        );
        query_as::<_, CleaningTask>(&sql)
            .bind(t.toilet_id)
            .bind(t.cleaner_id)
            .bind(t.cleaner_name)
            .bind(t.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique)
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<CleaningTask>> {
        let sql = format!("SELECT {TASK_COLS} FROM public.cleaning_tasks WHERE id = $1");
        let row = query_as::<_, CleaningTask>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    async fn save_task(&self, t: &CleaningTask) -> StoreResult<CleaningTask> {
        let sql = format!(
            r#"UPDATE public.cleaning_tasks
                  SET status = $2, started_at = $3, completed_at = $4, updated_at = $5
                WHERE id = $1
               RETURNING {TASK_COLS}"#
        );
        query_as::<_, CleaningTask>(&sql)
            .bind(t.id)
            .bind(t.status.as_str())
            .bind(t.started_at)
            .bind(t.completed_at)
            .bind(t.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique)
    }

    async fn complete_task(
        &self,
        t: &CleaningTask,
        rating: NewRating,
    ) -> StoreResult<CleaningTask> {
        // Dropping `tx` on an early return rolls both writes back.
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"UPDATE public.cleaning_tasks
                  SET status = $2, started_at = $3, completed_at = $4, updated_at = $5
                WHERE id = $1
               RETURNING {TASK_COLS}"#
        );
        let saved = query_as::<_, CleaningTask>(&sql)
            .bind(t.id)
            .bind(t.status.as_str())
            .bind(t.started_at)
            .bind(t.completed_at)
            .bind(t.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        query(
            r#"INSERT INTO public.ratings (toilet_id, rating, problems, other_text, created_at, updated_at)
               VALUES ($1,$2,$3,$4,$5,$5)"#,
        )
        .bind(rating.toilet_id)
        .bind(rating.rating)
        .bind(rating.problems)
        .bind(rating.other_text)
        .bind(rating.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn list_tasks(&self, f: TaskFilter) -> StoreResult<Vec<CleaningTask>> {
        let sql = format!(
            r#"SELECT {TASK_COLS} FROM public.cleaning_tasks
               WHERE ($1::text IS NULL OR status = $1)
                 AND ($2::bigint IS NULL OR toilet_id = $2)
               ORDER BY created_at DESC, id DESC"#
        );
        let rows = query_as::<_, CleaningTask>(&sql)
            .bind(f.status.map(|s| s.as_str()))
            .bind(f.toilet_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_completed_since(&self, since: DateTime<Utc>) -> StoreResult<i64> {
        let n: i64 = query_scalar(
            r#"SELECT COUNT(*) FROM public.cleaning_tasks
               WHERE status = 'completed' AND completed_at >= $1"#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    async fn count_active_tasks(&self) -> StoreResult<i64> {
        let n: i64 = query_scalar(
            r#"SELECT COUNT(*) FROM public.cleaning_tasks WHERE status IN ('assigned','in_progress')"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    async fn cleaner_metrics(
        &self,
        w: MetricWindows,
    ) -> StoreResult<HashMap<i64, CleanerTaskMetrics>> {
        let rows = query_as::<_, CleanerTaskMetrics>(
            r#"
            WITH spans AS (
                SELECT cleaner_id, status, completed_at,
                       CASE WHEN status = 'completed'
                                 AND started_at IS NOT NULL AND completed_at IS NOT NULL
                            THEN TRUNC(EXTRACT(EPOCH FROM (completed_at - started_at)) / 60)::float8
                       END AS minutes
                  FROM public.cleaning_tasks
            )
            SELECT cleaner_id,
                   COUNT(*) FILTER (WHERE status = 'completed')                        AS completed,
                   AVG(minutes)                                                       AS avg_minutes,
                   MIN(minutes)                                                       AS min_minutes,
                   MAX(minutes)                                                       AS max_minutes,
                   SUM(minutes)                                                       AS total_minutes,
                   COUNT(*) FILTER (WHERE status = 'completed' AND completed_at >= $1) AS last_week,
                   COUNT(*) FILTER (WHERE status = 'completed' AND completed_at >= $2) AS last_month,
                   COUNT(*) FILTER (WHERE status IN ('assigned','in_progress'))       AS ongoing
              FROM spans
             GROUP BY cleaner_id
            "#,
        )
        .bind(w.last_week)
        .bind(w.last_month)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|m| (m.cleaner_id, m)).collect())
    }

    async fn list_users(&self, role: Option<UserRole>) -> StoreResult<Vec<User>> {
        let sql = format!(
            r#"SELECT {USER_COLS} FROM public.users
               WHERE ($1::text IS NULL OR role = $1)
               ORDER BY id"#
        );
        let rows = query_as::<_, User>(&sql)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLS} FROM public.users WHERE id = $1");
        let row = query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLS} FROM public.users WHERE username = $1");
        let row = query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_user(&self, u: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"INSERT INTO public.users (username, password_hash, name, role)
               VALUES ($1,$2,$3,$4)
               RETURNING {USER_COLS}"#
        );
        query_as::<_, User>(&sql)
            .bind(u.username)
            .bind(u.password_hash)
            .bind(u.name)
            .bind(u.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique)
    }

    async fn update_user(&self, id: i64, c: UserChanges) -> StoreResult<Option<User>> {
        let sql = format!(
            r#"UPDATE public.users SET
                 username      = COALESCE($2, username),
                 password_hash = COALESCE($3, password_hash),
                 name          = COALESCE($4, name),
                 role          = COALESCE($5, role),
                 is_active     = COALESCE($6, is_active),
                 updated_at    = now()
               WHERE id = $1
               RETURNING {USER_COLS}"#
        );
        query_as::<_, User>(&sql)
            .bind(id)
            .bind(c.username)
            .bind(c.password_hash)
            .bind(c.name)
            .bind(c.role.map(|r| r.as_str()))
            .bind(c.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let res = query(r#"DELETE FROM public.users WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_users(&self, role: UserRole) -> StoreResult<(i64, i64)> {
        let counts = query_as::<_, (i64, i64)>(
            r#"SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM public.users WHERE role = $1"#,
        )
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }
}

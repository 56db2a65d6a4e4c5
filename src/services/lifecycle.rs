// src/services/lifecycle.rs

//! Cleaning-task state machine: `assigned → in_progress → completed`.
//!
//! `complete` may also be called straight from `assigned`, in which case the
//! start time is backfilled with the completion time. Completion writes a
//! synthetic five-star, problem-free rating in the same transaction so the
//! toilet reads as clean the moment the task closes.

use chrono::Utc;

use super::actor::Actor;
use super::{ServiceError, ServiceResult};
use crate::models::{encode_problems, CleaningTask, NewCleaningTask, NewRating, TaskFilter};
use crate::store::{Store, StoreError};

pub const CLEAN_SCORE: i32 = 5;

fn active_conflict() -> ServiceError {
    ServiceError::Conflict("this toilet already has an active cleaning task".into())
}

fn task_not_found() -> ServiceError {
    ServiceError::NotFound("cleaning task not found".into())
}

/// Assign a new task to `actor`. Rejected while the toilet has an active one.
pub async fn start(store: &dyn Store, toilet_id: i64, actor: &Actor) -> ServiceResult<CleaningTask> {
    if toilet_id < 1 {
        return Err(ServiceError::Validation("toilet_id must be a positive integer".into()));
    }

    if let Some(existing) = store.find_active_task(toilet_id).await? {
        tracing::warn!(toilet_id, task_id = existing.id, "active task already exists");
        return Err(active_conflict());
    }

    let task = store
        .insert_task(NewCleaningTask {
            toilet_id,
            cleaner_id: actor.id,
            cleaner_name: actor.name.clone(),
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| match e {
            // lost the race against a concurrent start for the same toilet
            StoreError::UniqueViolation(_) => active_conflict(),
            other => other.into(),
        })?;

    tracing::info!(task_id = task.id, toilet_id, cleaner_id = actor.id, "cleaning task assigned");
    Ok(task)
}

/// Move a task to `in_progress`. The start time is reset on every call,
/// including on tasks already in progress or completed.
pub async fn begin(store: &dyn Store, task_id: i64) -> ServiceResult<CleaningTask> {
    let mut task = store.find_task(task_id).await?.ok_or_else(task_not_found)?;

    task.mark_in_progress(Utc::now());
    let saved = store.save_task(&task).await.map_err(|e| match e {
        StoreError::UniqueViolation(_) => active_conflict(),
        other => other.into(),
    })?;

    tracing::info!(task_id, toilet_id = saved.toilet_id, "cleaning task in progress");
    Ok(saved)
}

/// Close a task and record the synthetic clean rating atomically.
pub async fn complete(store: &dyn Store, task_id: i64) -> ServiceResult<CleaningTask> {
    let mut task = store.find_task(task_id).await?.ok_or_else(task_not_found)?;

    let now = Utc::now();
    task.mark_completed(now);

    let clean = NewRating {
        toilet_id: task.toilet_id,
        rating: CLEAN_SCORE,
        problems: encode_problems(&[]),
        other_text: String::new(),
        created_at: now,
    };

    let saved = store.complete_task(&task, clean).await.map_err(|e| {
        tracing::error!(task_id, error = %e, "completion rolled back");
        ServiceError::from(e)
    })?;

    tracing::info!(
        task_id,
        toilet_id = saved.toilet_id,
        minutes = saved.cleaning_minutes(),
        "cleaning task completed"
    );
    Ok(saved)
}

/// Newest first, optionally narrowed by status and/or toilet.
pub async fn list_tasks(store: &dyn Store, filter: TaskFilter) -> ServiceResult<Vec<CleaningTask>> {
    Ok(store.list_tasks(filter).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::store::MemoryStore;

    fn cleaner() -> Actor {
        Actor { id: 2, name: "Ayse".into() }
    }

    #[tokio::test]
    async fn start_creates_assigned_task_without_times() {
        let store = MemoryStore::seeded();
        let t = start(&store, 1, &cleaner()).await.unwrap();
        assert_eq!(t.status, TaskStatus::Assigned);
        assert_eq!(t.cleaner_id, 2);
        assert_eq!(t.cleaner_name, "Ayse");
        assert!(t.started_at.is_none() && t.completed_at.is_none());
    }

    #[tokio::test]
    async fn second_start_conflicts_until_completed() {
        let store = MemoryStore::seeded();
        let first = start(&store, 1, &cleaner()).await.unwrap();
        assert!(matches!(start(&store, 1, &cleaner()).await, Err(ServiceError::Conflict(_))));

        begin(&store, first.id).await.unwrap();
        assert!(matches!(start(&store, 1, &cleaner()).await, Err(ServiceError::Conflict(_))));

        // other toilets are unaffected
        start(&store, 2, &cleaner()).await.unwrap();

        complete(&store, first.id).await.unwrap();
        start(&store, 1, &cleaner()).await.unwrap();
    }

    #[tokio::test]
    async fn begin_then_complete_orders_timestamps() {
        let store = MemoryStore::seeded();
        let t = start(&store, 3, &cleaner()).await.unwrap();
        let begun = begin(&store, t.id).await.unwrap();
        assert_eq!(begun.status, TaskStatus::InProgress);

        let done = complete(&store, t.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.started_at, begun.started_at);
        assert!(done.started_at.unwrap() <= done.completed_at.unwrap());
    }

    #[tokio::test]
    async fn complete_from_assigned_backfills_start() {
        let store = MemoryStore::seeded();
        let t = start(&store, 3, &cleaner()).await.unwrap();
        let done = complete(&store, t.id).await.unwrap();
        assert_eq!(done.started_at, done.completed_at);
    }

    #[tokio::test]
    async fn completion_writes_one_clean_rating() {
        let store = MemoryStore::seeded();
        let t = start(&store, 5, &cleaner()).await.unwrap();
        let done = complete(&store, t.id).await.unwrap();

        let ratings = store.list_ratings(Some(5)).await.unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].rating, CLEAN_SCORE);
        assert!(ratings[0].problem_codes().is_empty());
        assert_eq!(ratings[0].other_text, "");
        assert_eq!(Some(ratings[0].created_at), done.completed_at);
    }

    #[tokio::test]
    async fn failed_completion_is_invisible() {
        let store = MemoryStore::seeded();
        let t = start(&store, 5, &cleaner()).await.unwrap();
        store.fail_rating_writes(true);

        assert!(matches!(complete(&store, t.id).await, Err(ServiceError::Internal(_))));

        let after = store.find_task(t.id).await.unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Assigned);
        assert!(after.completed_at.is_none());
        assert!(store.list_ratings(Some(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_task_ids_are_not_found() {
        let store = MemoryStore::seeded();
        assert!(matches!(begin(&store, 77).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(complete(&store, 77).await, Err(ServiceError::NotFound(_))));
        assert!(store.list_ratings(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn begin_on_completed_task_reopens_it() {
        let store = MemoryStore::seeded();
        let t = start(&store, 6, &cleaner()).await.unwrap();
        let done = complete(&store, t.id).await.unwrap();

        let again = begin(&store, t.id).await.unwrap();
        assert_eq!(again.status, TaskStatus::InProgress);
        assert!(again.started_at >= done.started_at);
        assert_eq!(again.completed_at, done.completed_at);
    }

    #[tokio::test]
    async fn reopening_conflicts_with_newer_active_task() {
        let store = MemoryStore::seeded();
        let old = start(&store, 6, &cleaner()).await.unwrap();
        complete(&store, old.id).await.unwrap();
        let current = start(&store, 6, &cleaner()).await.unwrap();

        assert!(matches!(begin(&store, old.id).await, Err(ServiceError::Conflict(_))));
        let kept = store.find_task(old.id).await.unwrap().unwrap();
        assert_eq!(kept.status, TaskStatus::Completed);
        assert_eq!(
            store.find_active_task(6).await.unwrap().map(|t| t.id),
            Some(current.id)
        );
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let store = MemoryStore::seeded();
        let a = start(&store, 1, &cleaner()).await.unwrap();
        let b = start(&store, 2, &cleaner()).await.unwrap();
        complete(&store, a.id).await.unwrap();

        let all = list_tasks(&store, TaskFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let done = list_tasks(
            &store,
            TaskFilter { status: Some(TaskStatus::Completed), toilet_id: None },
        )
        .await
        .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, a.id);

        let t2 = list_tasks(&store, TaskFilter { status: None, toilet_id: Some(2) }).await.unwrap();
        assert_eq!(t2.len(), 1);
        assert_eq!(t2[0].id, b.id);
    }

    #[tokio::test]
    async fn invalid_toilet_id_rejected() {
        let store = MemoryStore::seeded();
        assert!(matches!(start(&store, 0, &cleaner()).await, Err(ServiceError::Validation(_))));
    }
}

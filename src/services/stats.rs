// src/services/stats.rs

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::ServiceResult;
use crate::models::{CleanerStats, CleanerTaskMetrics, SystemStats, User, UserRole};
use crate::store::{MetricWindows, Store};

/// Reported for duration metrics when a cleaner has no completed task with
/// both timestamps. A real zero-minute cleaning stays 0.
pub const NO_MEASUREMENT: f64 = -1.0;

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub system_stats: SystemStats,
    pub cleaner_stats: Vec<CleanerStats>,
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .unwrap_or(now)
}

pub async fn system_stats(store: &dyn Store, now: DateTime<Utc>) -> ServiceResult<SystemStats> {
    let (total_toilets, active_toilets) = store.count_toilets().await?;
    let (total_cleaners, active_cleaners) = store.count_users(UserRole::Cleaner).await?;
    let ratings = store.rating_aggregate(None).await?;

    Ok(SystemStats {
        total_toilets,
        active_toilets,
        toilets_with_problems: store
            .count_toilets_with_problems(now - Duration::hours(24))
            .await?,
        total_cleaners,
        active_cleaners,
        total_ratings: ratings.count,
        average_rating: ratings.average,
        completed_tasks_today: store.count_completed_since(start_of_day(now)).await?,
        ongoing_tasks: store.count_active_tasks().await?,
    })
}

pub fn cleaner_row(cleaner: &User, metrics: Option<&CleanerTaskMetrics>) -> CleanerStats {
    let m = metrics.cloned().unwrap_or_default();
    CleanerStats {
        cleaner_id: cleaner.id,
        cleaner_name: cleaner.name.clone(),
        is_active: cleaner.is_active,
        total_completed_tasks: m.completed,
        average_cleaning_time: m.avg_minutes.unwrap_or(NO_MEASUREMENT),
        fastest_cleaning_time: m.min_minutes.unwrap_or(NO_MEASUREMENT),
        slowest_cleaning_time: m.max_minutes.unwrap_or(NO_MEASUREMENT),
        total_cleaning_time: m.total_minutes.unwrap_or(0.0),
        last_week_tasks: m.last_week,
        last_month_tasks: m.last_month,
        ongoing_tasks: m.ongoing,
    }
}

/// One row per user with the cleaner role, active or not.
pub async fn cleaner_stats(store: &dyn Store, now: DateTime<Utc>) -> ServiceResult<Vec<CleanerStats>> {
    let cleaners = store.list_users(Some(UserRole::Cleaner)).await?;
    let metrics = store
        .cleaner_metrics(MetricWindows {
            last_week: now - Duration::days(7),
            last_month: now - Duration::days(30),
        })
        .await?;

    Ok(cleaners.iter().map(|c| cleaner_row(c, metrics.get(&c.id))).collect())
}

pub async fn admin_stats(store: &dyn Store, now: DateTime<Utc>) -> ServiceResult<AdminStats> {
    Ok(AdminStats {
        system_stats: system_stats(store, now).await?,
        cleaner_stats: cleaner_stats(store, now).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CleaningTask, NewCleaningTask, NewRating, NewUser, TaskStatus};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    async fn cleaner(store: &MemoryStore, username: &str) -> User {
        store
            .insert_user(NewUser {
                username: username.into(),
                password_hash: "x".into(),
                name: username.to_uppercase(),
                role: UserRole::Cleaner,
            })
            .await
            .unwrap()
    }

    async fn finished_task(
        store: &MemoryStore,
        toilet_id: i64,
        cleaner_id: i64,
        started: Option<DateTime<Utc>>,
        completed: DateTime<Utc>,
    ) -> CleaningTask {
        let mut t = store
            .insert_task(NewCleaningTask {
                toilet_id,
                cleaner_id,
                cleaner_name: "c".into(),
                created_at: completed - Duration::hours(1),
            })
            .await
            .unwrap();
        t.started_at = started;
        t.status = TaskStatus::Completed;
        t.completed_at = Some(completed);
        store.save_task(&t).await.unwrap()
    }

    #[test]
    fn sentinel_when_nothing_measured() {
        let now = Utc::now();
        let u = User {
            id: 4,
            username: "c".into(),
            password_hash: String::new(),
            name: "C".into(),
            role: UserRole::Cleaner,
            is_active: false,
            created_at: now,
            updated_at: now,
        };
        let row = cleaner_row(&u, None);
        assert_eq!(row.average_cleaning_time, NO_MEASUREMENT);
        assert_eq!(row.fastest_cleaning_time, NO_MEASUREMENT);
        assert_eq!(row.slowest_cleaning_time, NO_MEASUREMENT);
        assert_eq!(row.total_cleaning_time, 0.0);
        assert_eq!(row.total_completed_tasks, 0);
        assert!(!row.is_active);
    }

    #[test]
    fn day_starts_at_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 17, 42, 5).unwrap();
        assert_eq!(start_of_day(now), Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn durations_windows_and_ongoing_per_cleaner() {
        let store = MemoryStore::seeded();
        let a = cleaner(&store, "a").await;
        let b = cleaner(&store, "b").await;
        let now = Utc::now();

        // a: 10, 20 and 45 minutes; the last one 10 days ago
        let d1 = now - Duration::hours(2);
        finished_task(&store, 1, a.id, Some(d1 - Duration::minutes(10)), d1).await;
        let d2 = now - Duration::days(2);
        finished_task(&store, 2, a.id, Some(d2 - Duration::seconds(20 * 60 + 59)), d2).await;
        let d3 = now - Duration::days(10);
        finished_task(&store, 3, a.id, Some(d3 - Duration::minutes(45)), d3).await;
        // completed without a start time: counted, not measured
        finished_task(&store, 4, a.id, None, now - Duration::days(40)).await;
        store
            .insert_task(NewCleaningTask {
                toilet_id: 5,
                cleaner_id: a.id,
                cleaner_name: "A".into(),
                created_at: now,
            })
            .await
            .unwrap();

        let rows = cleaner_stats(&store, now).await.unwrap();
        assert_eq!(rows.len(), 2);

        let ra = rows.iter().find(|r| r.cleaner_id == a.id).unwrap();
        assert_eq!(ra.total_completed_tasks, 4);
        assert_eq!(ra.fastest_cleaning_time, 10.0);
        assert_eq!(ra.slowest_cleaning_time, 45.0);
        assert_eq!(ra.total_cleaning_time, 75.0);
        assert!((ra.average_cleaning_time - 25.0).abs() < 1e-9);
        assert_eq!(ra.last_week_tasks, 2);
        assert_eq!(ra.last_month_tasks, 3);
        assert_eq!(ra.ongoing_tasks, 1);

        let rb = rows.iter().find(|r| r.cleaner_id == b.id).unwrap();
        assert_eq!(rb.average_cleaning_time, NO_MEASUREMENT);
        assert_eq!(rb.total_completed_tasks, 0);
    }

    #[tokio::test]
    async fn zero_minute_cleaning_is_not_the_sentinel() {
        let store = MemoryStore::seeded();
        let a = cleaner(&store, "a").await;
        let now = Utc::now();
        finished_task(&store, 1, a.id, Some(now), now).await;

        let rows = cleaner_stats(&store, now).await.unwrap();
        assert_eq!(rows[0].fastest_cleaning_time, 0.0);
        assert_eq!(rows[0].average_cleaning_time, 0.0);
    }

    #[tokio::test]
    async fn system_rollup() {
        let store = MemoryStore::seeded();
        cleaner(&store, "a").await;
        let now = Utc::now();

        for (toilet_id, rating, problems) in [(1, 2, "[1]"), (1, 1, "[2,3]"), (2, 5, "[]")] {
            store
                .insert_rating(NewRating {
                    toilet_id,
                    rating,
                    problems: problems.into(),
                    other_text: String::new(),
                    created_at: now,
                })
                .await
                .unwrap();
        }
        finished_task(&store, 3, 1, Some(now), now).await;
        store
            .insert_task(NewCleaningTask {
                toilet_id: 4,
                cleaner_id: 1,
                cleaner_name: "c".into(),
                created_at: now,
            })
            .await
            .unwrap();

        let s = system_stats(&store, now).await.unwrap();
        assert_eq!((s.total_toilets, s.active_toilets), (6, 6));
        assert_eq!(s.toilets_with_problems, 1);
        assert_eq!((s.total_cleaners, s.active_cleaners), (1, 1));
        assert_eq!(s.total_ratings, 3);
        assert!((s.average_rating - 8.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.completed_tasks_today, 1);
        assert_eq!(s.ongoing_tasks, 1);
    }
}

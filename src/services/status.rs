// src/services/status.rs

use super::ServiceResult;
use crate::models::{CleaningTask, Rating, RatingAggregate, Toilet, ToiletStatus};
use crate::store::Store;

/// Build one toilet's status from its parts. Problems are read from the
/// latest rating only; older reports do not count.
pub fn compose(
    toilet: Toilet,
    last_rating: Option<Rating>,
    cleaning_task: Option<CleaningTask>,
    stats: RatingAggregate,
) -> ToiletStatus {
    let problem_count = last_rating
        .as_ref()
        .map_or(0, |r| r.problem_codes().len() as i64);

    ToiletStatus {
        toilet,
        last_checked: last_rating.as_ref().map(|r| r.created_at),
        last_rating,
        cleaning_task,
        has_problems: problem_count > 0,
        problem_count,
        average_rating: stats.average,
        total_ratings: stats.count,
    }
}

/// Status of every active toilet, recomputed from current data.
///
/// Three batched lookups cover all toilets, so the query count does not grow
/// with the number of toilets.
pub async fn toilet_statuses(store: &dyn Store) -> ServiceResult<Vec<ToiletStatus>> {
    let toilets = store.list_toilets(true).await?;
    let ids: Vec<i64> = toilets.iter().map(|t| t.id).collect();

    let mut latest = store.latest_ratings(&ids).await?;
    let mut tasks = store.active_tasks(&ids).await?;
    let aggregates = store.rating_aggregates(&ids).await?;

    Ok(toilets
        .into_iter()
        .map(|t| {
            let id = t.id;
            compose(
                t,
                latest.remove(&id),
                tasks.remove(&id),
                aggregates.get(&id).copied().unwrap_or_default(),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{actor::Actor, lifecycle, ratings};
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn toilet() -> Toilet {
        Toilet { id: 9, name: "T".into(), location: "L".into(), is_active: true }
    }

    fn rating(problems: &str) -> Rating {
        let now = Utc::now();
        Rating {
            id: 1,
            toilet_id: 9,
            rating: 2,
            problems: problems.into(),
            other_text: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_ratings_reads_as_unchecked_and_clean() {
        let s = compose(toilet(), None, None, RatingAggregate::default());
        assert!(!s.has_problems);
        assert_eq!(s.problem_count, 0);
        assert!(s.last_checked.is_none());
        assert_eq!(s.average_rating, 0.0);
        assert_eq!(s.total_ratings, 0);
    }

    #[test]
    fn malformed_problem_encoding_counts_as_none() {
        let s = compose(toilet(), Some(rating("[1,")), None, RatingAggregate::default());
        assert!(!s.has_problems);
        assert!(s.last_checked.is_some());
    }

    #[test]
    fn problems_from_latest_rating() {
        let r = rating("[1,4]");
        let s = compose(toilet(), Some(r.clone()), None, RatingAggregate { average: 2.0, count: 1 });
        assert!(s.has_problems);
        assert_eq!(s.problem_count, 2);
        assert_eq!(s.last_checked, Some(r.created_at));
    }

    #[tokio::test]
    async fn inactive_toilets_are_skipped() {
        let store = MemoryStore::seeded();
        store
            .add_toilet(Toilet { id: 3, name: "Restroom 3".into(), location: "x".into(), is_active: false })
            .await;
        let statuses = toilet_statuses(&store).await.unwrap();
        assert_eq!(statuses.len(), 5);
        assert!(statuses.iter().all(|s| s.toilet.id != 3));
    }

    #[tokio::test]
    async fn dirty_then_cleaned() {
        let store = MemoryStore::seeded();
        ratings::submit(&store, 1, 2, &[1, 4], "").await.unwrap();

        let s = &toilet_statuses(&store).await.unwrap()[0];
        assert_eq!(s.toilet.id, 1);
        assert!(s.has_problems);
        assert_eq!(s.problem_count, 2);

        let actor = Actor { id: 1, name: "c".into() };
        let task = lifecycle::start(&store, 1, &actor).await.unwrap();
        let s = &toilet_statuses(&store).await.unwrap()[0];
        assert_eq!(s.cleaning_task.as_ref().map(|t| t.id), Some(task.id));

        lifecycle::begin(&store, task.id).await.unwrap();
        lifecycle::complete(&store, task.id).await.unwrap();

        let s = &toilet_statuses(&store).await.unwrap()[0];
        assert!(!s.has_problems);
        assert!(s.cleaning_task.is_none());
        assert_eq!(s.last_rating.as_ref().map(|r| r.rating), Some(5));
        assert_eq!(s.total_ratings, 2);
        assert!((s.average_rating - 3.5).abs() < f64::EPSILON);
    }
}

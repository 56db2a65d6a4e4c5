// src/services/ratings.rs

use chrono::Utc;

use super::{ServiceError, ServiceResult};
use crate::models::{encode_problems, NewRating, Pagination, Rating, RatingAggregate, RatingPage};
use crate::store::Store;

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Record a cleanliness report. The toilet is not checked for existence.
pub async fn submit(
    store: &dyn Store,
    toilet_id: i64,
    score: i32,
    problems: &[i32],
    note: &str,
) -> ServiceResult<Rating> {
    if toilet_id < 1 {
        return Err(ServiceError::Validation("toilet_id must be a positive integer".into()));
    }
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(ServiceError::Validation(format!(
            "rating must be between {MIN_SCORE} and {MAX_SCORE}"
        )));
    }

    let rating = store
        .insert_rating(NewRating {
            toilet_id,
            rating: score,
            problems: encode_problems(problems),
            other_text: note.to_string(),
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(rating_id = rating.id, toilet_id, score, "rating recorded");
    Ok(rating)
}

pub async fn list(store: &dyn Store, toilet_id: Option<i64>) -> ServiceResult<Vec<Rating>> {
    Ok(store.list_ratings(toilet_id).await?)
}

pub async fn get(store: &dyn Store, id: i64) -> ServiceResult<Rating> {
    store
        .find_rating(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("rating not found".into()))
}

pub async fn aggregate(store: &dyn Store, toilet_id: i64) -> ServiceResult<RatingAggregate> {
    Ok(store.rating_aggregate(Some(toilet_id)).await?)
}

pub async fn latest(store: &dyn Store, toilet_id: i64) -> ServiceResult<Option<Rating>> {
    let mut latest = store.latest_ratings(&[toilet_id]).await?;
    Ok(latest.remove(&toilet_id))
}

/// Newest-first page of all ratings.
pub async fn page(
    store: &dyn Store,
    page: Option<i64>,
    limit: Option<i64>,
) -> ServiceResult<RatingPage> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);

    let (data, total) = store.page_ratings((page - 1).saturating_mul(limit), limit).await?;
    Ok(RatingPage { data, pagination: paginate(page, limit, total) })
}

pub fn paginate(page: i64, limit: i64, total: i64) -> Pagination {
    let total_pages = (total + limit - 1) / limit;
    Pagination {
        page,
        limit,
        total,
        total_pages,
        has_next: page < total_pages,
        has_previous: page > 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn pagination_edges() {
        let p = paginate(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next && p.has_previous);

        let last = paginate(3, 10, 25);
        assert!(!last.has_next);

        let empty = paginate(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next && !empty.has_previous);
    }

    #[tokio::test]
    async fn far_page_is_empty_not_a_crash() {
        let store = MemoryStore::seeded();
        submit(&store, 1, 4, &[], "").await.unwrap();

        let page = page(&store, Some(i64::MAX), Some(10)).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.page, i64::MAX);
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.pagination.total_pages, 1);
        assert!(!page.pagination.has_next);
        assert!(page.pagination.has_previous);
    }

    #[tokio::test]
    async fn score_out_of_range_rejected() {
        let store = MemoryStore::seeded();
        for bad in [0, 6, -3] {
            let err = submit(&store, 1, bad, &[], "").await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(store.list_ratings(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn problems_kept_in_submitted_order_with_duplicates() {
        let store = MemoryStore::seeded();
        let r = submit(&store, 3, 2, &[4, 1, 4], "smells").await.unwrap();
        assert_eq!(r.problems, "[4,1,4]");
        assert_eq!(r.problem_codes(), vec![4, 1, 4]);
        assert_eq!(r.other_text, "smells");
    }

    #[tokio::test]
    async fn unknown_toilet_still_accepted() {
        let store = MemoryStore::seeded();
        let r = submit(&store, 999, 4, &[], "").await.unwrap();
        assert_eq!(get(&store, r.id).await.unwrap().toilet_id, 999);
    }

    #[tokio::test]
    async fn aggregate_is_arithmetic_mean() {
        let store = MemoryStore::seeded();
        assert_eq!(aggregate(&store, 1).await.unwrap(), RatingAggregate { average: 0.0, count: 0 });

        for score in [1, 2, 5, 4] {
            submit(&store, 1, score, &[], "").await.unwrap();
        }
        submit(&store, 2, 1, &[], "").await.unwrap();

        let agg = aggregate(&store, 1).await.unwrap();
        assert_eq!(agg.count, 4);
        assert!((agg.average - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn latest_and_missing_lookups() {
        let store = MemoryStore::seeded();
        assert!(latest(&store, 1).await.unwrap().is_none());
        submit(&store, 1, 3, &[], "").await.unwrap();
        let newer = submit(&store, 1, 1, &[2], "").await.unwrap();
        assert_eq!(latest(&store, 1).await.unwrap().unwrap().id, newer.id);

        assert!(matches!(get(&store, 42).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn page_clamps_inputs() {
        let store = MemoryStore::seeded();
        for _ in 0..3 {
            submit(&store, 1, 5, &[], "").await.unwrap();
        }
        let p = page(&store, Some(0), Some(1000)).await.unwrap();
        assert_eq!(p.pagination.page, 1);
        assert_eq!(p.pagination.limit, MAX_PAGE_LIMIT);
        assert_eq!(p.data.len(), 3);
    }
}

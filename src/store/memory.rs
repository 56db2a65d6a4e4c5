// src/store/memory.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{MetricWindows, Store, StoreError, StoreResult};
use crate::models::{
    CleanerTaskMetrics, CleaningTask, NewCleaningTask, NewRating, NewUser,
    Rating, RatingAggregate, TaskFilter, TaskStatus, Toilet, User, UserChanges, UserRole,
};

#[derive(Default)]
struct Tables {
    toilets: Vec<Toilet>,
    ratings: Vec<Rating>,
    tasks: Vec<CleaningTask>,
    users: Vec<User>,
    next_rating: i64,
    next_task: i64,
    next_user: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn other_active_task(&self, toilet_id: i64, except: Option<i64>) -> bool {
        self.tasks
            .iter()
            .any(|t| t.toilet_id == toilet_id && t.is_active() && Some(t.id) != except)
    }

    fn build_rating(&mut self, r: NewRating) -> Rating {
        Rating {
            id: Self::next_id(&mut self.next_rating),
            toilet_id: r.toilet_id,
            rating: r.rating,
            problems: r.problems,
            other_text: r.other_text,
            created_at: r.created_at,
            updated_at: r.created_at,
        }
    }
}

fn aggregate<'a>(ratings: impl Iterator<Item = &'a Rating>) -> RatingAggregate {
    let (sum, count) = ratings.fold((0i64, 0i64), |(s, c), r| (s + r.rating as i64, c + 1));
    if count == 0 {
        return RatingAggregate::default();
    }
    RatingAggregate { average: sum as f64 / count as f64, count }
}

fn newest_first(a: &Rating, b: &Rating) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

/// Process-local store. One write lock covers each multi-step operation, so
/// the check-then-insert in `insert_task` and the two writes in
/// `complete_task` are indivisible.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_rating_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the six standard toilets.
    pub fn seeded() -> Self {
        Self {
            tables: RwLock::new(Tables {
                toilets: crate::db::schema::seed_toilets(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub async fn add_toilet(&self, toilet: Toilet) {
        let mut t = self.tables.write().await;
        t.toilets.retain(|x| x.id != toilet.id);
        t.toilets.push(toilet);
        t.toilets.sort_by_key(|x| x.id);
    }

    /// Makes every subsequent rating write fail until switched off again.
    pub fn fail_rating_writes(&self, fail: bool) {
        self.fail_rating_writes.store(fail, Ordering::SeqCst);
    }

    fn rating_write_guard(&self) -> StoreResult<()> {
        if self.fail_rating_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("rating write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_toilets(&self, active_only: bool) -> StoreResult<Vec<Toilet>> {
        let t = self.tables.read().await;
        Ok(t.toilets.iter().filter(|x| !active_only || x.is_active).cloned().collect())
    }

    async fn count_toilets(&self) -> StoreResult<(i64, i64)> {
        let t = self.tables.read().await;
        let active = t.toilets.iter().filter(|x| x.is_active).count();
        Ok((t.toilets.len() as i64, active as i64))
    }

    async fn insert_rating(&self, r: NewRating) -> StoreResult<Rating> {
        self.rating_write_guard()?;
        let mut t = self.tables.write().await;
        let rating = t.build_rating(r);
        t.ratings.push(rating.clone());
        Ok(rating)
    }

    async fn find_rating(&self, id: i64) -> StoreResult<Option<Rating>> {
        let t = self.tables.read().await;
        Ok(t.ratings.iter().find(|r| r.id == id).cloned())
    }

    async fn list_ratings(&self, toilet_id: Option<i64>) -> StoreResult<Vec<Rating>> {
        let t = self.tables.read().await;
        Ok(t.ratings
            .iter()
            .filter(|r| toilet_id.map_or(true, |id| r.toilet_id == id))
            .cloned()
            .collect())
    }

    async fn page_ratings(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Rating>, i64)> {
        let t = self.tables.read().await;
        let mut all: Vec<&Rating> = t.ratings.iter().collect();
        all.sort_by(|a, b| newest_first(a, b));
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, t.ratings.len() as i64))
    }

    async fn rating_aggregate(&self, toilet_id: Option<i64>) -> StoreResult<RatingAggregate> {
        let t = self.tables.read().await;
        Ok(aggregate(
            t.ratings.iter().filter(|r| toilet_id.map_or(true, |id| r.toilet_id == id)),
        ))
    }

    async fn latest_ratings(&self, toilet_ids: &[i64]) -> StoreResult<HashMap<i64, Rating>> {
        let t = self.tables.read().await;
        let mut out: HashMap<i64, Rating> = HashMap::new();
        for r in t.ratings.iter().filter(|r| toilet_ids.contains(&r.toilet_id)) {
            match out.get(&r.toilet_id) {
                Some(cur) if newest_first(cur, r).is_le() => {}
                _ => {
                    out.insert(r.toilet_id, r.clone());
                }
            }
        }
        Ok(out)
    }

    async fn rating_aggregates(
        &self,
        toilet_ids: &[i64],
    ) -> StoreResult<HashMap<i64, RatingAggregate>> {
        let t = self.tables.read().await;
        let mut out = HashMap::new();
        for id in toilet_ids {
            let agg = aggregate(t.ratings.iter().filter(|r| r.toilet_id == *id));
            if agg.count > 0 {
                out.insert(*id, agg);
            }
        }
        Ok(out)
    }

    async fn count_toilets_with_problems(&self, since: DateTime<Utc>) -> StoreResult<i64> {
        let t = self.tables.read().await;
        let mut ids: Vec<i64> = t
            .ratings
            .iter()
            .filter(|r| r.created_at > since)
            .filter(|r| !r.problems.is_empty() && r.problems != "[]")
            .map(|r| r.toilet_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids.len() as i64)
    }

    async fn find_active_task(&self, toilet_id: i64) -> StoreResult<Option<CleaningTask>> {
        let t = self.tables.read().await;
        Ok(t.tasks
            .iter()
            .filter(|x| x.toilet_id == toilet_id && x.is_active())
            .max_by_key(|x| x.created_at)
            .cloned())
    }

    async fn active_tasks(&self, toilet_ids: &[i64]) -> StoreResult<HashMap<i64, CleaningTask>> {
        let t = self.tables.read().await;
        let mut out: HashMap<i64, CleaningTask> = HashMap::new();
        for task in t.tasks.iter().filter(|x| x.is_active() && toilet_ids.contains(&x.toilet_id)) {
            let newer = out
                .get(&task.toilet_id)
                .map_or(true, |cur| task.created_at > cur.created_at);
            if newer {
                out.insert(task.toilet_id, task.clone());
            }
        }
        Ok(out)
    }

    async fn insert_task(&self, n: NewCleaningTask) -> StoreResult<CleaningTask> {
        let mut t = self.tables.write().await;
        if t.other_active_task(n.toilet_id, None) {
            return Err(StoreError::UniqueViolation(
                "cleaning_tasks_one_active_per_toilet".to_string(),
            ));
        }
        let task = CleaningTask {
            id: Tables::next_id(&mut t.next_task),
            toilet_id: n.toilet_id,
            cleaner_id: n.cleaner_id,
            cleaner_name: n.cleaner_name,
            status: TaskStatus::Assigned,
            started_at: None,
            completed_at: None,
            created_at: n.created_at,
            updated_at: n.created_at,
        };
        t.tasks.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: i64) -> StoreResult<Option<CleaningTask>> {
        let t = self.tables.read().await;
        Ok(t.tasks.iter().find(|x| x.id == id).cloned())
    }

    async fn save_task(&self, task: &CleaningTask) -> StoreResult<CleaningTask> {
        let mut t = self.tables.write().await;
        if task.is_active() && t.other_active_task(task.toilet_id, Some(task.id)) {
            return Err(StoreError::UniqueViolation(
                "cleaning_tasks_one_active_per_toilet".to_string(),
            ));
        }
        let slot = t
            .tasks
            .iter_mut()
            .find(|x| x.id == task.id)
            .ok_or_else(|| StoreError::Backend(format!("task {} vanished", task.id)))?;
        *slot = task.clone();
        Ok(task.clone())
    }

    async fn complete_task(
        &self,
        task: &CleaningTask,
        rating: NewRating,
    ) -> StoreResult<CleaningTask> {
        let mut t = self.tables.write().await;
        let idx = t
            .tasks
            .iter()
            .position(|x| x.id == task.id)
            .ok_or_else(|| StoreError::Backend(format!("task {} vanished", task.id)))?;
        // Nothing is applied until both writes are known to succeed.
        self.rating_write_guard()?;
        let synthetic = t.build_rating(rating);
        t.tasks[idx] = task.clone();
        t.ratings.push(synthetic);
        Ok(task.clone())
    }

    async fn list_tasks(&self, f: TaskFilter) -> StoreResult<Vec<CleaningTask>> {
        let t = self.tables.read().await;
        let mut rows: Vec<CleaningTask> = t
            .tasks
            .iter()
            .filter(|x| f.status.map_or(true, |s| x.status == s))
            .filter(|x| f.toilet_id.map_or(true, |id| x.toilet_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn count_completed_since(&self, since: DateTime<Utc>) -> StoreResult<i64> {
        let t = self.tables.read().await;
        Ok(t.tasks
            .iter()
            .filter(|x| x.status == TaskStatus::Completed)
            .filter(|x| x.completed_at.map_or(false, |c| c >= since))
            .count() as i64)
    }

    async fn count_active_tasks(&self) -> StoreResult<i64> {
        let t = self.tables.read().await;
        Ok(t.tasks.iter().filter(|x| x.is_active()).count() as i64)
    }

    async fn cleaner_metrics(
        &self,
        w: MetricWindows,
    ) -> StoreResult<HashMap<i64, CleanerTaskMetrics>> {
        let t = self.tables.read().await;
        let mut out: HashMap<i64, CleanerTaskMetrics> = HashMap::new();
        let mut spans: HashMap<i64, Vec<f64>> = HashMap::new();

        for task in &t.tasks {
            let m = out.entry(task.cleaner_id).or_insert_with(|| CleanerTaskMetrics {
                cleaner_id: task.cleaner_id,
                ..Default::default()
            });
            if task.is_active() {
                m.ongoing += 1;
                continue;
            }
            m.completed += 1;
            if let Some(done) = task.completed_at {
                if done >= w.last_week {
                    m.last_week += 1;
                }
                if done >= w.last_month {
                    m.last_month += 1;
                }
            }
            if let Some(minutes) = task.cleaning_minutes() {
                spans.entry(task.cleaner_id).or_default().push(minutes as f64);
            }
        }

        for (cleaner_id, minutes) in spans {
            if let Some(m) = out.get_mut(&cleaner_id) {
                let total: f64 = minutes.iter().sum();
                m.total_minutes = Some(total);
                m.avg_minutes = Some(total / minutes.len() as f64);
                m.min_minutes = minutes.iter().copied().reduce(f64::min);
                m.max_minutes = minutes.iter().copied().reduce(f64::max);
            }
        }
        Ok(out)
    }

    async fn list_users(&self, role: Option<UserRole>) -> StoreResult<Vec<User>> {
        let t = self.tables.read().await;
        Ok(t.users
            .iter()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert_user(&self, n: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.username == n.username) {
            return Err(StoreError::UniqueViolation("users_username_key".to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Tables::next_id(&mut t.next_user),
            username: n.username,
            password_hash: n.password_hash,
            name: n.name,
            role: n.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, c: UserChanges) -> StoreResult<Option<User>> {
        let mut t = self.tables.write().await;
        if let Some(name) = &c.username {
            if t.users.iter().any(|u| &u.username == name && u.id != id) {
                return Err(StoreError::UniqueViolation("users_username_key".to_string()));
            }
        }
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = c.username {
            user.username = v;
        }
        if let Some(v) = c.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = c.name {
            user.name = v;
        }
        if let Some(v) = c.role {
            user.role = v;
        }
        if let Some(v) = c.is_active {
            user.is_active = v;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        Ok(t.users.len() < before)
    }

    async fn count_users(&self, role: UserRole) -> StoreResult<(i64, i64)> {
        let t = self.tables.read().await;
        let of_role = t.users.iter().filter(|u| u.role == role);
        let (total, active) = of_role.fold((0, 0), |(n, a), u| (n + 1, a + u.is_active as i64));
        Ok((total, active))
    }
}

// src/models/mod.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ───────────────────────────────────────
// Closed string enumerations stored as TEXT
// ───────────────────────────────────────
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Assigned,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ACTIVE: [TaskStatus; 2] = [TaskStatus::Assigned, TaskStatus::InProgress];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(TaskStatus::Assigned),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(UnknownVariant { kind: "task status", value: other.to_string() }),
        }
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "temizlikci")]
    Cleaner,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Cleaner => "temizlikci",
        }
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "temizlikci" => Ok(UserRole::Cleaner),
            other => Err(UnknownVariant { kind: "user role", value: other.to_string() }),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ───────────────────────────────────────
// Facilities
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Toilet {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub is_active: bool,
}

/// Problem codes a rater can tick. Code 6 pairs with the free-text note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemType {
    NoToiletPaper = 1,
    NoSoap = 2,
    NoPaperTowels = 3,
    TrashFull = 4,
    DirtyBowl = 5,
    Other = 6,
}

impl ProblemType {
    pub const ALL: [ProblemType; 6] = [
        ProblemType::NoToiletPaper,
        ProblemType::NoSoap,
        ProblemType::NoPaperTowels,
        ProblemType::TrashFull,
        ProblemType::DirtyBowl,
        ProblemType::Other,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            ProblemType::NoToiletPaper => "Toilet paper missing",
            ProblemType::NoSoap => "Soap missing",
            ProblemType::NoPaperTowels => "Paper towels missing",
            ProblemType::TrashFull => "Trash bin full",
            ProblemType::DirtyBowl => "Toilet bowl dirty",
            ProblemType::Other => "Other",
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }
}

// ───────────────────────────────────────
// Ratings
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rating {
    pub id: i64,
    pub toilet_id: i64,
    pub rating: i32,
    pub problems: String,         // JSON list of problem codes, e.g. "[1,4]"
    pub other_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rating {
    pub fn problem_codes(&self) -> Vec<i32> {
        decode_problems(&self.problems)
    }
}

pub fn encode_problems(codes: &[i32]) -> String {
    serde_json::to_string(codes).unwrap_or_else(|_| "[]".to_string())
}

/// Malformed encodings decode to the empty set; callers never see a parse error.
pub fn decode_problems(raw: &str) -> Vec<i32> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct NewRating {
    pub toilet_id: i64,
    pub rating: i32,
    pub problems: String,
    pub other_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, FromRow)]
pub struct RatingAggregate {
    pub average: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingPage {
    pub data: Vec<Rating>,
    pub pagination: Pagination,
}

// ───────────────────────────────────────
// Cleaning tasks
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CleaningTask {
    pub id: i64,
    pub toilet_id: i64,
    pub cleaner_id: i64,
    pub cleaner_name: String,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CleaningTask {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Overwrites any earlier start time, whatever the current status.
    pub fn mark_in_progress(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Whole minutes between start and completion, truncated.
    pub fn cleaning_minutes(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCleaningTask {
    pub toilet_id: i64,
    pub cleaner_id: i64,
    pub cleaner_name: String,
    pub created_at: DateTime<Utc>,
}

/// Query filter for task listings. Empty query values mean "no filter".
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TaskFilter {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub toilet_id: Option<i64>,
}

fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// ───────────────────────────────────────
// Users
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

// ───────────────────────────────────────
// Read models (never persisted)
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize)]
pub struct ToiletStatus {
    pub toilet: Toilet,
    pub last_rating: Option<Rating>,
    pub cleaning_task: Option<CleaningTask>,
    pub has_problems: bool,
    pub problem_count: i64,
    pub last_checked: Option<DateTime<Utc>>,
    pub average_rating: f64,
    pub total_ratings: i64,
}

/// Raw per-cleaner task figures as the store computes them.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct CleanerTaskMetrics {
    pub cleaner_id: i64,
    pub completed: i64,
    pub avg_minutes: Option<f64>,
    pub min_minutes: Option<f64>,
    pub max_minutes: Option<f64>,
    pub total_minutes: Option<f64>,
    pub last_week: i64,
    pub last_month: i64,
    pub ongoing: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanerStats {
    pub cleaner_id: i64,
    pub cleaner_name: String,
    pub is_active: bool,
    pub total_completed_tasks: i64,
    pub average_cleaning_time: f64, // minutes, -1 when nothing measurable
    pub fastest_cleaning_time: f64,
    pub slowest_cleaning_time: f64,
    pub total_cleaning_time: f64,
    pub last_week_tasks: i64,
    pub last_month_tasks: i64,
    pub ongoing_tasks: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemStats {
    pub total_toilets: i64,
    pub active_toilets: i64,
    pub toilets_with_problems: i64,
    pub total_cleaners: i64,
    pub active_cleaners: i64,
    pub total_ratings: i64,
    pub average_rating: f64,
    pub completed_tasks_today: i64,
    pub ongoing_tasks: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn task() -> CleaningTask {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        CleaningTask {
            id: 1,
            toilet_id: 1,
            cleaner_id: 2,
            cleaner_name: "Ayse".into(),
            status: TaskStatus::Assigned,
            started_at: None,
            completed_at: None,
            created_at: t0,
            updated_at: t0,
        }
    }

    #[test]
    fn problems_decode_softly() {
        assert_eq!(decode_problems("[1,4,4]"), vec![1, 4, 4]);
        assert!(decode_problems("").is_empty());
        assert!(decode_problems("null").is_empty());
        assert!(decode_problems("{not json").is_empty());
        assert_eq!(encode_problems(&[]), "[]");
        assert_eq!(encode_problems(&[4, 1]), "[4,1]");
    }

    #[test]
    fn task_status_text_form() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("done".parse::<TaskStatus>().is_err());
        assert!(TaskStatus::Assigned.is_active());
        assert!(!TaskStatus::Completed.is_active());
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            serde_json::json!("in_progress")
        );
    }

    #[test]
    fn complete_without_begin_backfills_start() {
        let mut t = task();
        let now = t.created_at + Duration::minutes(30);
        t.mark_completed(now);
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.started_at, Some(now));
        assert_eq!(t.completed_at, Some(now));
        assert_eq!(t.cleaning_minutes(), Some(0));
    }

    #[test]
    fn begin_overwrites_previous_start() {
        let mut t = task();
        let first = t.created_at + Duration::minutes(1);
        let second = t.created_at + Duration::minutes(5);
        t.mark_in_progress(first);
        t.mark_in_progress(second);
        assert_eq!(t.started_at, Some(second));

        t.mark_completed(second + Duration::seconds(150));
        assert_eq!(t.started_at, Some(second));
        assert_eq!(t.cleaning_minutes(), Some(2));
    }

    #[test]
    fn user_password_never_serialized() {
        let now = Utc::now();
        let u = User {
            id: 1,
            username: "admin".into(),
            password_hash: "secret".into(),
            name: "Admin".into(),
            role: UserRole::Cleaner,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let v = serde_json::to_value(&u).unwrap();
        assert!(v.get("password_hash").is_none());
        assert_eq!(v["role"], "temizlikci");
    }

    #[test]
    fn problem_type_lookup() {
        assert_eq!(ProblemType::from_code(6), Some(ProblemType::Other));
        assert_eq!(ProblemType::from_code(7), None);
        assert_eq!(ProblemType::TrashFull.code(), 4);
    }
}

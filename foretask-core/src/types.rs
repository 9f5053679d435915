//! Core domain types for foretask
//!
//! The wire types (`Task`, `Person`, `TimerEntry`, `PaginatedResponse`) mirror
//! the Forecast API's JSON. Records are immutable once fetched; a new fetch
//! supersedes them wholesale. The vendor payload is much wider than what we
//! need, so deserialization is tolerant: unknown fields are ignored and
//! optional fields default.
//!
//! `TaskSnapshot` and `TimerState` are foretask's own persisted state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Wire types
// ============================================

/// A Forecast task record (v3/v4 shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Internal identifier
    pub id: i64,
    /// Human-readable numeric id, shown as `T{company_task_id}`
    #[serde(default)]
    pub company_task_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
    /// Person ids this task is assigned to
    #[serde(default)]
    pub assigned_persons: Vec<i64>,
    #[serde(default)]
    pub high_priority: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub bug: bool,
    #[serde(default)]
    pub un_billable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// URL of the task in the Forecast web app.
    pub fn browser_url(&self) -> String {
        format!("https://app.forecast.it/T{}", self.company_task_id)
    }
}

/// A Forecast person record (v2 shape).
///
/// Read-only reference data; the configured user is looked up by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Person {
    /// "First Last", falling back to the email, then the numeric id.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => self
                .email
                .clone()
                .unwrap_or_else(|| format!("person {}", self.id)),
        }
    }
}

/// Paginated list envelope used by the v4 task endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(rename = "pageContents", default = "Vec::new")]
    pub page_contents: Vec<T>,
    #[serde(rename = "totalPages", default)]
    pub total_pages: i64,
    #[serde(rename = "totalItems", default)]
    pub total_items: i64,
}

/// One record from `GET /persons/{id}/timer`.
///
/// A record with `start_time` set and `end_time` absent denotes the currently
/// running timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEntry {
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl TimerEntry {
    /// True if this entry denotes a currently running timer on a known task.
    pub fn is_running(&self) -> bool {
        self.task_id.is_some() && self.start_time.is_some() && self.end_time.is_none()
    }
}

// ============================================
// Persisted state
// ============================================

/// A cached snapshot of tasks for one owner.
///
/// Created on successful fetch, superseded wholesale by the next fetch or by
/// explicit invalidation; never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub tasks: Vec<Task>,
    pub captured_at: DateTime<Utc>,
    pub owner_id: i64,
}

impl TaskSnapshot {
    pub fn new(tasks: Vec<Task>, owner_id: i64, captured_at: DateTime<Utc>) -> Self {
        Self {
            tasks,
            captured_at,
            owner_id,
        }
    }

    /// A snapshot is valid only while unexpired and owned by the current user.
    pub fn is_valid(&self, now: DateTime<Utc>, owner_id: i64, expiry: Duration) -> bool {
        self.owner_id == owner_id && now.signed_duration_since(self.captured_at) < expiry
    }
}

/// The single per-installation work timer.
///
/// `Running` always carries a task and a start time; both are absent when
/// idle. Exactly one timer exists; starting a new task implicitly stops the
/// previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimerState {
    Idle,
    Running {
        task_id: i64,
        project_id: Option<i64>,
        started_at: DateTime<Utc>,
    },
}

impl TimerState {
    pub fn is_running(&self) -> bool {
        matches!(self, TimerState::Running { .. })
    }

    /// Task id of the running timer, if any.
    pub fn task_id(&self) -> Option<i64> {
        match self {
            TimerState::Running { task_id, .. } => Some(*task_id),
            TimerState::Idle => None,
        }
    }

    /// Elapsed time while running; zero when idle. Derived, never stored.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self {
            TimerState::Running { started_at, .. } => {
                now.signed_duration_since(*started_at).max(Duration::zero())
            }
            TimerState::Idle => Duration::zero(),
        }
    }
}

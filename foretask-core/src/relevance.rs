//! Task relevance filters
//!
//! Pure functions deriving "relevant to this user" views from a raw task
//! list. No I/O, no mutation of the input; every filter preserves the
//! relative order of its input unless it documents a sort. Callers compose
//! them as `assigned_to` -> `recently_updated` / flag filter -> `search`.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use crate::types::Task;

/// Group key for tasks without a project.
pub const UNASSIGNED_PROJECT: &str = "unassigned";

/// Tasks whose assigned-person list contains `person_id`.
pub fn assigned_to(tasks: &[Task], person_id: i64) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.assigned_persons.contains(&person_id))
        .cloned()
        .collect()
}

/// Tasks updated within `hours_back` of `now`, newest first.
///
/// Ties on the update timestamp break by ascending task id, so the output
/// order is deterministic.
pub fn recently_updated(tasks: &[Task], hours_back: i64, now: DateTime<Utc>) -> Vec<Task> {
    let cutoff = now - Duration::hours(hours_back);
    let mut recent: Vec<Task> = tasks
        .iter()
        .filter(|t| t.updated_at >= cutoff)
        .cloned()
        .collect();

    recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
    recent
}

/// Lookback window in hours for "recently updated".
///
/// Monday and Tuesday look back five days so the view still surfaces
/// Friday's work across the weekend gap; other days look back three.
pub fn lookback_hours(reference: DateTime<Utc>) -> i64 {
    match reference.weekday() {
        Weekday::Mon | Weekday::Tue => 120,
        _ => 72,
    }
}

/// Tasks keyed by stringified project id; projectless tasks group under
/// [`UNASSIGNED_PROJECT`].
pub fn group_by_project(tasks: &[Task]) -> BTreeMap<String, Vec<Task>> {
    let mut groups: BTreeMap<String, Vec<Task>> = BTreeMap::new();

    for task in tasks {
        let key = task
            .project_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| UNASSIGNED_PROJECT.to_string());
        groups.entry(key).or_default().push(task.clone());
    }

    groups
}

/// Case-insensitive substring match over title, description, project id and
/// display task id. A blank query returns the input unchanged.
pub fn search(tasks: &[Task], query: &str) -> Vec<Task> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return tasks.to_vec();
    }

    tasks
        .iter()
        .filter(|t| {
            t.title.to_lowercase().contains(&needle)
                || t.description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&needle))
                    .unwrap_or(false)
                || t.project_id
                    .map(|id| id.to_string().contains(&needle))
                    .unwrap_or(false)
                || t.company_task_id.to_string().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Tasks flagged high-priority, input order preserved.
pub fn high_priority(tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|t| t.high_priority).cloned().collect()
}

/// Tasks flagged blocked, input order preserved.
pub fn blocked(tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|t| t.blocked).cloned().collect()
}

/// Tasks flagged as bugs, input order preserved.
pub fn bugs(tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|t| t.bug).cloned().collect()
}

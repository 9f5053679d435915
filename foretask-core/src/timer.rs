//! Timer state machine
//!
//! Tracks the single per-installation work timer and keeps it consistent
//! with the remote timer endpoint, which is the source of truth across
//! installations sharing one account.
//!
//! Persistence contract: the structured JSON under `timer-state` is
//! authoritative; the four flattened keys mirror it for external readers.
//! All five are committed in one store transaction. Local state only changes
//! after the corresponding remote call has succeeded, so a failed start or
//! stop leaves local and remote agreeing (stale local is caught by the next
//! reconcile).

use chrono::{DateTime, Duration, Utc};

use crate::api::TimerApi;
use crate::error::Result;
use crate::store::KvStore;
use crate::types::{Task, TimerState};

/// Authoritative structured state.
pub const KEY_STATE: &str = "timer-state";
/// Flattened mirror keys (collaborator contract for external readers).
pub const KEY_RUNNING: &str = "timer-is-running";
pub const KEY_START_TIME: &str = "timer-start-time";
pub const KEY_TASK_ID: &str = "timer-task-id";
pub const KEY_PROJECT_ID: &str = "timer-project-id";

const ALL_KEYS: [&str; 5] = [
    KEY_STATE,
    KEY_RUNNING,
    KEY_START_TIME,
    KEY_TASK_ID,
    KEY_PROJECT_ID,
];

/// Result of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Timer started on the requested task.
    Started,
    /// The requested task was already running; nothing was done.
    AlreadyRunning,
    /// A different task was running; it was stopped first.
    Switched { stopped_task_id: i64 },
}

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { elapsed: Duration },
    /// No timer was running; an informational no-op, not an error.
    NothingRunning,
}

/// The local half of the timer, mirrored into the key-value store.
pub struct TimerTracker {
    state: TimerState,
}

impl TimerTracker {
    /// Load persisted state from the store.
    pub fn load(store: &KvStore) -> Result<Self> {
        Ok(Self {
            state: load_state(store),
        })
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Elapsed time of the running timer; zero when idle.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.state.elapsed(now)
    }

    /// Re-read shared state written by another process.
    ///
    /// Returns true when the state changed since the last read.
    pub fn reload(&mut self, store: &KvStore) -> Result<bool> {
        let fresh = load_state(store);
        let changed = fresh != self.state;
        self.state = fresh;
        Ok(changed)
    }

    /// Start the timer on `task`.
    ///
    /// Starting the running task again is an idempotent no-op with no remote
    /// call. Starting while a different task runs stops that task first (the
    /// remote endpoint tracks a single running timer). Local state changes
    /// only after the remote start succeeded.
    pub async fn start<A: TimerApi>(
        &mut self,
        api: &A,
        store: &mut KvStore,
        person_id: i64,
        task: &Task,
    ) -> Result<StartOutcome> {
        let mut stopped_task_id = None;

        if let TimerState::Running { task_id, .. } = self.state {
            if task_id == task.id {
                tracing::debug!(task_id, "Timer already running for task, no-op");
                return Ok(StartOutcome::AlreadyRunning);
            }

            api.stop_timer(person_id).await?;
            self.persist(store, TimerState::Idle)?;
            tracing::info!(task_id, "Stopped previous task before switching");
            stopped_task_id = Some(task_id);
        }

        api.start_timer(person_id, task.id).await?;

        let state = TimerState::Running {
            task_id: task.id,
            project_id: task.project_id,
            started_at: Utc::now(),
        };
        self.persist(store, state)?;
        tracing::info!(task_id = task.id, "Timer started");

        Ok(match stopped_task_id {
            Some(stopped_task_id) => StartOutcome::Switched { stopped_task_id },
            None => StartOutcome::Started,
        })
    }

    /// Stop the running timer.
    ///
    /// Local state is cleared only on confirmed remote success; on failure it
    /// stays running and the error propagates (the remote endpoint is the
    /// cross-device source of truth, so clearing locally on a failed stop
    /// would just be resurrected by the next reconcile).
    pub async fn stop<A: TimerApi>(
        &mut self,
        api: &A,
        store: &mut KvStore,
        person_id: i64,
    ) -> Result<StopOutcome> {
        if !self.state.is_running() {
            tracing::debug!("Stop requested while idle, no-op");
            return Ok(StopOutcome::NothingRunning);
        }

        api.stop_timer(person_id).await?;

        let elapsed = self.state.elapsed(Utc::now());
        self.persist(store, TimerState::Idle)?;
        tracing::info!(elapsed_secs = elapsed.num_seconds(), "Timer stopped");

        Ok(StopOutcome::Stopped { elapsed })
    }

    /// Clear local state without consulting the remote endpoint.
    ///
    /// Escape hatch for a remote stop that keeps failing.
    pub fn force_clear(&mut self, store: &mut KvStore) -> Result<()> {
        self.persist(store, TimerState::Idle)?;
        tracing::warn!("Timer state force-cleared locally");
        Ok(())
    }

    /// Reconcile local state against the remote timer status.
    ///
    /// Remote wins: a running remote entry replaces a diverging local state,
    /// and an absent one clears a locally running timer. Returns true when
    /// local state changed.
    pub async fn reconcile<A: TimerApi>(
        &mut self,
        api: &A,
        store: &mut KvStore,
        person_id: i64,
    ) -> Result<bool> {
        let entries = api.timer_status(person_id).await?;
        let remote = entries.iter().find(|e| e.is_running());

        match (remote, &self.state) {
            (Some(entry), TimerState::Running { task_id, .. })
                if entry.task_id == Some(*task_id) =>
            {
                Ok(false)
            }
            (Some(entry), _) => {
                // is_running() guarantees task_id and start_time are present
                let state = TimerState::Running {
                    task_id: entry.task_id.unwrap_or_default(),
                    project_id: entry.project_id,
                    started_at: entry.start_time.unwrap_or_else(Utc::now),
                };
                tracing::info!(task_id = ?entry.task_id, "Adopting remote timer state");
                self.persist(store, state)?;
                Ok(true)
            }
            (None, TimerState::Running { task_id, .. }) => {
                tracing::info!(task_id, "Remote timer not running, clearing local state");
                self.persist(store, TimerState::Idle)?;
                Ok(true)
            }
            (None, TimerState::Idle) => Ok(false),
        }
    }

    /// Commit `state` to the store (structured value plus flattened mirror
    /// keys, one transaction), then adopt it locally.
    fn persist(&mut self, store: &mut KvStore, state: TimerState) -> Result<()> {
        match &state {
            TimerState::Running {
                task_id,
                project_id,
                started_at,
            } => {
                let mut entries = vec![
                    (KEY_STATE, serde_json::to_string(&state)?),
                    (KEY_RUNNING, "true".to_string()),
                    (KEY_START_TIME, started_at.to_rfc3339()),
                    (KEY_TASK_ID, task_id.to_string()),
                ];
                let removals: &[&str] = match project_id {
                    Some(project_id) => {
                        entries.push((KEY_PROJECT_ID, project_id.to_string()));
                        &[]
                    }
                    None => &[KEY_PROJECT_ID],
                };
                store.replace_many(&entries, removals)?;
            }
            TimerState::Idle => {
                store.remove_many(&ALL_KEYS)?;
            }
        }

        self.state = state;
        Ok(())
    }
}

/// Read persisted timer state, preferring the structured value.
///
/// A malformed structured value is discarded (data error -> treated as
/// absent). The flattened fallback read-repairs torn writes from external
/// tools: `running=true` without a task id or start time reads as idle.
fn load_state(store: &KvStore) -> TimerState {
    if let Ok(Some(raw)) = store.get(KEY_STATE) {
        match serde_json::from_str::<TimerState>(&raw) {
            Ok(state) => return state,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed timer state");
                let _ = store.remove(KEY_STATE);
            }
        }
    }

    let running = matches!(store.get(KEY_RUNNING), Ok(Some(v)) if v == "true");
    if !running {
        return TimerState::Idle;
    }

    let task_id = store
        .get(KEY_TASK_ID)
        .ok()
        .flatten()
        .and_then(|v| v.parse::<i64>().ok());
    let started_at = store
        .get(KEY_START_TIME)
        .ok()
        .flatten()
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|dt| dt.with_timezone(&Utc));

    match (task_id, started_at) {
        (Some(task_id), Some(started_at)) => TimerState::Running {
            task_id,
            project_id: store
                .get(KEY_PROJECT_ID)
                .ok()
                .flatten()
                .and_then(|v| v.parse::<i64>().ok()),
            started_at,
        },
        _ => {
            tracing::warn!("Flattened timer keys inconsistent, treating as idle");
            TimerState::Idle
        }
    }
}

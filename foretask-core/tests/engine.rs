//! Integration tests for the cache manager and timer state machine
//!
//! The engine components are exercised against in-memory fakes of the
//! Forecast endpoints and a real store in a temp directory, verifying the
//! freshness, fallback, idempotence and reconciliation behavior end to end.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;

use chrono::{DateTime, Duration, TimeZone, Utc};
use foretask_core::timer::{
    StartOutcome, StopOutcome, TimerTracker, KEY_RUNNING, KEY_START_TIME, KEY_STATE, KEY_TASK_ID,
};
use foretask_core::{
    Error, KvStore, Result, Task, TaskCache, TaskSnapshot, TaskSource, TimerApi, TimerEntry,
    TimerState,
};
use tempfile::TempDir;

fn open_store() -> (TempDir, KvStore) {
    let dir = TempDir::new().unwrap();
    let store = KvStore::open(&dir.path().join("state.db")).unwrap();
    (dir, store)
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn task(id: i64) -> Task {
    Task {
        id,
        company_task_id: 1000 + id,
        title: format!("Task {}", id),
        description: None,
        project_id: Some(9),
        assigned_persons: vec![7],
        high_priority: false,
        blocked: false,
        bug: false,
        un_billable: false,
        created_at: at(0),
        updated_at: at(0),
    }
}

fn api_error() -> Error {
    Error::Api {
        status: 500,
        message: "boom".to_string(),
    }
}

// ============================================
// Fakes
// ============================================

/// Task source returning scripted responses, counting fetches.
#[derive(Default)]
struct FakeSource {
    responses: RefCell<VecDeque<Result<Vec<Task>>>>,
    calls: Cell<usize>,
    /// Delay each fetch so concurrent callers can interleave.
    slow: bool,
}

impl FakeSource {
    fn with(responses: Vec<Result<Vec<Task>>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: Cell::new(0),
            slow: false,
        }
    }
}

impl TaskSource for FakeSource {
    fn fetch_tasks(&self, _hours_back: i64) -> impl Future<Output = Result<Vec<Task>>> {
        self.calls.set(self.calls.get() + 1);
        let response = self
            .responses
            .borrow_mut()
            .pop_front()
            .expect("unexpected fetch");
        let slow = self.slow;
        async move {
            if slow {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            response
        }
    }
}

/// Timer endpoint recording the order of remote calls.
#[derive(Default)]
struct FakeTimerApi {
    ops: RefCell<Vec<String>>,
    status: RefCell<Vec<TimerEntry>>,
    fail_start: Cell<bool>,
    fail_stop: Cell<bool>,
}

impl FakeTimerApi {
    fn ops(&self) -> Vec<String> {
        self.ops.borrow().clone()
    }
}

impl TimerApi for FakeTimerApi {
    fn start_timer(&self, _person_id: i64, task_id: i64) -> impl Future<Output = Result<()>> {
        let result = if self.fail_start.get() {
            Err(api_error())
        } else {
            self.ops.borrow_mut().push(format!("start:{}", task_id));
            Ok(())
        };
        async move { result }
    }

    fn stop_timer(&self, _person_id: i64) -> impl Future<Output = Result<()>> {
        let result = if self.fail_stop.get() {
            Err(api_error())
        } else {
            self.ops.borrow_mut().push("stop".to_string());
            Ok(())
        };
        async move { result }
    }

    fn timer_status(&self, _person_id: i64) -> impl Future<Output = Result<Vec<TimerEntry>>> {
        let entries = self.status.borrow().clone();
        async move { Ok(entries) }
    }
}

// ============================================
// Cache manager
// ============================================

#[tokio::test]
async fn test_valid_snapshot_served_without_fetch() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));
    let source = FakeSource::with(vec![Ok(vec![task(1)])]);

    let first = cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();
    let second = cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(source.calls.get(), 1);
}

#[tokio::test]
async fn test_stale_snapshot_triggers_fresh_fetch() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));

    // Seed a snapshot captured two hours ago
    let stale = TaskSnapshot::new(vec![task(1)], 7, Utc::now() - Duration::hours(2));
    store
        .set("tasks-snapshot-7", &serde_json::to_string(&stale).unwrap())
        .unwrap();

    let source = FakeSource::with(vec![Ok(vec![task(2)])]);
    let tasks = cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();

    assert_eq!(source.calls.get(), 1);
    assert_eq!(tasks[0].id, 2);
}

#[tokio::test]
async fn test_fetch_failure_falls_back_to_stale_snapshot() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));

    let stale = TaskSnapshot::new(vec![task(1)], 7, Utc::now() - Duration::hours(2));
    store
        .set("tasks-snapshot-7", &serde_json::to_string(&stale).unwrap())
        .unwrap();

    let source = FakeSource::with(vec![Err(api_error())]);
    let tasks = cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();

    assert_eq!(tasks[0].id, 1);
}

#[tokio::test]
async fn test_fetch_failure_without_snapshot_propagates() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));
    let source = FakeSource::with(vec![Err(api_error())]);

    let result = cache.get_tasks(&store, &source, 7, 72, false).await;
    assert!(matches!(result, Err(Error::Api { status: 500, .. })));
}

#[tokio::test]
async fn test_force_refresh_bypasses_valid_snapshot() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));
    let source = FakeSource::with(vec![Ok(vec![task(1)]), Ok(vec![task(2)])]);

    cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();
    let tasks = cache.get_tasks(&store, &source, 7, 72, true).await.unwrap();

    assert_eq!(source.calls.get(), 2);
    assert_eq!(tasks[0].id, 2);
}

#[tokio::test]
async fn test_invalidate_forces_next_fetch() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));
    let source = FakeSource::with(vec![Ok(vec![task(1)]), Ok(vec![task(2)])]);

    cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();
    cache.invalidate(&store, 7).unwrap();
    cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();

    assert_eq!(source.calls.get(), 2);
}

#[tokio::test]
async fn test_snapshot_for_other_owner_is_not_served() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));
    let source = FakeSource::with(vec![Ok(vec![task(1)]), Ok(vec![task(2)])]);

    cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();
    // A different configured user gets its own fetch, not user 7's snapshot
    let tasks = cache.get_tasks(&store, &source, 8, 72, false).await.unwrap();

    assert_eq!(source.calls.get(), 2);
    assert_eq!(tasks[0].id, 2);
}

#[tokio::test]
async fn test_malformed_snapshot_treated_as_miss() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));

    store.set("tasks-snapshot-7", "{not json").unwrap();

    let source = FakeSource::with(vec![Ok(vec![task(1)])]);
    let tasks = cache.get_tasks(&store, &source, 7, 72, false).await.unwrap();

    assert_eq!(source.calls.get(), 1);
    assert_eq!(tasks[0].id, 1);
}

#[tokio::test]
async fn test_concurrent_requests_coalesce_into_one_fetch() {
    let (_dir, store) = open_store();
    let cache = TaskCache::new(Duration::hours(1));
    let source = FakeSource {
        responses: RefCell::new(vec![Ok(vec![task(1)])].into()),
        calls: Cell::new(0),
        slow: true,
    };

    let (a, b) = tokio::join!(
        cache.get_tasks(&store, &source, 7, 72, false),
        cache.get_tasks(&store, &source, 7, 72, false),
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(source.calls.get(), 1);
}

// ============================================
// Timer state machine
// ============================================

#[tokio::test]
async fn test_start_persists_structured_and_flattened_keys() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();

    let outcome = timer.start(&api, &mut store, 7, &task(1)).await.unwrap();

    assert_eq!(outcome, StartOutcome::Started);
    assert!(timer.state().is_running());
    assert!(store.get(KEY_STATE).unwrap().is_some());
    assert_eq!(store.get(KEY_RUNNING).unwrap().as_deref(), Some("true"));
    assert_eq!(store.get(KEY_TASK_ID).unwrap().as_deref(), Some("1"));
    assert!(store.get(KEY_START_TIME).unwrap().is_some());
}

#[tokio::test]
async fn test_start_same_task_is_idempotent() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();

    timer.start(&api, &mut store, 7, &task(1)).await.unwrap();
    let second = timer.start(&api, &mut store, 7, &task(1)).await.unwrap();

    assert_eq!(second, StartOutcome::AlreadyRunning);
    assert_eq!(timer.state().task_id(), Some(1));
    // Exactly one remote start, no stop
    assert_eq!(api.ops(), vec!["start:1"]);
}

#[tokio::test]
async fn test_start_different_task_stops_previous_first() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();

    timer.start(&api, &mut store, 7, &task(1)).await.unwrap();
    let outcome = timer.start(&api, &mut store, 7, &task(2)).await.unwrap();

    assert_eq!(outcome, StartOutcome::Switched { stopped_task_id: 1 });
    assert_eq!(timer.state().task_id(), Some(2));
    assert_eq!(api.ops(), vec!["start:1", "stop", "start:2"]);
}

#[tokio::test]
async fn test_start_failure_rolls_back() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    api.fail_start.set(true);
    let mut timer = TimerTracker::load(&store).unwrap();

    let result = timer.start(&api, &mut store, 7, &task(1)).await;

    assert!(result.is_err());
    assert_eq!(*timer.state(), TimerState::Idle);
    assert_eq!(store.get(KEY_RUNNING).unwrap(), None);
}

#[tokio::test]
async fn test_stop_while_idle_is_a_noop() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();

    let outcome = timer.stop(&api, &mut store, 7).await.unwrap();

    assert_eq!(outcome, StopOutcome::NothingRunning);
    assert!(api.ops().is_empty());
}

#[tokio::test]
async fn test_stop_clears_state_on_success() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();

    timer.start(&api, &mut store, 7, &task(1)).await.unwrap();
    let outcome = timer.stop(&api, &mut store, 7).await.unwrap();

    assert!(matches!(outcome, StopOutcome::Stopped { .. }));
    assert_eq!(*timer.state(), TimerState::Idle);
    assert_eq!(store.get(KEY_STATE).unwrap(), None);
    assert_eq!(store.get(KEY_RUNNING).unwrap(), None);
    assert_eq!(store.get(KEY_TASK_ID).unwrap(), None);
}

#[tokio::test]
async fn test_failed_remote_stop_leaves_local_running() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();

    timer.start(&api, &mut store, 7, &task(1)).await.unwrap();
    api.fail_stop.set(true);

    let result = timer.stop(&api, &mut store, 7).await;

    assert!(result.is_err());
    assert_eq!(timer.state().task_id(), Some(1));
    assert_eq!(store.get(KEY_RUNNING).unwrap().as_deref(), Some("true"));
}

#[tokio::test]
async fn test_force_clear_skips_remote() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();

    timer.start(&api, &mut store, 7, &task(1)).await.unwrap();
    timer.force_clear(&mut store).unwrap();

    assert_eq!(*timer.state(), TimerState::Idle);
    assert_eq!(store.get(KEY_STATE).unwrap(), None);
    assert_eq!(api.ops(), vec!["start:1"]);
}

#[tokio::test]
async fn test_reconcile_adopts_remote_state() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let started = at(0);
    api.status.borrow_mut().push(TimerEntry {
        task_id: Some(5),
        project_id: Some(9),
        start_time: Some(started),
        end_time: None,
    });
    let mut timer = TimerTracker::load(&store).unwrap();

    let changed = timer.reconcile(&api, &mut store, 7).await.unwrap();

    assert!(changed);
    assert_eq!(
        *timer.state(),
        TimerState::Running {
            task_id: 5,
            project_id: Some(9),
            started_at: started,
        }
    );
    // Adopted state is persisted for the other surfaces
    assert_eq!(store.get(KEY_TASK_ID).unwrap().as_deref(), Some("5"));
}

#[tokio::test]
async fn test_reconcile_clears_local_when_remote_idle() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();
    timer.start(&api, &mut store, 7, &task(5)).await.unwrap();

    // Remote only has a finished entry
    api.status.borrow_mut().push(TimerEntry {
        task_id: Some(5),
        project_id: None,
        start_time: Some(at(0)),
        end_time: Some(at(60)),
    });

    let changed = timer.reconcile(&api, &mut store, 7).await.unwrap();

    assert!(changed);
    assert_eq!(*timer.state(), TimerState::Idle);
    assert_eq!(store.get(KEY_RUNNING).unwrap(), None);
}

#[tokio::test]
async fn test_reconcile_matching_state_is_noop() {
    let (_dir, mut store) = open_store();
    let api = FakeTimerApi::default();
    let mut timer = TimerTracker::load(&store).unwrap();
    timer.start(&api, &mut store, 7, &task(5)).await.unwrap();

    api.status.borrow_mut().push(TimerEntry {
        task_id: Some(5),
        project_id: Some(9),
        start_time: Some(at(0)),
        end_time: None,
    });

    let changed = timer.reconcile(&api, &mut store, 7).await.unwrap();
    assert!(!changed);
    assert_eq!(timer.state().task_id(), Some(5));
}

// ============================================
// Persistence and cross-process reads
// ============================================

#[tokio::test]
async fn test_persisted_state_survives_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    let mut store = KvStore::open(&path).unwrap();
    let api = FakeTimerApi::default();

    let mut timer = TimerTracker::load(&store).unwrap();
    timer.start(&api, &mut store, 7, &task(3)).await.unwrap();

    // A second surface opens its own handle and sees the running timer
    let other_store = KvStore::open(&path).unwrap();
    let other = TimerTracker::load(&other_store).unwrap();
    assert_eq!(other.state(), timer.state());
}

#[test]
fn test_reload_detects_external_change() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    let store = KvStore::open(&path).unwrap();
    let mut timer = TimerTracker::load(&store).unwrap();

    // Another process writes a running state
    let writer = KvStore::open(&path).unwrap();
    let state = TimerState::Running {
        task_id: 4,
        project_id: None,
        started_at: at(0),
    };
    writer
        .set(KEY_STATE, &serde_json::to_string(&state).unwrap())
        .unwrap();

    assert!(timer.reload(&store).unwrap());
    assert_eq!(timer.state().task_id(), Some(4));
    // No change on the next poll
    assert!(!timer.reload(&store).unwrap());
}

#[test]
fn test_partial_flattened_write_read_repairs_to_idle() {
    let (_dir, store) = open_store();

    // Torn write from an external tool: running flag without a task id
    store.set(KEY_RUNNING, "true").unwrap();

    let timer = TimerTracker::load(&store).unwrap();
    assert_eq!(*timer.state(), TimerState::Idle);
}

#[test]
fn test_flattened_keys_are_a_usable_fallback() {
    let (_dir, store) = open_store();

    store.set(KEY_RUNNING, "true").unwrap();
    store.set(KEY_TASK_ID, "11").unwrap();
    store.set(KEY_START_TIME, &at(0).to_rfc3339()).unwrap();

    let timer = TimerTracker::load(&store).unwrap();
    assert_eq!(timer.state().task_id(), Some(11));
}

#[test]
fn test_malformed_structured_state_reads_as_idle() {
    let (_dir, store) = open_store();

    store.set(KEY_STATE, "{broken").unwrap();

    let timer = TimerTracker::load(&store).unwrap();
    assert_eq!(*timer.state(), TimerState::Idle);
}

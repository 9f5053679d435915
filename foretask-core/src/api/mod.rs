//! Forecast API access
//!
//! [`ForecastClient`] is the real HTTP client. The engine components depend
//! only on the [`TaskSource`] and [`TimerApi`] seams so the cache and timer
//! logic can be exercised against in-memory fakes.

pub mod client;
pub mod routes;

use std::future::Future;

use crate::error::Result;
use crate::types::{Task, TimerEntry};

pub use client::ForecastClient;

/// Source of task records for the cache manager.
pub trait TaskSource {
    /// Fetch all tasks updated within the last `hours_back` hours.
    fn fetch_tasks(&self, hours_back: i64) -> impl Future<Output = Result<Vec<Task>>>;
}

/// Remote timer endpoint used by the timer state machine.
pub trait TimerApi {
    fn start_timer(&self, person_id: i64, task_id: i64) -> impl Future<Output = Result<()>>;

    fn stop_timer(&self, person_id: i64) -> impl Future<Output = Result<()>>;

    fn timer_status(&self, person_id: i64) -> impl Future<Output = Result<Vec<TimerEntry>>>;
}

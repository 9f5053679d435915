//! # foretask-core
//!
//! Core library for foretask - a Forecast task browser and work timer.
//!
//! This library provides:
//! - Wire and state types for the Forecast API
//! - An HTTP client with retry for transient failures
//! - A per-user task snapshot cache with freshness and stale fallback
//! - Pure relevance filters (assignment, recency, categories, search)
//! - The timer state machine, reconciled against the remote endpoint
//! - A SQLite-backed key-value store shared between the UI surfaces
//! - Configuration and logging infrastructure
//!
//! ## Architecture
//!
//! UI surfaces ask the [`Tracker`] facade for tasks; the cache serves a valid
//! snapshot or delegates to the remote source. The relevance module derives
//! filtered views. Timer start/stop goes remote-first, persists into the
//! store, and a periodic reconcile adopts the remote endpoint as the source
//! of truth. Separate surface processes share nothing but the store.
//!
//! ## Example
//!
//! ```rust,no_run
//! use foretask_core::{Config, Tracker};
//!
//! let config = Config::load().expect("failed to load config");
//! let mut tracker = Tracker::connect(&config).expect("failed to connect");
//! let tasks = tracker.tasks(false).expect("failed to load tasks");
//! ```

// Re-export commonly used items at the crate root
pub use api::{ForecastClient, TaskSource, TimerApi};
pub use cache::TaskCache;
pub use config::Config;
pub use error::{Error, Result};
pub use store::KvStore;
pub use timer::{StartOutcome, StopOutcome, TimerTracker};
pub use tracker::Tracker;
pub use types::*;

// Public modules
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod relevance;
pub mod store;
pub mod timer;
pub mod tracker;
pub mod types;

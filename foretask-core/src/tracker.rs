//! Blocking facade for the UI surfaces
//!
//! The surfaces are synchronous event loops; [`Tracker`] owns a
//! current-thread runtime and drives the async client, cache and timer
//! behind blocking methods. `&mut self` on the timer mutations means a
//! surface structurally cannot issue a second start/stop before the prior
//! one settled.

use chrono::Utc;

use crate::api::ForecastClient;
use crate::cache::TaskCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::relevance;
use crate::store::KvStore;
use crate::timer::{StartOutcome, StopOutcome, TimerTracker};
use crate::types::{Person, Task, TimerState};

/// Synchronous handle over the whole engine.
pub struct Tracker {
    runtime: tokio::runtime::Runtime,
    client: ForecastClient,
    store: KvStore,
    cache: TaskCache,
    timer: TimerTracker,
    person: Person,
}

impl Tracker {
    /// Validate config, resolve the configured person and load persisted
    /// state. Fails fast on missing configuration or an unknown email
    /// (dependent operations are withheld until identity resolves).
    pub fn connect(config: &Config) -> Result<Self> {
        let client = ForecastClient::new(&config.forecast)?;
        let email = config.forecast.require_user_email()?.to_string();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Io)?;

        let person = runtime.block_on(client.find_person(&email))?;
        tracing::info!(person_id = person.id, "Resolved configured person");

        let store = KvStore::open_default()?;
        let timer = TimerTracker::load(&store)?;
        let cache = TaskCache::new(chrono::Duration::seconds(
            config.cache.expiry_secs as i64,
        ));

        Ok(Self {
            runtime,
            client,
            store,
            cache,
            timer,
            person,
        })
    }

    pub fn person(&self) -> &Person {
        &self.person
    }

    /// Today's lookback window in hours (weekday-dependent).
    pub fn lookback_hours(&self) -> i64 {
        relevance::lookback_hours(Utc::now())
    }

    /// Cached-or-fresh tasks for the configured person's account.
    pub fn tasks(&self, force_refresh: bool) -> Result<Vec<Task>> {
        let hours_back = self.lookback_hours();
        self.runtime.block_on(self.cache.get_tasks(
            &self.store,
            &self.client,
            self.person.id,
            hours_back,
            force_refresh,
        ))
    }

    /// Drop the cached snapshot for the configured person.
    pub fn invalidate_cache(&self) -> Result<()> {
        self.cache.invalidate(&self.store, self.person.id)
    }

    pub fn timer_state(&self) -> &TimerState {
        self.timer.state()
    }

    /// Start (or switch) the timer onto `task`.
    pub fn start_timer(&mut self, task: &Task) -> Result<StartOutcome> {
        let Self {
            runtime,
            client,
            store,
            timer,
            person,
            ..
        } = self;
        runtime.block_on(timer.start(client, store, person.id, task))
    }

    /// Stop the running timer, if any.
    pub fn stop_timer(&mut self) -> Result<StopOutcome> {
        let Self {
            runtime,
            client,
            store,
            timer,
            person,
            ..
        } = self;
        runtime.block_on(timer.stop(client, store, person.id))
    }

    /// Clear local timer state without a remote call.
    pub fn force_clear_timer(&mut self) -> Result<()> {
        self.timer.force_clear(&mut self.store)
    }

    /// Reconcile against the remote timer endpoint; remote wins.
    ///
    /// Returns true when local state changed.
    pub fn reconcile(&mut self) -> Result<bool> {
        let Self {
            runtime,
            client,
            store,
            timer,
            person,
            ..
        } = self;
        runtime.block_on(timer.reconcile(client, store, person.id))
    }

    /// Re-read shared timer state written by another surface.
    ///
    /// Returns true when the state changed since the last read.
    pub fn refresh_shared_state(&mut self) -> Result<bool> {
        self.timer.reload(&self.store)
    }
}

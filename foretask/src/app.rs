//! Application state for the task list TUI.

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use foretask_core::timer::{StartOutcome, StopOutcome};
use foretask_core::{format, relevance, Config, Task, Tracker};
use ratatui::widgets::TableState;

/// Category filter over the assigned task set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    All,
    HighPriority,
    Blocked,
    Bugs,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::All => "All",
            Category::HighPriority => "High Priority",
            Category::Blocked => "Blocked",
            Category::Bugs => "Bugs",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Category::All => Category::HighPriority,
            Category::HighPriority => Category::Blocked,
            Category::Blocked => Category::Bugs,
            Category::Bugs => Category::All,
        }
    }
}

/// Main application state.
pub struct App {
    tracker: Tracker,
    /// Assigned + recent tasks, newest first (base list for all filters)
    pub tasks: Vec<Task>,
    /// Tasks after category + search filtering
    pub filtered: Vec<Task>,
    /// Table selection state
    pub table_state: TableState,
    /// Active category filter
    pub category: Category,
    /// Current search query
    pub search: String,
    /// True while the search bar has input focus
    pub searching: bool,
    /// Transient status/error line
    pub status: Option<String>,
    /// Lookback window used for the current task list
    pub lookback_hours: i64,
    /// Reconcile interval in seconds (from config)
    pub reconcile_secs: u64,
    /// Whether the app should exit
    pub should_quit: bool,
}

impl App {
    pub fn new(tracker: Tracker, config: &Config) -> Self {
        let lookback_hours = tracker.lookback_hours();
        Self {
            tracker,
            tasks: Vec::new(),
            filtered: Vec::new(),
            table_state: TableState::default(),
            category: Category::default(),
            search: String::new(),
            searching: false,
            status: None,
            lookback_hours,
            reconcile_secs: config.sync.reconcile_secs.max(1),
            should_quit: false,
        }
    }

    /// Name of the configured person, for the header.
    pub fn person_name(&self) -> String {
        self.tracker.person().display_name()
    }

    /// Task id of the locally running timer, if any.
    pub fn running_task_id(&self) -> Option<i64> {
        self.tracker.timer_state().task_id()
    }

    /// Ticking clock for the running timer.
    pub fn elapsed_clock(&self) -> Option<String> {
        let state = self.tracker.timer_state();
        state
            .is_running()
            .then(|| format::format_clock(state.elapsed(Utc::now())))
    }

    /// Load tasks through the cache and rebuild the filtered view.
    ///
    /// A fetch failure keeps the last good list on screen and reports
    /// through the status line.
    pub fn load_tasks(&mut self, force_refresh: bool) {
        let person_id = self.tracker.person().id;
        self.lookback_hours = self.tracker.lookback_hours();

        match self.tracker.tasks(force_refresh) {
            Ok(all) => {
                let mine = relevance::assigned_to(&all, person_id);
                self.tasks = relevance::recently_updated(&mine, self.lookback_hours, Utc::now());
                self.apply_filters();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load tasks");
                self.status = Some(format!("Failed to load tasks: {}", e));
            }
        }
    }

    /// Reconcile the timer against the remote endpoint (sync tick).
    pub fn reconcile(&mut self) {
        match self.tracker.reconcile() {
            Ok(true) => tracing::debug!("Reconcile changed local timer state"),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Timer sync failed");
                self.status = Some("Timer sync failed".to_string());
            }
        }
    }

    fn apply_filters(&mut self) {
        let base = match self.category {
            Category::All => self.tasks.clone(),
            Category::HighPriority => relevance::high_priority(&self.tasks),
            Category::Blocked => relevance::blocked(&self.tasks),
            Category::Bugs => relevance::bugs(&self.tasks),
        };
        self.filtered = relevance::search(&base, &self.search);

        // Keep the selection in range
        if self.filtered.is_empty() {
            self.table_state.select(None);
        } else {
            let selected = self.table_state.selected().unwrap_or(0);
            self.table_state
                .select(Some(selected.min(self.filtered.len() - 1)));
        }
    }

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.searching {
            self.handle_search_key(key);
        } else {
            self.handle_list_key(key);
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Char('/') => {
                self.searching = true;
            }
            KeyCode::Tab => {
                self.category = self.category.next();
                self.apply_filters();
            }
            KeyCode::Char('r') => {
                self.status = None;
                self.load_tasks(true);
            }
            KeyCode::Enter => {
                self.toggle_selected_timer();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_previous();
            }
            KeyCode::Home | KeyCode::Char('g') => {
                if !self.filtered.is_empty() {
                    self.table_state.select(Some(0));
                }
            }
            KeyCode::End | KeyCode::Char('G') => {
                if !self.filtered.is_empty() {
                    self.table_state.select(Some(self.filtered.len() - 1));
                }
            }
            KeyCode::Esc => {
                if !self.search.is_empty() {
                    self.search.clear();
                    self.apply_filters();
                }
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.searching = false;
                self.search.clear();
                self.apply_filters();
            }
            KeyCode::Enter => {
                self.searching = false;
            }
            KeyCode::Backspace => {
                self.search.pop();
                self.apply_filters();
            }
            KeyCode::Char(c) => {
                self.search.push(c);
                self.apply_filters();
            }
            _ => {}
        }
    }

    /// Start the timer on the selected task, or stop it if it is already
    /// the running one.
    fn toggle_selected_timer(&mut self) {
        let Some(task) = self
            .table_state
            .selected()
            .and_then(|i| self.filtered.get(i))
            .cloned()
        else {
            return;
        };

        if self.running_task_id() == Some(task.id) {
            match self.tracker.stop_timer() {
                Ok(StopOutcome::Stopped { elapsed }) => {
                    self.status = Some(format!(
                        "Timer stopped for \"{}\" ({})",
                        task.title,
                        format::format_elapsed_brief(elapsed)
                    ));
                }
                Ok(StopOutcome::NothingRunning) => {
                    self.status = Some("No timer is running".to_string());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to stop timer");
                    self.status = Some(format!("Failed to stop timer: {}", e));
                }
            }
            return;
        }

        match self.tracker.start_timer(&task) {
            Ok(StartOutcome::Started) | Ok(StartOutcome::AlreadyRunning) => {
                self.status = Some(format!("Timer started for T{}", task.company_task_id));
            }
            Ok(StartOutcome::Switched { stopped_task_id }) => {
                tracing::info!(stopped_task_id, new_task_id = task.id, "Switched timer");
                self.status = Some(format!("Timer switched to T{}", task.company_task_id));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start timer");
                self.status = Some(format!("Failed to start timer: {}", e));
            }
        }
    }

    fn select_next(&mut self) {
        if self.filtered.is_empty() {
            return;
        }
        let next = match self.table_state.selected() {
            Some(i) if i + 1 < self.filtered.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.table_state.select(Some(next));
    }

    fn select_previous(&mut self) {
        if self.filtered.is_empty() {
            return;
        }
        let previous = match self.table_state.selected() {
            Some(i) if i > 0 => i - 1,
            _ => 0,
        };
        self.table_state.select(Some(previous));
    }
}

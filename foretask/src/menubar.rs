//! foretask-menubar - passive timer status widget
//!
//! A compact surface that mirrors the shared timer state: it re-reads the
//! key-value store every couple of seconds to pick up changes made by the
//! other surfaces, reconciles against the remote endpoint on the slower
//! sync tick, and redraws the elapsed clock every frame.

use std::io;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use foretask_core::timer::StopOutcome;
use foretask_core::{format, Config, Task, Tracker};
use ratatui::{
    backend::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};

const RUNNING_COLOR: Color = Color::Rgb(80, 200, 120);
const DIM_COLOR: Color = Color::Rgb(128, 128, 128);

/// Maximum task title length before truncation.
const TITLE_CHARS: usize = 20;

struct MenubarApp {
    tracker: Tracker,
    /// Cached snapshot for resolving the running task's title
    tasks: Vec<Task>,
    status: Option<String>,
    store_poll_secs: u64,
    reconcile_secs: u64,
    should_quit: bool,
}

impl MenubarApp {
    fn new(tracker: Tracker, config: &Config) -> Self {
        Self {
            tracker,
            tasks: Vec::new(),
            status: None,
            store_poll_secs: config.sync.store_poll_secs.max(1),
            reconcile_secs: config.sync.reconcile_secs.max(1),
            should_quit: false,
        }
    }

    /// Resolve the running task's title from the cached snapshot only; the
    /// widget never forces a fetch.
    fn load_titles(&mut self) {
        match self.tracker.tasks(false) {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => tracing::debug!(error = %e, "No task snapshot for titles"),
        }
    }

    fn running_title(&self, task_id: i64) -> String {
        self.tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| format::truncate_title(&t.title, TITLE_CHARS))
            .unwrap_or_else(|| format!("task {}", task_id))
    }

    fn poll_store(&mut self) {
        match self.tracker.refresh_shared_state() {
            Ok(true) => tracing::debug!("Shared timer state changed"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to re-read shared state"),
        }
    }

    fn reconcile(&mut self) {
        if let Err(e) = self.tracker.reconcile() {
            tracing::warn!(error = %e, "Timer sync failed");
            self.status = Some("sync failed".to_string());
        } else {
            self.status = None;
        }
    }

    fn stop(&mut self) {
        match self.tracker.stop_timer() {
            Ok(StopOutcome::Stopped { elapsed }) => {
                self.status = Some(format!(
                    "stopped ({})",
                    format::format_elapsed_brief(elapsed)
                ));
            }
            Ok(StopOutcome::NothingRunning) => {
                self.status = Some("no timer running".to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to stop timer");
                self.status = Some("stop failed".to_string());
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('s') => self.stop(),
            _ => {}
        }
    }
}

fn render(frame: &mut Frame, app: &MenubarApp) {
    let state = app.tracker.timer_state();

    let mut lines = Vec::new();
    lines.push(match state.task_id() {
        Some(task_id) => Line::from(vec![
            Span::styled("● ", Style::default().fg(RUNNING_COLOR)),
            Span::raw(app.running_title(task_id)),
            Span::raw(" - "),
            Span::styled(
                format::format_clock(state.elapsed(Utc::now())),
                Style::default()
                    .fg(RUNNING_COLOR)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        None => Line::from(vec![
            Span::styled("○ ", Style::default().fg(DIM_COLOR)),
            Span::styled("no active task", Style::default().fg(DIM_COLOR)),
        ]),
    });

    let hint = app
        .status
        .clone()
        .unwrap_or_else(|| "s stop · q quit".to_string());
    lines.push(Line::from(Span::styled(hint, Style::default().fg(DIM_COLOR))));

    frame.render_widget(Paragraph::new(lines), frame.area());
}

fn main() -> Result<()> {
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        foretask_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("foretask-menubar starting up");

    let tracker = Tracker::connect(&config).context("failed to connect to Forecast")?;
    let mut app = MenubarApp::new(tracker, &config);
    app.load_titles();

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    tracing::info!("foretask-menubar shutting down");

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut MenubarApp,
) -> Result<()> {
    // ~100ms per tick: the store poll and the remote reconcile run on
    // their configured intervals, the clock redraws every frame.
    let mut tick: u64 = 0;
    let store_poll_every = app.store_poll_secs * 10;
    let reconcile_every = app.reconcile_secs * 10;

    loop {
        tick = tick.wrapping_add(1);
        if tick % store_poll_every == 0 {
            app.poll_store();
        }
        if tick % reconcile_every == 0 {
            app.reconcile();
        }

        terminal.draw(|frame| render(frame, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

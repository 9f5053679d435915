//! foretask - Forecast task browser and work timer
//!
//! Terminal UI for browsing your most relevant Forecast tasks and tracking
//! time on them.

mod app;
mod ui;

use std::io;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use foretask_core::{Config, Tracker};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::app::App;

fn main() -> Result<()> {
    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        foretask_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("foretask TUI starting up");

    // Resolve the configured person and load persisted state. Missing
    // config or an unknown email blocks here, before any terminal setup.
    let tracker = Tracker::connect(&config).context("failed to connect to Forecast")?;

    // Create app and load the initial task list (a fetch failure lands in
    // the status line, not a crash)
    let mut app = App::new(tracker, &config);
    app.load_tasks(false);

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;

    tracing::info!("foretask TUI shutting down");

    result
}

/// Run the main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Tick counter at ~100ms per tick; the remote timer status is
    // reconciled every reconcile_secs. Both intervals end with this loop.
    let mut tick: u64 = 0;
    let reconcile_every = app.reconcile_secs * 10;

    loop {
        tick = tick.wrapping_add(1);
        if tick % reconcile_every == 0 {
            app.reconcile();
        }

        // Render (elapsed time is recomputed from the start timestamp on
        // every frame, never stored)
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    Ok(())
}

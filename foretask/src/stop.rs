//! foretask-stop - stop the running work timer
//!
//! One-shot command for keybindings and scripts: stops the remote timer,
//! clears the shared local state and prints the elapsed time.

use anyhow::{Context, Result};
use clap::Parser;
use foretask_core::timer::StopOutcome;
use foretask_core::{format, Config, Tracker};

#[derive(Parser)]
#[command(name = "foretask-stop")]
#[command(about = "Stop the running Forecast work timer")]
#[command(version)]
struct Args {
    /// Clear local timer state even if the remote stop call fails
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        foretask_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("foretask-stop starting");

    let mut tracker = Tracker::connect(&config).context("failed to connect to Forecast")?;

    match tracker.stop_timer() {
        Ok(StopOutcome::Stopped { elapsed }) => {
            println!("Timer stopped ({})", format::format_elapsed_brief(elapsed));
        }
        Ok(StopOutcome::NothingRunning) => {
            println!("No timer is running");
        }
        Err(e) if args.force => {
            tracker
                .force_clear_timer()
                .context("failed to clear local timer state")?;
            println!("Remote stop failed ({}); local timer state cleared", e);
        }
        Err(e) => {
            return Err(e).context("failed to stop timer");
        }
    }

    Ok(())
}

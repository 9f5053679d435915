//! Formatting helpers shared across UI surfaces.

use chrono::{DateTime, Duration, Utc};

/// Format a task's update timestamp the way the list accessory shows it.
pub fn format_updated(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = now.signed_duration_since(updated_at).num_hours();

    if hours < 1 {
        "updated just now".to_string()
    } else if hours < 24 {
        format!("updated {}h ago", hours)
    } else {
        format!("updated {}d ago", (hours + 12) / 24)
    }
}

/// Format an elapsed duration as `HH:MM:SS` for the ticking clock.
pub fn format_clock(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Format an elapsed duration briefly, e.g. `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_elapsed_brief(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);

    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Truncate a task title for the compact menubar surface.
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

//! UI rendering for the task list TUI.

use chrono::Utc;
use foretask_core::format;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;

/// Running-timer accent
const TIMER_COLOR: Color = Color::Rgb(80, 200, 120);
/// Blocked marker
const BLOCKED_COLOR: Color = Color::Rgb(220, 80, 80);
/// Bug marker
const BUG_COLOR: Color = Color::Rgb(220, 180, 0);
/// Secondary text
const DIM_COLOR: Color = Color::Rgb(128, 128, 128);
/// Header accent
const HEADER_COLOR: Color = Color::Rgb(0, 180, 180);

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Layout: header, search bar, table, footer
    let chunks = Layout::vertical([
        Constraint::Length(2), // Header
        Constraint::Length(1), // Search bar
        Constraint::Min(3),    // Task table
        Constraint::Length(1), // Footer / status
    ])
    .split(area);

    render_header(frame, app, chunks[0]);
    render_search_bar(frame, app, chunks[1]);
    render_table(frame, app, chunks[2]);
    render_footer(frame, app, chunks[3]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            " foretask ",
            Style::default()
                .fg(HEADER_COLOR)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(app.person_name(), Style::default().fg(DIM_COLOR)),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", app.category.label()),
            Style::default().fg(HEADER_COLOR),
        ),
    ];

    if let Some(clock) = app.elapsed_clock() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("⏱ {}", clock),
            Style::default().fg(TIMER_COLOR).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

fn render_search_bar(frame: &mut Frame, app: &App, area: Rect) {
    let line = if app.searching || !app.search.is_empty() {
        Line::from(vec![
            Span::styled("search: ", Style::default().fg(DIM_COLOR)),
            Span::raw(app.search.clone()),
            Span::styled(
                if app.searching { "▌" } else { "" },
                Style::default().fg(HEADER_COLOR),
            ),
        ])
    } else {
        Line::from(Span::styled(
            "press / to search",
            Style::default().fg(DIM_COLOR),
        ))
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_table(frame: &mut Frame, app: &mut App, area: Rect) {
    if app.filtered.is_empty() {
        render_empty_state(frame, app, area);
        return;
    }

    let now = Utc::now();
    let running_id = app.running_task_id();

    let rows: Vec<Row> = app
        .filtered
        .iter()
        .map(|task| {
            let is_running = running_id == Some(task.id);

            let indicator = if is_running {
                Cell::from("⏱").style(Style::default().fg(TIMER_COLOR))
            } else {
                Cell::from(" ")
            };

            let mut markers = Vec::new();
            if task.blocked {
                markers.push(Span::styled("blocked", Style::default().fg(BLOCKED_COLOR)));
            }
            if task.bug {
                if !markers.is_empty() {
                    markers.push(Span::raw(" "));
                }
                markers.push(Span::styled("bug", Style::default().fg(BUG_COLOR)));
            }
            if task.high_priority {
                if !markers.is_empty() {
                    markers.push(Span::raw(" "));
                }
                markers.push(Span::styled("priority", Style::default().fg(HEADER_COLOR)));
            }

            let title_style = if is_running {
                Style::default().fg(TIMER_COLOR)
            } else {
                Style::default()
            };

            Row::new(vec![
                indicator,
                Cell::from(format!("T{}", task.company_task_id)).style(Style::default().fg(DIM_COLOR)),
                Cell::from(task.title.clone()).style(title_style),
                Cell::from(Line::from(markers)),
                Cell::from(format::format_updated(task.updated_at, now))
                    .style(Style::default().fg(DIM_COLOR)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(7),
            Constraint::Min(20),
            Constraint::Length(22),
            Constraint::Length(18),
        ],
    )
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_empty_state(frame: &mut Frame, app: &App, area: Rect) {
    let message = if !app.search.trim().is_empty() {
        format!("No tasks match \"{}\"", app.search)
    } else if app.tasks.is_empty() {
        format!(
            "No tasks assigned to you were updated in the last {} days.\n\
             Mondays and Tuesdays look further back to bridge the weekend.",
            (app.lookback_hours / 24).max(1)
        )
    } else {
        format!("No {} tasks right now", app.category.label().to_lowercase())
    };

    let paragraph = Paragraph::new(message)
        .style(Style::default().fg(DIM_COLOR))
        .block(Block::default().borders(Borders::NONE));
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.status {
        Some(status) => Line::from(Span::styled(
            status.clone(),
            Style::default().fg(BUG_COLOR),
        )),
        None => Line::from(Span::styled(
            "enter start/stop · / search · tab category · r refresh · q quit",
            Style::default().fg(DIM_COLOR),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

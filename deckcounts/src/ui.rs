//! UI rendering for the TUI.

use chrono::{Local, TimeZone, Utc};
use deckcounts_core::{CellHint, CountCell, DeckRow, DeckStatsNode, LearningCounts};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{App, ViewMode};

// ========== Count Colors ==========

/// Zero counts and the later cell when nothing is pending
const COUNT_MUTED: Color = Color::DarkGray;
const COUNT_NEW: Color = Color::Rgb(80, 140, 255);
const COUNT_DUE: Color = Color::Rgb(50, 205, 50);
const COUNT_LATER: Color = Color::Rgb(230, 80, 80);
const COUNT_BURIED: Color = Color::Rgb(220, 180, 0);
/// Border color for the deck table
const BORDER_DECKS: Color = Color::Rgb(0, 150, 150);
/// Tree guide color
const SEPARATOR_COLOR: Color = Color::Rgb(60, 60, 60);

/// Render the UI.
pub fn render(frame: &mut Frame, app: &mut App) {
    match &app.view_mode {
        ViewMode::Decks => render_decks_view(frame, app),
        ViewMode::Detail { deck_name, .. } => render_detail_view(frame, app, deck_name.clone()),
    }
}

/// Render the deck table view.
fn render_decks_view(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Layout: header, table, footer
    let chunks = Layout::vertical([
        Constraint::Length(3), // Header
        Constraint::Min(5),    // Table
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, "Decks", chunks[0]);
    render_table(frame, app, chunks[1]);
    render_decks_footer(frame, app, chunks[2]);
}

/// Render the counters of a single deck.
fn render_detail_view(frame: &mut Frame, app: &mut App, deck_name: String) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(3), // Header
        Constraint::Min(5),    // Counters
        Constraint::Length(1), // Footer
    ])
    .split(area);

    render_header(frame, &format!("Deck: {}", deck_name), chunks[0]);
    render_detail_panel(frame, app, chunks[1]);
    render_detail_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, title: &str, area: Rect) {
    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).bold())
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

fn render_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let header_cells = [
        Cell::from("Deck"),
        Cell::from(Line::from("New").alignment(Alignment::Right)),
        Cell::from(Line::from("Due").alignment(Alignment::Right)),
        Cell::from(Line::from("Later").alignment(Alignment::Right)),
        Cell::from(Line::from("Buried").alignment(Alignment::Right)),
    ]
    .into_iter()
    .map(|c| c.style(Style::default().fg(Color::Yellow).bold()));
    let header = Row::new(header_cells).height(1);

    let rows = app.rows().iter().map(|deck| {
        let counts = &deck.counts;
        Row::new([
            deck_name_cell(deck),
            count_cell(&counts.new),
            count_cell(&counts.due),
            count_cell(&counts.later),
            count_cell(&counts.buried),
        ])
    });

    let widths = [
        Constraint::Fill(1),    // Deck (flexible)
        Constraint::Length(7),  // New
        Constraint::Length(9),  // Due, wide enough for "[1440m]"
        Constraint::Length(14), // Later
        Constraint::Length(7),  // Buried
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(BORDER_DECKS))
                .title(" Decks "),
        )
        .row_highlight_style(
            Style::default()
                .add_modifier(Modifier::REVERSED)
                .fg(Color::Cyan),
        )
        .highlight_symbol("▶ ");

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

/// Name cell with tree indentation and collapse marker.
fn deck_name_cell(deck: &DeckRow) -> Cell<'static> {
    let mut name_style = Style::default();
    if deck.current {
        name_style = name_style.add_modifier(Modifier::BOLD);
    }
    if deck.filtered {
        name_style = name_style.add_modifier(Modifier::ITALIC);
    }

    Cell::from(Line::from(vec![
        Span::styled(indent(deck.level), Style::default().fg(SEPARATOR_COLOR)),
        Span::styled(
            format!("{} ", marker_or_blank(deck)),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(deck.name.clone(), name_style),
    ]))
}

fn indent(level: u32) -> String {
    "  ".repeat(level.saturating_sub(1) as usize)
}

fn marker_or_blank(deck: &DeckRow) -> &'static str {
    match deck.collapse_marker() {
        "" => " ",
        marker => marker,
    }
}

fn count_cell(cell: &CountCell) -> Cell<'static> {
    Cell::from(Line::from(cell.text.clone()).alignment(Alignment::Right))
        .style(Style::default().fg(hint_color(cell.hint)))
}

fn hint_color(hint: CellHint) -> Color {
    match hint {
        CellHint::Muted => COUNT_MUTED,
        CellHint::New => COUNT_NEW,
        CellHint::Due => COUNT_DUE,
        CellHint::Later => COUNT_LATER,
        CellHint::Buried => COUNT_BURIED,
    }
}

// ========== Detail Panel ==========

fn render_detail_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_DECKS))
        .title(" Counters ");

    let lines = match app.detail_node() {
        Some(node) => detail_lines(node),
        None => vec![Line::from(Span::styled(
            "Deck no longer in the collection",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn detail_lines(node: &DeckStatsNode) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("New          ", label),
            Span::raw(node.new_cards.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Due reviews  ", label),
            Span::raw(node.due_rev_cards.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Due learning ", label),
            Span::raw(node.due_lrn_reps.to_string()),
        ]),
        Line::raw(""),
        Line::from(vec![
            Span::styled(format!("{:<16}", ""), label),
            Span::styled(format!("{:>8}", "deck"), Style::default().fg(Color::Yellow)),
            Span::styled(format!("{:>8}", "subtree"), Style::default().fg(Color::Yellow)),
        ]),
    ];

    let own = &node.own;
    let total = &node.total;
    let pairs: [(&str, fn(&LearningCounts) -> i64); 7] = [
        ("Learning reps", |c| c.lrn_reps),
        ("Learning cards", |c| c.lrn_cards),
        ("Due learning", |c| c.due_lrn_cards),
        ("Day learning", |c| c.lrn_day_cards),
        ("Buried", |c| c.buried_cards),
        ("Later cards", LearningCounts::later_cards),
        ("Later reps", LearningCounts::later_reps),
    ];
    for (name, value) in pairs {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<16}", name), label),
            Span::raw(format!("{:>8}", value(own))),
            Span::raw(format!("{:>8}", value(total))),
        ]));
    }

    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
        Span::styled("Next learning ", label),
        Span::raw(format_soonest(total.lrn_soonest)),
    ]));
    lines
}

fn format_soonest(soonest: Option<i64>) -> String {
    match soonest.and_then(|ts| Local.timestamp_opt(ts, 0).single()) {
        Some(at) => at.format("%H:%M").to_string(),
        None => "none pending".to_string(),
    }
}

// ========== Footers ==========

fn render_decks_footer(frame: &mut Frame, app: &App, area: Rect) {
    let deck_count = app.rows().len();
    let selected = app.table_state.selected().map(|i| i + 1).unwrap_or(0);

    let mut footer_spans = vec![
        Span::styled(" Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" collapse  "),
        Span::styled("c", Style::default().fg(Color::Yellow)),
        Span::raw(" select  "),
        Span::styled("d", Style::default().fg(Color::Yellow)),
        Span::raw(" details  "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" refresh  "),
        Span::styled("j/k", Style::default().fg(Color::Yellow)),
        Span::raw(" navigate  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" quit  "),
        Span::raw("│ "),
        Span::styled(
            format!("{}/{} decks", selected, deck_count),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    if let Some(summary) = &app.summary {
        footer_spans.push(Span::raw(" │ "));
        footer_spans.push(Span::styled(
            format!("updated {}", format_relative_time(summary.generated_at)),
            Style::default().fg(Color::DarkGray),
        ));
    }

    push_status(&mut footer_spans, app);
    frame.render_widget(Paragraph::new(Line::from(footer_spans)), area);
}

fn render_detail_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut footer_spans = vec![
        Span::styled(" Esc", Style::default().fg(Color::Yellow)),
        Span::raw(" back  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" quit  "),
        Span::raw("│ "),
        Span::styled("paused", Style::default().fg(Color::DarkGray)),
    ];
    push_status(&mut footer_spans, app);
    frame.render_widget(Paragraph::new(Line::from(footer_spans)), area);
}

fn push_status(spans: &mut Vec<Span<'static>>, app: &App) {
    if let Some(status) = &app.status {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            status.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
}

fn format_relative_time(ts: chrono::DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(ts);

    if duration.num_seconds() < 5 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else {
        ts.with_timezone(&Local).format("%H:%M").to_string()
    }
}

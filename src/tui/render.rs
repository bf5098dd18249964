/// Ratatui draw entry-point.
/// Thin dispatcher: the transcript lives in chat.rs, the sidebar in sidebar.rs.
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use super::AppState;
use super::chat::SPINNER_GLYPHS;
use crate::controller::View;
use crate::conversation::Role;
use crate::ui::role_glyph;

/// Composer grows with its content up to this many text rows
const MAX_INPUT_ROWS: usize = 6;
/// "  ❯ " is 4 columns; continuation rows are indented to match
const PROMPT_WIDTH: u16 = 4;

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    // Horizontal split when sidebar is visible
    let main_area = if state.sidebar_visible {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(30), Constraint::Min(0)])
            .split(area);
        super::sidebar::draw_sidebar(f, state, cols[0]);
        cols[1]
    } else {
        area
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),                          // welcome / transcript
            Constraint::Length(1),                       // status bar
            Constraint::Length(input_height(state)),     // composer
        ])
        .split(main_area);

    match state.controller.view() {
        View::Welcome    => draw_welcome(f, state, chunks[0]),
        View::Transcript => super::chat::draw_history(f, state, chunks[0]),
    }
    draw_status_bar(f, state, chunks[1]);
    draw_input(f, state, chunks[2]);
}

/// Top border plus one row per composer line, capped.
fn input_height(state: &AppState) -> u16 {
    let rows = state.input.split('\n').count().clamp(1, MAX_INPUT_ROWS);
    rows as u16 + 1
}

// ── Welcome screen ────────────────────────────────────────────────────────────

fn draw_welcome(f: &mut Frame, state: &AppState, area: Rect) {
    f.render_widget(
        Block::default().style(Style::default().bg(Color::Rgb(8, 8, 14))),
        area,
    );

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{} ", role_glyph(Role::Assistant)),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                state.assistant_name.clone(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            "Ask anything. Answers support Markdown and code.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::raw(""),
    ];

    for (i, suggestion) in state.suggestions.iter().take(9).enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("[{}] ", i + 1), Style::default().fg(Color::Cyan)),
            Span::styled(suggestion.clone(), Style::default().fg(Color::Rgb(150, 145, 190))),
        ]));
    }
    if !state.suggestions.is_empty() {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "press a number to ask",
            Style::default().fg(Color::Rgb(70, 70, 90)),
        )));
    }

    let height = lines.len() as u16;
    let y = area.height.saturating_sub(height) / 2;
    let body = Rect {
        x: area.x,
        y: area.y + y,
        width: area.width,
        height: height.min(area.height),
    };
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        body,
    );
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let pending = state.controller.in_flight();

    // Animated spinner glyph while an answer is pending
    let (status_glyph, status_color) = if pending > 0 {
        let g = SPINNER_GLYPHS[(state.spinner_tick as usize) % SPINNER_GLYPHS.len()];
        (g, Color::Cyan)
    } else {
        (role_glyph(Role::Assistant), Color::White)
    };

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(status_glyph, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::styled(" genie", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(state.profile.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(state.endpoint.clone(), Style::default().fg(Color::Rgb(100, 180, 220))),
    ];
    if pending > 0 {
        spans.push(Span::styled(
            format!("  {pending} pending"),
            Style::default().fg(Color::Cyan),
        ));
    }
    match state.controller.notice() {
        Some(notice) => spans.push(Span::styled(
            format!("  {notice}"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        None => spans.push(Span::styled(
            "  Ctrl+N new  Ctrl+B sidebar  Tab chats",
            Style::default().fg(Color::Rgb(55, 50, 90)),
        )),
    }

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(10, 10, 18))),
        area,
    );
}

// ── Composer ──────────────────────────────────────────────────────────────────

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let (border_color, prompt_color) = if state.sidebar_focused {
        (Color::Rgb(40, 40, 60), Color::DarkGray)
    } else if state.send_enabled {
        (Color::Rgb(60, 60, 80), Color::Cyan)
    } else {
        (Color::Rgb(60, 60, 80), Color::Rgb(60, 60, 80))
    };

    let prompt_style = Style::default().fg(prompt_color).add_modifier(Modifier::BOLD);
    let lines: Vec<Line> = if state.input.is_empty() {
        vec![Line::from(vec![
            Span::styled("  ❯ ", prompt_style),
            Span::styled(
                "message · Enter send · Shift+Enter newline",
                Style::default().fg(Color::Rgb(70, 70, 90)),
            ),
        ])]
    } else {
        state
            .input
            .split('\n')
            .enumerate()
            .map(|(i, row)| {
                let lead = if i == 0 { "  ❯ " } else { "    " };
                Line::from(vec![
                    Span::styled(lead, prompt_style),
                    Span::styled(row.to_string(), Style::default().fg(Color::White)),
                ])
            })
            .collect()
    };

    // Keep the cursor row in view when the text is taller than the box
    let (cursor_row, cursor_col) = cursor_position(&state.input, state.cursor);
    let visible_rows = area.height.saturating_sub(1) as usize;
    let first_row = (cursor_row + 1).saturating_sub(visible_rows);

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(Color::Rgb(8, 8, 14)));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((first_row as u16, 0))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);

    if !state.sidebar_focused {
        let cursor_x = area.x + PROMPT_WIDTH + cursor_col as u16;
        let cursor_y = area.y + 1 + cursor_row.saturating_sub(first_row) as u16; // +1 for top border
        if cursor_x < area.x + area.width && cursor_y < area.y + area.height {
            f.set_cursor_position((cursor_x, cursor_y));
        }
    }
}

/// (row, display column) of a byte cursor in multi-line text.
fn cursor_position(text: &str, cursor: usize) -> (usize, usize) {
    let before = &text[..cursor.min(text.len())];
    let row = before.matches('\n').count();
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    (row, before[line_start..].width())
}

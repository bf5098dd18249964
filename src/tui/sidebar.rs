/// Conversation sidebar: collapsible left panel listing chats, newest first.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
};
use std::ops::Range;

use unicode_width::UnicodeWidthStr;

use super::AppState;

/// Header (title + rule) and footer (blank + hint) rows around the entries
const CHROME_ROWS: usize = 4;

pub fn draw_sidebar(f: &mut Frame, state: &AppState, area: Rect) {
    let focused = state.sidebar_focused;
    let border_color = if focused { Color::Cyan } else { Color::Rgb(40, 38, 60) };

    let block = Block::default()
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(Color::Rgb(6, 6, 12)));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let w = inner.width as usize;
    let sidebar = state.controller.sidebar();
    let mut items: Vec<ListItem<'static>> = Vec::new();

    // Header
    let ctrl_hint = if focused { " Esc=exit" } else { " Tab=focus" };
    let header_pad = w.saturating_sub(6 + ctrl_hint.len());
    items.push(ListItem::new(Line::from(vec![
        Span::styled(" Chats", Style::default().fg(Color::Rgb(100, 95, 150)).add_modifier(Modifier::BOLD)),
        Span::styled(" ".repeat(header_pad), Style::default()),
        Span::styled(ctrl_hint.to_string(), Style::default().fg(Color::Rgb(50, 47, 75))),
    ])));
    items.push(ListItem::new(Line::from(vec![
        Span::styled("─".repeat(w), Style::default().fg(Color::Rgb(35, 33, 55))),
    ])));

    // Scroll so the cursor (or the active chat when unfocused) is on screen
    let anchor = if focused {
        sidebar.cursor()
    } else {
        sidebar.entries().iter().position(|e| e.active).unwrap_or(0)
    };
    let rows = (inner.height as usize).saturating_sub(CHROME_ROWS);
    let window = visible_range(sidebar.entries().len(), anchor, rows);

    if sidebar.entries().is_empty() {
        items.push(ListItem::new(Line::from(vec![
            Span::styled(" no chats yet", Style::default().fg(Color::Rgb(50, 47, 75))),
        ])));
    }
    for (i, entry) in sidebar.entries().iter().enumerate().skip(window.start).take(window.len()) {
        let selected = focused && i == sidebar.cursor();

        // Active chat = cyan; cursor (focused) = bright highlight
        let (bg, bullet_fg, name_fg) = match (entry.active, selected) {
            (true, true)   => (Color::Rgb(20, 40, 50), Color::Cyan, Color::Cyan),
            (true, false)  => (Color::Rgb(10, 22, 30), Color::Cyan, Color::Cyan),
            (false, true)  => (Color::Rgb(28, 26, 48), Color::Rgb(160, 155, 220), Color::White),
            (false, false) => (Color::Reset, Color::Rgb(60, 57, 90), Color::Rgb(150, 145, 190)),
        };
        let bullet = if entry.active { "●" } else { "○" };

        let title = clip(&entry.title, w.saturating_sub(3));
        let gap = w.saturating_sub(3 + title.width());
        let name_style = Style::default().fg(name_fg).bg(bg).add_modifier(if entry.active {
            Modifier::BOLD
        } else {
            Modifier::empty()
        });
        items.push(ListItem::new(Line::from(vec![
            Span::styled(format!(" {bullet} "), Style::default().fg(bullet_fg).bg(bg)),
            Span::styled(title, name_style),
            Span::styled(" ".repeat(gap), Style::default().bg(bg)),
        ])));
    }

    // Footer hint
    items.push(ListItem::new(Line::raw("")));
    items.push(ListItem::new(Line::from(vec![
        Span::styled(" [+] New  Ctrl+N", Style::default().fg(Color::Rgb(55, 52, 80))),
    ])));

    f.render_widget(List::new(items), inner);
}

/// Slice of `len` entries, at most `rows` long, that contains `anchor`.
fn visible_range(len: usize, anchor: usize, rows: usize) -> Range<usize> {
    let rows = rows.max(1);
    let anchor = anchor.min(len.saturating_sub(1));
    let start = (anchor + 1).saturating_sub(rows);
    start..len.min(start + rows)
}

/// Cut `s` to at most `max` display columns.
fn clip(s: &str, max: usize) -> String {
    let mut out = String::new();
    let mut width = 0;
    for c in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw > max {
            break;
        }
        width += cw;
        out.push(c);
    }
    out
}

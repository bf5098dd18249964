/// Transcript pane rendering: build_items, draw_history, spinner, wrapping.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, List, ListItem},
};
use unicode_width::UnicodeWidthStr;

use super::AppState;
use crate::conversation::Role;
use crate::markdown;
use crate::transcript::EntryBody;
use crate::ui::role_label;

// ── Spinner ────────────────────────────────────────────────────────────────────

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_MSGS: &[(&str, Color)] = &[
    ("thinking…",          Color::Cyan),
    ("looking into it…",   Color::Cyan),
    ("composing answer…",  Color::Rgb(0, 200, 255)),
    ("almost there…",      Color::Rgb(100, 200, 255)),
];

pub fn spinner_frame(tick: u32) -> (&'static str, &'static str, Color) {
    let glyph = SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()];
    // Message cycles more slowly: every ~2 seconds (120ms × 16 ticks)
    let msg_idx = (tick as usize / 16) % SPINNER_MSGS.len();
    let (msg, color) = SPINNER_MSGS[msg_idx];
    (glyph, msg, color)
}

const ASSISTANT_INDENT: &str = "    ";

// ── Items ──────────────────────────────────────────────────────────────────────

pub fn build_items(state: &AppState, term_width: u16) -> Vec<ListItem<'static>> {
    let mut items: Vec<ListItem<'static>> = Vec::new();

    for entry in state.controller.transcript().entries() {
        match (entry.role, &entry.body) {
            (Role::User, body) => {
                let text = match body {
                    EntryBody::Plain(s) => s.as_str(),
                    // User entries are always plain; anything else shows nothing
                    _ => "",
                };
                push_user_bubble(&mut items, text, term_width);
            }
            (Role::Assistant, body) => {
                items.push(ListItem::new(Line::from(Span::styled(
                    format!("  {}", role_label(Role::Assistant, &state.assistant_name)),
                    Style::default()
                        .fg(Color::Rgb(0, 210, 210))
                        .add_modifier(Modifier::BOLD),
                ))));
                let wrap_width = (term_width as usize)
                    .saturating_sub(ASSISTANT_INDENT.len() + 1)
                    .max(20);
                match body {
                    EntryBody::Plain(text) => {
                        let style = Style::default().fg(Color::Rgb(230, 180, 120));
                        for src_line in text.lines() {
                            for w in wrap_text(src_line, wrap_width) {
                                items.push(indented(vec![Span::styled(w, style)]));
                            }
                        }
                    }
                    EntryBody::Markdown(md) => {
                        push_markdown(&mut items, md, wrap_width);
                    }
                    EntryBody::Typing => {
                        let (glyph, msg, color) = spinner_frame(state.spinner_tick);
                        items.push(indented(vec![
                            Span::styled(glyph, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                            Span::styled(format!(" {msg}"), Style::default().fg(color)),
                        ]));
                    }
                }
                items.push(ListItem::new(Line::raw("")));
            }
        }
    }

    items
}

fn indented(mut spans: Vec<Span<'static>>) -> ListItem<'static> {
    spans.insert(0, Span::raw(ASSISTANT_INDENT));
    ListItem::new(Line::from(spans))
}

fn push_user_bubble(items: &mut Vec<ListItem<'static>>, msg: &str, term_width: u16) {
    // Bubble colours
    let bg       = Color::Rgb(28, 26, 52);
    let border   = Color::Rgb(110, 90, 200);
    let label_fg = Color::Rgb(160, 140, 255);
    let text_fg  = Color::Rgb(235, 232, 255);
    let body_style = Style::default().fg(text_fg).bg(bg);
    let edge_style = Style::default().fg(border).bg(bg);

    // 2 chars left margin, 1 right margin
    let inner_w = (term_width as usize).saturating_sub(3).max(10);
    let label = role_label(Role::User, "");
    // "╭─ " + label + " " + dashes + "╮"
    let dash_total = inner_w.saturating_sub(5 + label.width());
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled("╭─ ", edge_style),
        Span::styled(label, Style::default().fg(label_fg).bg(bg).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {}╮", "─".repeat(dash_total)), edge_style),
    ])));

    // Body: word-wrap inside the box (inner_w minus "│ " = 2)
    let wrap_width = inner_w.saturating_sub(2).max(10);
    let raw_lines: Vec<&str> = if msg.is_empty() { vec![""] } else { msg.lines().collect() };
    for line in raw_lines.iter().flat_map(|line| wrap_text(line, wrap_width)) {
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled("│ ", edge_style),
            Span::styled(line, body_style),
        ])));
    }

    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("╰{}╯", "─".repeat(inner_w.saturating_sub(2))), edge_style),
    ])));
    items.push(ListItem::new(Line::raw("")));
}

fn push_markdown(items: &mut Vec<ListItem<'static>>, md: &markdown::RenderedMarkdown, wrap_width: usize) {
    let frame_style = Style::default().fg(Color::Rgb(60, 60, 80));
    for (i, block) in md.blocks.iter().enumerate() {
        if i > 0 {
            items.push(ListItem::new(Line::raw("")));
        }
        match block {
            markdown::Block::Prose(lines) => {
                for line in lines {
                    for wrapped in wrap_line(line, wrap_width) {
                        items.push(indented(wrapped.spans));
                    }
                }
            }
            // Code is never wrapped; long lines are clipped by the pane
            markdown::Block::Code(code) => {
                let tag = if code.lang.is_empty() { "code" } else { code.lang.as_str() };
                items.push(indented(vec![Span::styled(format!("┌─ {tag}"), frame_style)]));
                for line in code.lines() {
                    let mut spans = vec![Span::styled("│ ", frame_style)];
                    spans.extend(line.spans);
                    items.push(indented(spans));
                }
                items.push(indented(vec![Span::styled("└─", frame_style)]));
            }
        }
    }
}

// ── Draw ───────────────────────────────────────────────────────────────────────

pub fn draw_history(f: &mut Frame, state: &AppState, area: Rect) {
    let all_items = build_items(state, area.width);
    let total = all_items.len();
    let visible = area.height as usize;
    state.history_overflow.set(total.saturating_sub(visible));

    // Scroll is measured up from the bottom; clamp so the top stays reachable
    let skip = if total > visible {
        (total - visible).saturating_sub(state.controller.transcript().scroll())
    } else {
        0
    };

    let sliced: Vec<ListItem<'static>> = all_items.into_iter().skip(skip).collect();
    let list = List::new(sliced)
        .block(Block::default().style(Style::default().bg(Color::Rgb(8, 8, 14))));
    f.render_widget(list, area);
}

// ── Utilities ──────────────────────────────────────────────────────────────────

/// Word-wrap a single line of text to `max_width` columns.
/// Splits on whitespace; never breaks a word unless it alone exceeds max_width.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = word.width();
        if current_width == 0 {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + 1 + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// `wrap_text` for styled lines: each word keeps the style of the span it
/// came from. Leading whitespace (list and quote indents) is kept on the
/// first line only.
pub fn wrap_line(line: &Line<'static>, max_width: usize) -> Vec<Line<'static>> {
    if line.width() <= max_width {
        return vec![line.clone()];
    }

    // Split into (word, style) tokens, remembering which had a space before them
    let mut tokens: Vec<(String, Style, bool)> = Vec::new();
    let mut leading = String::new();
    let mut space_pending = false;
    for span in &line.spans {
        let mut rest = span.content.as_ref();
        while !rest.is_empty() {
            let ws_len = rest.len() - rest.trim_start().len();
            if ws_len > 0 {
                if tokens.is_empty() {
                    leading.push_str(&rest[..ws_len]);
                } else {
                    space_pending = true;
                }
                rest = &rest[ws_len..];
                continue;
            }
            let word_len = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let glued = !space_pending && !tokens.is_empty();
            match tokens.last_mut() {
                // Same word continued in a new span ("**bold**text")
                Some(last) if glued && last.1 == span.style => last.0.push_str(&rest[..word_len]),
                _ => tokens.push((rest[..word_len].to_string(), span.style, !glued && !tokens.is_empty())),
            }
            space_pending = false;
            rest = &rest[word_len..];
        }
    }

    let mut out: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut width = 0usize;
    if !leading.is_empty() {
        width = leading.width();
        current.push(Span::raw(leading));
    }
    // Width before the first word of the current line
    let mut floor = width;
    for (word, style, spaced) in tokens {
        let w = word.width();
        let gap = usize::from(spaced && width > floor);
        if width > floor && width + gap + w > max_width {
            out.push(Line::from(std::mem::take(&mut current)));
            width = 0;
            floor = 0;
        } else if gap == 1 {
            current.push(Span::raw(" "));
            width += 1;
        }
        width += w;
        current.push(Span::styled(word, style));
    }
    if !current.is_empty() {
        out.push(Line::from(current));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::line_text;

    #[test]
    fn test_wrap_text_basic() {
        assert_eq!(wrap_text("", 10), vec![""]);
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("supercalifragilistic x", 5), vec!["supercalifragilistic", "x"]);
    }

    #[test]
    fn test_wrap_text_wide_chars() {
        // Each CJK char is two columns wide
        assert_eq!(wrap_text("日本 日本 日本", 9), vec!["日本 日本", "日本"]);
    }

    #[test]
    fn test_wrap_line_keeps_styles() {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let line = Line::from(vec![
            Span::raw("alpha beta "),
            Span::styled("gamma", bold),
            Span::raw(" delta"),
        ]);
        let wrapped = wrap_line(&line, 11);
        let texts: Vec<String> = wrapped.iter().map(line_text).collect();
        assert_eq!(texts, vec!["alpha beta", "gamma delta"]);
        let gamma = wrapped[1].spans.iter().find(|s| s.content == "gamma").unwrap();
        assert_eq!(gamma.style, bold);
    }

    #[test]
    fn test_wrap_line_short_is_untouched() {
        let line = Line::from(vec![Span::raw("  • "), Span::raw("item")]);
        let wrapped = wrap_line(&line, 40);
        assert_eq!(wrapped.len(), 1);
        assert_eq!(line_text(&wrapped[0]), "  • item");
    }

    #[test]
    fn test_wrap_line_glued_spans() {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let line = Line::from(vec![
            Span::styled("foo", bold),
            Span::raw("bar baz qux"),
        ]);
        let texts: Vec<String> = wrap_line(&line, 7).iter().map(line_text).collect();
        assert_eq!(texts, vec!["foobar", "baz qux"]);
    }

    #[test]
    fn test_spinner_frame_cycles() {
        let (a, _, _) = spinner_frame(0);
        let (b, _, _) = spinner_frame(1);
        assert_ne!(a, b);
        assert_eq!(spinner_frame(0).0, spinner_frame(SPINNER_GLYPHS.len() as u32).0);
    }
}

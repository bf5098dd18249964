/// Markdown → styled terminal text.
///
/// Prose is rendered to ratatui `Line`s (unwrapped; the transcript view wraps
/// to the pane width). Fenced and indented code blocks are kept as raw source
/// so the highlighter can colour them in a separate pass.
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

#[derive(Debug, Clone, Default)]
pub struct RenderedMarkdown {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone)]
pub enum Block {
    Prose(Vec<Line<'static>>),
    Code(CodeBlock),
}

#[derive(Debug, Clone)]
pub struct CodeBlock {
    /// Language tag from the opening fence; empty for indented blocks
    pub lang: String,
    pub source: String,
    /// Filled by `highlight::highlight_block`
    pub highlighted: Option<Vec<Line<'static>>>,
}

impl CodeBlock {
    /// Highlighted lines if available, otherwise the raw source in the code colour.
    pub fn lines(&self) -> Vec<Line<'static>> {
        match &self.highlighted {
            Some(lines) => lines.clone(),
            None => self
                .source
                .lines()
                .map(|l| Line::from(Span::styled(l.to_string(), code_style())))
                .collect(),
        }
    }
}

impl RenderedMarkdown {
    pub fn code_blocks_mut(&mut self) -> impl Iterator<Item = &mut CodeBlock> {
        self.blocks.iter_mut().filter_map(|b| match b {
            Block::Code(c) => Some(c),
            Block::Prose(_) => None,
        })
    }

    /// Concatenated visible text, one line per rendered line.
    #[cfg(test)]
    pub fn to_plain(&self) -> String {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Prose(lines) => out.extend(lines.iter().map(line_text)),
                Block::Code(code) => out.extend(code.source.lines().map(str::to_string)),
            }
        }
        out.join("\n")
    }
}

#[cfg(test)]
pub fn line_text(line: &Line<'_>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

fn code_style() -> Style {
    Style::default().fg(Color::Rgb(200, 190, 150))
}

fn heading_style(level: usize) -> Style {
    let color = match level {
        1 => Color::Cyan,
        2 => Color::Rgb(0, 200, 220),
        _ => Color::Rgb(120, 180, 220),
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

// ── Renderer ──────────────────────────────────────────────────────────────────

/// Render Markdown (GFM-ish: tables, strikethrough, task lists; single
/// newlines are line breaks).
pub fn render(markdown: &str) -> RenderedMarkdown {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut w = Writer::default();
    for event in Parser::new_ext(markdown, options) {
        w.event(event);
    }
    w.finish()
}

#[derive(Default)]
struct Writer {
    blocks: Vec<Block>,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// One entry per open list: next ordinal for ordered lists, None for bullets
    lists: Vec<Option<u64>>,
    /// Marker for the first line of the current list item ("• ", "3. ")
    item_marker: Option<String>,
    quote_depth: usize,
    link_url: Option<String>,
    code: Option<CodeBlock>,
}

impl Writer {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, patch: Style) {
        let next = self.style().patch(patch);
        self.styles.push(next);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn prefix(&mut self) -> Vec<Span<'static>> {
        let mut spans = Vec::new();
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ));
        }
        if !self.lists.is_empty() {
            let indent = "  ".repeat(self.lists.len() - 1);
            match self.item_marker.take() {
                Some(marker) => {
                    spans.push(Span::raw(indent));
                    spans.push(Span::styled(marker, Style::default().fg(Color::Cyan)));
                }
                None => spans.push(Span::raw(format!("{indent}  "))),
            }
        }
        spans
    }

    fn text(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        if self.current.is_empty() {
            self.current = self.prefix();
        }
        self.current.push(Span::styled(text.to_string(), style));
    }

    fn flush_line(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
    }

    fn blank_line(&mut self) {
        self.flush_line();
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn flush_prose(&mut self) {
        self.flush_line();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        if !self.lines.is_empty() {
            self.blocks.push(Block::Prose(std::mem::take(&mut self.lines)));
        }
    }

    fn event(&mut self, event: Event<'_>) {
        if let Some(code) = &mut self.code {
            match event {
                Event::Text(t) => code.source.push_str(&t),
                Event::End(TagEnd::CodeBlock) => {
                    let mut block = self.code.take().unwrap_or_else(|| CodeBlock {
                        lang: String::new(),
                        source: String::new(),
                        highlighted: None,
                    });
                    let trimmed = block.source.trim_end_matches('\n').len();
                    block.source.truncate(trimmed);
                    self.blocks.push(Block::Code(block));
                }
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(t) => {
                let style = self.style();
                self.text(&t, style);
            }
            Event::Code(t) => {
                let style = self.style().patch(code_style().bg(Color::Rgb(30, 30, 40)));
                self.text(&t, style);
            }
            // No markup is interpreted in a terminal; show it literally
            Event::Html(t) | Event::InlineHtml(t) => {
                let style = self.style().fg(Color::DarkGray);
                for (i, part) in t.split('\n').enumerate() {
                    if i > 0 {
                        self.flush_line();
                    }
                    self.text(part, style);
                }
            }
            Event::SoftBreak | Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(Color::DarkGray),
                )));
                self.blank_line();
            }
            Event::TaskListMarker(done) => {
                let mark = if done { "[x] " } else { "[ ] " };
                let style = self.style();
                self.text(mark, style);
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_line();
                self.push_style(heading_style(level as usize));
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.link_url = Some(dest_url.to_string());
                self.push_style(
                    Style::default()
                        .fg(Color::Rgb(100, 160, 255))
                        .add_modifier(Modifier::UNDERLINED),
                );
            }
            Tag::BlockQuote { .. } => {
                self.flush_line();
                self.quote_depth += 1;
                self.push_style(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::List(start) => {
                self.flush_line();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush_line();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let m = format!("{n}. ");
                        *n += 1;
                        m
                    }
                    _ => "• ".to_string(),
                };
                self.item_marker = Some(marker);
            }
            Tag::CodeBlock(kind) => {
                self.flush_prose();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or("").to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeBlock {
                    lang,
                    source: String::new(),
                    highlighted: None,
                });
            }
            Tag::TableHead => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_line();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Heading { .. } => {
                self.pop_style();
                self.blank_line();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link_url.take() {
                    self.text(&format!(" <{url}>"), Style::default().fg(Color::DarkGray));
                }
            }
            TagEnd::BlockQuote { .. } => {
                self.pop_style();
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank_line();
            }
            TagEnd::List { .. } => {
                self.flush_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::TableCell => {
                self.text(" │ ", Style::default().fg(Color::DarkGray));
            }
            TagEnd::TableHead => {
                self.pop_style();
                self.flush_line();
            }
            TagEnd::TableRow => self.flush_line(),
            TagEnd::Table => self.blank_line(),
            _ => {}
        }
    }

    fn finish(mut self) -> RenderedMarkdown {
        self.flush_prose();
        RenderedMarkdown {
            blocks: self.blocks,
        }
    }
}

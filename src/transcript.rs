/// The visible transcript of the current conversation.
///
/// Every insertion re-anchors the view to the newest entry (`scroll` is an
/// offset up from the bottom, so 0 means "showing the latest").
use crate::conversation::Role;
use crate::highlight;
use crate::markdown::{self, CodeBlock, RenderedMarkdown};

#[derive(Debug, Clone)]
pub enum EntryBody {
    /// Shown verbatim, never interpreted as Markdown
    Plain(String),
    Markdown(RenderedMarkdown),
    /// Pending-response indicator
    Typing,
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub role: Role,
    pub body: EntryBody,
    key: u64,
}

/// Handle to a typing placeholder. Not `Clone`: it can be removed exactly once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a typing placeholder must be removed when its exchange settles"]
pub struct TypingHandle(u64);

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    scroll: usize,
    next_key: u64,
}

impl Transcript {
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Scroll toward older entries. `limit` is how many rows sit above the
    /// view when fully scrolled to the bottom.
    pub fn scroll_up(&mut self, lines: usize, limit: usize) {
        self.scroll = self.scroll.saturating_add(lines).min(limit);
    }

    pub fn scroll_down(&mut self, lines: usize, limit: usize) {
        self.scroll = self.scroll.min(limit).saturating_sub(lines);
    }

    fn push(&mut self, role: Role, body: EntryBody) -> u64 {
        // Keys are never reset, so a stale handle cannot match a newer entry
        let key = self.next_key;
        self.next_key += 1;
        self.entries.push(TranscriptEntry { role, body, key });
        self.scroll = 0;
        key
    }

    pub fn render_plain(&mut self, role: Role, text: &str) {
        self.push(role, EntryBody::Plain(text.to_string()));
    }

    /// Render Markdown, then run the highlighter over every code block shown.
    pub fn render_markdown(&mut self, role: Role, markdown_text: &str) {
        self.push(role, EntryBody::Markdown(markdown::render(markdown_text)));
        highlight::highlight_all(self);
    }

    pub fn render_typing_placeholder(&mut self) -> TypingHandle {
        TypingHandle(self.push(Role::Assistant, EntryBody::Typing))
    }

    /// Remove a placeholder. Returns false if it is already gone (e.g. the
    /// transcript was cleared while the exchange was pending).
    pub fn remove_typing(&mut self, handle: TypingHandle) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.key == handle.0 && matches!(e.body, EntryBody::Typing)));
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.scroll = 0;
    }

    #[cfg(test)]
    pub fn has_typing(&self) -> bool {
        self.entries.iter().any(|e| matches!(e.body, EntryBody::Typing))
    }

    pub(crate) fn code_blocks_mut(&mut self) -> impl Iterator<Item = &mut CodeBlock> {
        self.entries
            .iter_mut()
            .filter_map(|e| match &mut e.body {
                EntryBody::Markdown(md) => Some(md),
                _ => None,
            })
            .flat_map(|md| md.code_blocks_mut())
    }
}

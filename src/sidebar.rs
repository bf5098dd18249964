/// Session sidebar model: a one-way view of the store's conversation list.
///
/// Newest entries sit at the top. At most one entry is active; it is the
/// entry for the current conversation whenever that conversation exists.
use tracing::debug;

use crate::conversation::{Conversation, ConversationId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub id: ConversationId,
    pub title: String,
    pub active: bool,
}

type ChosenHandler = Box<dyn FnMut(ConversationId)>;

#[derive(Default)]
pub struct Sidebar {
    entries: Vec<SidebarEntry>,
    /// Keyboard cursor (index into `entries`), independent of the active entry
    cursor: usize,
    on_chosen: Option<ChosenHandler>,
}

impl Sidebar {
    pub fn entries(&self) -> &[SidebarEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.entries.iter().find(|e| e.active).map(|e| &e.id)
    }

    /// Insert an entry at the top. A conversation is only ever projected once.
    pub fn register_conversation(&mut self, conversation: &Conversation) -> bool {
        if self.entries.iter().any(|e| &e.id == conversation.id()) {
            debug!(id = %conversation.id(), "conversation already in sidebar");
            return false;
        }
        self.entries.insert(
            0,
            SidebarEntry {
                id: conversation.id().clone(),
                title: conversation.title().to_string(),
                active: false,
            },
        );
        // Keep the cursor on the same entry it pointed at
        if self.entries.len() > 1 {
            self.cursor += 1;
        }
        true
    }

    /// Mark exactly the matching entry active. Unknown ids change nothing.
    pub fn select_conversation(&mut self, id: &ConversationId) -> bool {
        let Some(idx) = self.entries.iter().position(|e| &e.id == id) else {
            return false;
        };
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.active = i == idx;
        }
        self.cursor = idx;
        true
    }

    /// Used while the current conversation has no messages yet.
    pub fn clear_selection(&mut self) {
        for entry in &mut self.entries {
            entry.active = false;
        }
    }

    pub fn on_conversation_chosen(&mut self, handler: impl FnMut(ConversationId) + 'static) {
        self.on_chosen = Some(Box::new(handler));
    }

    /// Put the cursor on the active entry, or the top one if none is active.
    pub fn reset_cursor(&mut self) {
        self.cursor = self.entries.iter().position(|e| e.active).unwrap_or(0);
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_down(&mut self) {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
        }
    }

    /// The user picked the entry under the cursor: hand its id to the handler.
    pub fn choose(&mut self) -> bool {
        let Some(entry) = self.entries.get(self.cursor) else {
            return false;
        };
        let id = entry.id.clone();
        match &mut self.on_chosen {
            Some(handler) => {
                handler(id);
                true
            }
            None => false,
        }
    }
}

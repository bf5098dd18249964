/// Owns every known conversation and tracks which one is current.
///
/// Constructed once at startup via `restore()`, then mutated only through its
/// operations. Sidebar projection of new/restored conversations is done by the
/// caller: `ensure_current_conversation` hands back the freshly created entry.
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, ConversationId, Message};
use crate::storage::Storage;

/// Single storage key holding the JSON array of all conversations.
pub const STORAGE_KEY: &str = "aiGenie_conversations";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not write `{key}`: {source}")]
    Io {
        key: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize conversations: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct ConversationStore {
    conversations: Vec<Conversation>,
    current: ConversationId,
    storage: Box<dyn Storage>,
}

impl ConversationStore {
    /// Load the stored snapshot. A missing, unreadable or corrupt snapshot
    /// yields an empty store. The current id is always a fresh, unbacked one.
    pub fn restore(storage: Box<dyn Storage>) -> Self {
        let conversations = match load_snapshot(storage.as_ref()) {
            Ok(list) => list,
            Err(e) => {
                warn!("discarding stored conversations: {e:#}");
                Vec::new()
            }
        };
        info!(count = conversations.len(), "restored conversations");
        Self {
            conversations,
            current: ConversationId::generate(),
            storage,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn current_id(&self) -> &ConversationId {
        &self.current
    }

    pub fn find(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id() == id)
    }

    /// The conversation behind the current id, if its first message was sent.
    pub fn current(&self) -> Option<&Conversation> {
        self.find(&self.current)
    }

    /// Mint a new current id. No conversation is created until the first message.
    pub fn start_new_conversation(&mut self) -> &ConversationId {
        self.current = ConversationId::generate();
        debug!(id = %self.current, "new conversation id");
        &self.current
    }

    /// Make an existing conversation current. Unknown ids are ignored.
    pub fn set_current(&mut self, id: &ConversationId) -> bool {
        if self.find(id).is_none() {
            warn!(%id, "cannot switch to unknown conversation");
            return false;
        }
        self.current = id.clone();
        true
    }

    /// Create the current conversation if it does not exist yet.
    /// Returns the new conversation only on the call that created it.
    pub fn ensure_current_conversation(&mut self, first_message: &str) -> Option<&Conversation> {
        if self.current().is_some() {
            return None;
        }
        let conversation = Conversation::new(self.current.clone(), first_message);
        debug!(id = %self.current, title = conversation.title(), "conversation created");
        self.conversations.push(conversation);
        self.conversations.last()
    }

    /// Append to the identified conversation. Unknown ids are a logged no-op.
    pub fn append_message(&mut self, id: &ConversationId, message: Message) -> bool {
        match self.conversations.iter_mut().find(|c| c.id() == id) {
            Some(conversation) => {
                conversation.push(message);
                true
            }
            None => {
                warn!(%id, "append to unknown conversation dropped");
                false
            }
        }
    }

    /// Overwrite the stored snapshot with every conversation.
    pub fn persist(&mut self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.conversations)?;
        self.storage
            .set_item(STORAGE_KEY, &json)
            .map_err(|source| StoreError::Io {
                key: STORAGE_KEY,
                source,
            })?;
        debug!(count = self.conversations.len(), bytes = json.len(), "conversations saved");
        Ok(())
    }
}

fn load_snapshot(storage: &dyn Storage) -> anyhow::Result<Vec<Conversation>> {
    use anyhow::Context;

    let Some(raw) = storage.get_item(STORAGE_KEY).context("read failed")? else {
        return Ok(Vec::new());
    };
    let list: Vec<Conversation> = serde_json::from_str(&raw).context("corrupt snapshot")?;

    // Keep the first record for any id that appears twice
    let mut seen = std::collections::HashSet::new();
    Ok(list
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.id().clone());
            if !fresh {
                warn!(id = %c.id(), "duplicate conversation in snapshot skipped");
            }
            fresh
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn empty_store() -> ConversationStore {
        ConversationStore::restore(Box::new(MemoryStorage::default()))
    }

    #[test]
    fn test_new_id_creates_no_conversation() {
        let mut store = empty_store();
        let first = store.current_id().clone();
        let second = store.start_new_conversation().clone();
        assert_ne!(first, second);
        assert!(store.conversations().is_empty());
        assert!(store.current().is_none());
    }

    #[test]
    fn test_ensure_current_is_idempotent() {
        let mut store = empty_store();
        let created = store.ensure_current_conversation("Hello").cloned();
        assert_eq!(created.as_ref().map(|c| c.title()), Some("Hello"));
        assert!(store.ensure_current_conversation("Something else").is_none());
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.current().unwrap().title(), "Hello");
    }

    #[test]
    fn test_append_unknown_id_is_noop() {
        let mut store = empty_store();
        assert!(!store.append_message(&ConversationId::from("ghost"), Message::user("x")));
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn test_find_missing_returns_none() {
        let store = empty_store();
        assert!(store.find(&ConversationId::from("nope")).is_none());
    }

    #[test]
    fn test_set_current_rejects_unknown() {
        let mut store = empty_store();
        let before = store.current_id().clone();
        assert!(!store.set_current(&ConversationId::from("nope")));
        assert_eq!(store.current_id(), &before);
    }

    #[test]
    fn test_persist_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConversationStore::restore(Box::new(FileStorage::new(dir.path())));

        store.ensure_current_conversation("first question");
        let a = store.current_id().clone();
        store.append_message(&a, Message::user("first question"));
        store.append_message(&a, Message::assistant("answer", Some("**answer**".into())));

        store.start_new_conversation();
        store.ensure_current_conversation("second");
        let b = store.current_id().clone();
        store.append_message(&b, Message::user("second"));
        store.append_message(&b, Message::assistant("plain", None));
        store.persist().unwrap();

        let restored = ConversationStore::restore(Box::new(FileStorage::new(dir.path())));
        assert_eq!(restored.conversations(), store.conversations());
        assert_eq!(restored.conversations()[0].id(), &a);
        assert_eq!(restored.conversations()[1].id(), &b);
    }

    #[test]
    fn test_restore_reads_browser_snapshot_format() {
        let raw = r#"[{"id":"abc","title":"Hi","messages":[
            {"role":"user","content":"Hi"},
            {"role":"assistant","content":"Hello","rawMarkdown":"Hello"}]}]"#;
        let store = ConversationStore::restore(Box::new(MemoryStorage::with_item(STORAGE_KEY, raw)));
        let c = store.find(&ConversationId::from("abc")).unwrap();
        assert_eq!(c.title(), "Hi");
        assert_eq!(c.messages().len(), 2);
        assert_eq!(c.messages()[1], Message::assistant("Hello", Some("Hello".into())));
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let storage = MemoryStorage::with_item(STORAGE_KEY, "{not json");
        let store = ConversationStore::restore(Box::new(storage));
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let raw = r#"[{"id":"x","title":"one","messages":[]},{"id":"x","title":"two","messages":[]}]"#;
        let store = ConversationStore::restore(Box::new(MemoryStorage::with_item(STORAGE_KEY, raw)));
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.conversations()[0].title(), "one");
    }

    #[test]
    fn test_persist_failure_keeps_memory() {
        let mut storage = MemoryStorage::default();
        storage.fail_writes = true;
        let mut store = ConversationStore::restore(Box::new(storage));
        store.ensure_current_conversation("keep me");
        let id = store.current_id().clone();
        store.append_message(&id, Message::user("keep me"));

        let err = store.persist().unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(store.current().unwrap().messages().len(), 1);
    }
}

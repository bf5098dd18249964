/// One user turn, from submission to answer.
///
/// Per exchange: `Idle → Sent → Resolved | Failed`.
///
/// `submit` performs the Idle→Sent transition and returns the request the
/// caller must send; `resolve` applies the outcome when it arrives. Several
/// exchanges can be in flight at once; each carries the conversation it was
/// sent from, and its answer is recorded there even if the user has since
/// moved on. The transcript is only touched while that conversation is
/// still the one on screen.
use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::client::{AskError, AskResponse};
use crate::conversation::{ConversationId, Message, Role};
use crate::highlight;
use crate::sidebar::Sidebar;
use crate::store::ConversationStore;
use crate::transcript::{Transcript, TypingHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Empty state with suggestion shortcuts
    Welcome,
    Transcript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

/// What the caller must send for a `Sent` exchange.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub id: ExchangeId,
    pub conversation_id: ConversationId,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Sent,
    Resolved,
    Failed,
}

struct PendingExchange {
    conversation_id: ConversationId,
    /// None once the transcript it lived in was cleared
    placeholder: Option<TypingHandle>,
}

pub struct Controller {
    store: ConversationStore,
    transcript: Transcript,
    sidebar: Sidebar,
    view: View,
    pending: HashMap<ExchangeId, PendingExchange>,
    next_exchange: u64,
    apology: String,
    notice: Option<String>,
}

impl Controller {
    /// Wire a restored store to a sidebar; restored conversations are
    /// projected in stored order (so the newest ends up on top).
    pub fn new(store: ConversationStore, mut sidebar: Sidebar, apology: impl Into<String>) -> Self {
        for conversation in store.conversations() {
            sidebar.register_conversation(conversation);
        }
        Self {
            store,
            transcript: Transcript::default(),
            sidebar,
            view: View::Welcome,
            pending: HashMap::new(),
            next_exchange: 0,
            apology: apology.into(),
            notice: None,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn sidebar(&self) -> &Sidebar {
        &self.sidebar
    }

    pub fn sidebar_mut(&mut self) -> &mut Sidebar {
        &mut self.sidebar
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Last non-fatal problem worth showing (e.g. a failed save).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// `Some(Sent)` while awaiting an answer; settled exchanges are forgotten.
    #[cfg(test)]
    pub fn exchange_state(&self, id: ExchangeId) -> Option<ExchangeState> {
        self.pending.contains_key(&id).then_some(ExchangeState::Sent)
    }

    // ── Idle → Sent ───────────────────────────────────────────────────────────

    /// Start an exchange. Blank input is rejected without any state change.
    pub fn submit(&mut self, input: &str) -> Option<ExchangeRequest> {
        let message = input.trim();
        if message.is_empty() {
            return None;
        }

        self.view = View::Transcript;
        self.transcript.render_plain(Role::User, message);
        let placeholder = self.transcript.render_typing_placeholder();

        if let Some(created) = self.store.ensure_current_conversation(message) {
            self.sidebar.register_conversation(created);
        }
        let conversation_id = self.store.current_id().clone();
        self.sidebar.select_conversation(&conversation_id);
        self.store
            .append_message(&conversation_id, Message::user(message));

        let id = ExchangeId(self.next_exchange);
        self.next_exchange += 1;
        self.pending.insert(
            id,
            PendingExchange {
                conversation_id: conversation_id.clone(),
                placeholder: Some(placeholder),
            },
        );
        debug!(exchange = id.0, conversation = %conversation_id, "exchange sent");

        Some(ExchangeRequest {
            id,
            conversation_id,
            message: message.to_string(),
        })
    }

    // ── Sent → Resolved | Failed ──────────────────────────────────────────────

    /// Apply the outcome of a sent exchange. Unknown or already settled ids
    /// return `None` and change nothing.
    pub fn resolve(
        &mut self,
        id: ExchangeId,
        outcome: Result<AskResponse, AskError>,
    ) -> Option<ExchangeState> {
        let Some(pending) = self.pending.remove(&id) else {
            warn!(exchange = id.0, "result for unknown exchange ignored");
            return None;
        };
        let on_screen = self.view == View::Transcript
            && self.store.current_id() == &pending.conversation_id;

        if let Some(handle) = pending.placeholder {
            self.transcript.remove_typing(handle);
        }

        match outcome {
            Ok(answer) => {
                if on_screen {
                    self.transcript
                        .render_markdown(Role::Assistant, &answer.response);
                } else {
                    debug!(exchange = id.0, conversation = %pending.conversation_id,
                        "answer for a conversation no longer shown");
                }
                let message = Message::assistant(
                    answer.response.clone(),
                    Some(answer.markdown_source().to_string()),
                );
                self.store.append_message(&pending.conversation_id, message);
                self.persist();
                if on_screen {
                    highlight::highlight_all(&mut self.transcript);
                }
                Some(ExchangeState::Resolved)
            }
            Err(e) => {
                warn!(exchange = id.0, "exchange failed: {e}");
                if on_screen {
                    self.transcript.render_plain(Role::Assistant, &self.apology);
                }
                Some(ExchangeState::Failed)
            }
        }
    }

    fn persist(&mut self) {
        match self.store.persist() {
            Ok(()) => self.notice = None,
            Err(e) => {
                error!("saving conversations failed: {e}");
                self.notice = Some(format!("⚠ conversations not saved: {e}"));
            }
        }
    }

    /// Placeholders die with the transcript they were drawn in.
    fn forget_placeholders(&mut self) {
        for pending in self.pending.values_mut() {
            pending.placeholder = None;
        }
    }

    // ── Navigation ────────────────────────────────────────────────────────────

    /// Fresh, empty conversation. In-flight exchanges keep running.
    pub fn start_new_chat(&mut self) {
        self.transcript.clear();
        self.forget_placeholders();
        self.view = View::Welcome;
        self.store.start_new_conversation();
        self.sidebar.clear_selection();
    }

    /// Replay a stored conversation into the transcript. Unknown ids are ignored.
    pub fn load_conversation(&mut self, id: &ConversationId) -> bool {
        if !self.store.set_current(id) {
            return false;
        }
        self.transcript.clear();
        self.forget_placeholders();
        self.view = View::Transcript;

        if let Some(conversation) = self.store.find(id) {
            for message in conversation.messages() {
                match message.role() {
                    Role::User => self.transcript.render_plain(Role::User, message.content()),
                    Role::Assistant => self
                        .transcript
                        .render_markdown(Role::Assistant, message.render_source()),
                }
            }
        }
        highlight::highlight_all(&mut self.transcript);
        self.sidebar.select_conversation(id);

        // A reply still pending for this conversation gets its indicator back
        for pending in self.pending.values_mut() {
            if &pending.conversation_id == id {
                pending.placeholder = Some(self.transcript.render_typing_placeholder());
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::store::STORAGE_KEY;
    use crate::transcript::EntryBody;

    const APOLOGY: &str = "Maaf, terjadi kesalahan. Silakan coba lagi.";

    fn controller() -> Controller {
        let store = ConversationStore::restore(Box::new(MemoryStorage::default()));
        Controller::new(store, Sidebar::default(), APOLOGY)
    }

    fn answer(text: &str) -> Result<AskResponse, AskError> {
        Ok(AskResponse {
            response: text.to_string(),
            raw_markdown: None,
        })
    }

    fn failure() -> Result<AskResponse, AskError> {
        Err(serde_json::from_str::<AskResponse>("not json").unwrap_err().into())
    }

    /// (role, text) for every visible entry; typing placeholders as "…"
    fn shown(c: &Controller) -> Vec<(Role, String)> {
        c.transcript()
            .entries()
            .iter()
            .map(|e| {
                let text = match &e.body {
                    EntryBody::Plain(s) => s.clone(),
                    EntryBody::Markdown(md) => md.to_plain(),
                    EntryBody::Typing => "…".to_string(),
                };
                (e.role, text)
            })
            .collect()
    }

    fn assert_single_active(c: &Controller) {
        let active: Vec<_> = c.sidebar().entries().iter().filter(|e| e.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(&active[0].id, c.store().current_id());
    }

    #[test]
    fn test_blank_submission_rejected() {
        let mut c = controller();
        assert!(c.submit("   \n\t ").is_none());
        assert_eq!(c.view(), View::Welcome);
        assert!(c.transcript().entries().is_empty());
        assert!(c.store().conversations().is_empty());
        assert_eq!(c.in_flight(), 0);
    }

    #[test]
    fn test_hello_scenario() {
        let mut c = controller();
        let req = c.submit("Hello").unwrap();
        assert_eq!(req.message, "Hello");
        assert_eq!(c.view(), View::Transcript);
        assert_eq!(
            shown(&c),
            vec![(Role::User, "Hello".into()), (Role::Assistant, "…".into())]
        );
        assert_eq!(c.exchange_state(req.id), Some(ExchangeState::Sent));

        assert_eq!(c.resolve(req.id, answer("Hi there")), Some(ExchangeState::Resolved));
        assert_eq!(
            shown(&c),
            vec![(Role::User, "Hello".into()), (Role::Assistant, "Hi there".into())]
        );

        let conversations = c.store().conversations();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title(), "Hello");
        assert_eq!(
            conversations[0].messages(),
            &[
                Message::user("Hello"),
                Message::assistant("Hi there", Some("Hi there".into())),
            ]
        );
        assert_eq!(c.in_flight(), 0);
        assert_single_active(&c);
    }

    #[test]
    fn test_input_is_trimmed() {
        let mut c = controller();
        let req = c.submit("  spaced out \n").unwrap();
        assert_eq!(req.message, "spaced out");
        assert_eq!(c.store().conversations()[0].messages()[0], Message::user("spaced out"));
    }

    #[test]
    fn test_long_message_title() {
        let mut c = controller();
        let msg = "0123456789".repeat(5);
        c.submit(&msg).unwrap();
        assert_eq!(
            c.store().conversations()[0].title(),
            format!("{}...", &msg[..30])
        );
    }

    #[test]
    fn test_markdown_field_stored() {
        let mut c = controller();
        let req = c.submit("q").unwrap();
        c.resolve(
            req.id,
            Ok(AskResponse {
                response: "answer".into(),
                raw_markdown: Some("**answer**".into()),
            }),
        );
        assert_eq!(
            c.store().conversations()[0].messages()[1],
            Message::assistant("answer", Some("**answer**".into()))
        );
    }

    #[test]
    fn test_failure_shows_apology_and_records_nothing() {
        let mut c = controller();
        let req = c.submit("Hello").unwrap();
        assert_eq!(c.resolve(req.id, failure()), Some(ExchangeState::Failed));
        assert_eq!(
            shown(&c),
            vec![(Role::User, "Hello".into()), (Role::Assistant, APOLOGY.into())]
        );
        assert_eq!(
            c.store().conversations()[0].messages(),
            &[Message::user("Hello")]
        );
    }

    #[test]
    fn test_resolve_twice_is_ignored() {
        let mut c = controller();
        let req = c.submit("Hello").unwrap();
        c.resolve(req.id, answer("one"));
        assert_eq!(c.resolve(req.id, answer("two")), None);
        assert_eq!(c.store().conversations()[0].messages().len(), 2);
    }

    #[test]
    fn test_answers_persisted() {
        let mut c = controller();
        let req = c.submit("Hello").unwrap();
        c.resolve(req.id, answer("Hi there"));

        // Rebuild from what was written
        let json = serde_json::to_string(c.store().conversations()).unwrap();
        let store =
            ConversationStore::restore(Box::new(MemoryStorage::with_item(STORAGE_KEY, &json)));
        assert_eq!(store.conversations(), c.store().conversations());
    }

    #[test]
    fn test_persist_failure_becomes_notice() {
        let mut storage = MemoryStorage::default();
        storage.fail_writes = true;
        let store = ConversationStore::restore(Box::new(storage));
        let mut c = Controller::new(store, Sidebar::default(), APOLOGY);

        let req = c.submit("Hello").unwrap();
        assert_eq!(c.resolve(req.id, answer("Hi")), Some(ExchangeState::Resolved));
        assert!(c.notice().is_some_and(|n| n.contains("not saved")));
        assert_eq!(c.store().conversations()[0].messages().len(), 2);
        c.clear_notice();
        assert!(c.notice().is_none());
    }

    #[test]
    fn test_switch_back_replays_history() {
        let mut c = controller();
        let a = c.submit("first chat").unwrap();
        c.resolve(a.id, answer("first *answer*"));
        let first_id = c.store().current_id().clone();
        let first_shown = shown(&c);

        c.start_new_chat();
        assert_eq!(c.view(), View::Welcome);
        assert!(c.transcript().entries().is_empty());
        assert!(c.sidebar().active_id().is_none());

        let b = c.submit("second chat").unwrap();
        c.resolve(b.id, answer("second answer"));
        assert_eq!(c.sidebar().entries()[0].title, "second chat");
        assert_single_active(&c);

        assert!(c.load_conversation(&first_id));
        assert_eq!(shown(&c), first_shown);
        assert_eq!(c.store().current_id(), &first_id);
        assert_single_active(&c);
        assert_eq!(c.sidebar().active_id(), Some(&first_id));
    }

    #[test]
    fn test_load_uses_stored_markdown() {
        let raw = r##"[{"id":"c1","title":"q","messages":[
            {"role":"user","content":"**q**"},
            {"role":"assistant","content":"plain answer","rawMarkdown":"# Heading"}]}]"##;
        let store = ConversationStore::restore(Box::new(MemoryStorage::with_item(STORAGE_KEY, raw)));
        let mut c = Controller::new(store, Sidebar::default(), APOLOGY);
        assert_eq!(c.sidebar().entries().len(), 1);
        assert!(c.sidebar().active_id().is_none());

        assert!(c.load_conversation(&ConversationId::from("c1")));
        assert_eq!(
            shown(&c),
            vec![(Role::User, "**q**".into()), (Role::Assistant, "Heading".into())]
        );
        assert!(matches!(c.transcript().entries()[0].body, EntryBody::Plain(_)));
        assert!(matches!(c.transcript().entries()[1].body, EntryBody::Markdown(_)));
    }

    #[test]
    fn test_restored_sidebar_order() {
        let raw = r#"[{"id":"old","title":"old","messages":[]},
                      {"id":"new","title":"new","messages":[]}]"#;
        let store = ConversationStore::restore(Box::new(MemoryStorage::with_item(STORAGE_KEY, raw)));
        let c = Controller::new(store, Sidebar::default(), APOLOGY);
        let titles: Vec<&str> = c.sidebar().entries().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[test]
    fn test_load_unknown_is_noop() {
        let mut c = controller();
        let req = c.submit("keep").unwrap();
        c.resolve(req.id, answer("kept"));
        let before = shown(&c);
        assert!(!c.load_conversation(&ConversationId::from("missing")));
        assert_eq!(shown(&c), before);
    }

    #[test]
    fn test_stale_answer_recorded_in_its_own_conversation() {
        let mut c = controller();
        let req = c.submit("slow question").unwrap();
        let origin = req.conversation_id.clone();

        c.start_new_chat();
        let other = c.submit("new topic").unwrap();

        assert_eq!(c.resolve(req.id, answer("late answer")), Some(ExchangeState::Resolved));
        // Not drawn into the conversation on screen
        assert_eq!(
            shown(&c),
            vec![(Role::User, "new topic".into()), (Role::Assistant, "…".into())]
        );
        let stored = c.store().find(&origin).unwrap();
        assert_eq!(
            stored.messages(),
            &[
                Message::user("slow question"),
                Message::assistant("late answer", Some("late answer".into())),
            ]
        );
        assert_eq!(c.store().find(&other.conversation_id).unwrap().messages().len(), 1);
    }

    #[test]
    fn test_stale_failure_not_shown() {
        let mut c = controller();
        let req = c.submit("question").unwrap();
        c.start_new_chat();
        assert_eq!(c.resolve(req.id, failure()), Some(ExchangeState::Failed));
        assert!(c.transcript().entries().is_empty());
        assert_eq!(c.view(), View::Welcome);
    }

    #[test]
    fn test_pending_indicator_restored_on_load() {
        let mut c = controller();
        let req = c.submit("question").unwrap();
        let origin = req.conversation_id.clone();
        c.start_new_chat();

        assert!(c.load_conversation(&origin));
        assert_eq!(
            shown(&c),
            vec![(Role::User, "question".into()), (Role::Assistant, "…".into())]
        );
        c.resolve(req.id, answer("done"));
        assert_eq!(
            shown(&c),
            vec![(Role::User, "question".into()), (Role::Assistant, "done".into())]
        );
    }

    #[test]
    fn test_double_submission_tracked_separately() {
        let mut c = controller();
        let first = c.submit("one").unwrap();
        let second = c.submit("two").unwrap();
        assert_eq!(c.in_flight(), 2);
        assert_eq!(first.conversation_id, second.conversation_id);

        c.resolve(second.id, answer("answer two"));
        assert_eq!(c.exchange_state(first.id), Some(ExchangeState::Sent));
        assert!(c.transcript().has_typing());
        c.resolve(first.id, answer("answer one"));
        assert!(!c.transcript().has_typing());

        let messages = c.store().current().unwrap().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], Message::user("one"));
        assert_eq!(messages[1], Message::user("two"));
    }

    #[test]
    fn test_code_highlighted_after_answer() {
        let mut c = controller();
        let req = c.submit("show code").unwrap();
        c.resolve(req.id, answer("```rust\nfn main() {}\n```"));
        let EntryBody::Markdown(md) = &c.transcript().entries()[1].body else {
            panic!("expected markdown entry");
        };
        let crate::markdown::Block::Code(code) = &md.blocks[0] else {
            panic!("expected code");
        };
        assert!(code.highlighted.is_some());
    }
}

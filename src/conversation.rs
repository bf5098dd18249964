/// Conversation data model: identities, typed messages, titles.
///
/// The serialized shape of `Conversation` is the persisted snapshot format:
/// `{ id, title, messages: [{ role, content, rawMarkdown? }] }`.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Titles keep at most this many characters of the first user message.
pub const TITLE_MAX_CHARS: usize = 30;
/// Appended to a title when the first message was longer than `TITLE_MAX_CHARS`.
pub const TRUNCATION_MARKER: &str = "...";

// ── ConversationId ────────────────────────────────────────────────────────────

/// Opaque, client-generated conversation identity. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Base-36 millisecond timestamp followed by random hex, e.g. `m3x9k2qa4f1c9e07b2d`.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let noise = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", to_base36(millis), &noise[..11]))
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

// ── Message ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One transcript message. Tagged by role on the wire; only assistant
/// messages can carry a Markdown source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(
            rename = "rawMarkdown",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        raw_markdown: Option<String>,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>, raw_markdown: Option<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            raw_markdown,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::User { content } | Message::Assistant { content, .. } => content,
        }
    }

    /// Text to re-render on reload: the stored Markdown when present, else `content`.
    pub fn render_source(&self) -> &str {
        match self {
            Message::Assistant {
                raw_markdown: Some(md),
                ..
            } if !md.is_empty() => md,
            other => other.content(),
        }
    }
}

// ── Conversation ──────────────────────────────────────────────────────────────

/// A titled, append-only sequence of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    title: String,
    #[serde(default)]
    messages: Vec<Message>,
}

impl Conversation {
    /// New empty conversation titled from the first user message.
    pub fn new(id: ConversationId, first_message: &str) -> Self {
        Self {
            id,
            title: derive_title(first_message),
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// First `TITLE_MAX_CHARS` characters, plus `TRUNCATION_MARKER` when cut.
pub fn derive_title(first_message: &str) -> String {
    let mut chars = first_message.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}{TRUNCATION_MARKER}")
    } else {
        head
    }
}

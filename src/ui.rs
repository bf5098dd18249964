/// UI helpers shared between the TUI and plain-stdout modes.
use crate::conversation::Role;

// ── Role glyphs ───────────────────────────────────────────────────────────────

pub fn role_glyph(role: Role) -> &'static str {
    match role {
        Role::User      => "●",
        Role::Assistant => "◆",
    }
}

/// Header text for an entry: glyph plus who is speaking.
pub fn role_label(role: Role, assistant_name: &str) -> String {
    match role {
        Role::User      => format!("{} you", role_glyph(role)),
        Role::Assistant => format!("{} {assistant_name}", role_glyph(role)),
    }
}

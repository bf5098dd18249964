/// Syntax highlighting for rendered code blocks (syntect).
///
/// Applied as a pass over every code block in the transcript; blocks that
/// already carry highlighted lines are left alone.
use std::sync::OnceLock;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::markdown::CodeBlock;
use crate::transcript::Transcript;

struct Assets {
    syntax_set: SyntaxSet,
    theme: Option<Theme>,
}

fn assets() -> &'static Assets {
    static ASSETS: OnceLock<Assets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let mut themes = ThemeSet::load_defaults().themes;
        let theme = themes
            .remove("base16-eighties.dark")
            .or_else(|| themes.into_values().next());
        Assets { syntax_set, theme }
    })
}

/// Syntax for a fence tag, else guessed from the first line, else plain text.
fn find_syntax<'a>(set: &'a SyntaxSet, lang: &str, source: &str) -> &'a SyntaxReference {
    let by_tag = if lang.is_empty() {
        None
    } else {
        set.find_syntax_by_token(lang)
            .or_else(|| set.find_syntax_by_extension(lang))
    };
    by_tag
        .or_else(|| set.find_syntax_by_first_line(source.lines().next().unwrap_or("")))
        .unwrap_or_else(|| set.find_syntax_plain_text())
}

fn to_style(s: syntect::highlighting::Style) -> Style {
    let fg = s.foreground;
    let mut style = Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b));
    if s.font_style.contains(FontStyle::BOLD) {
        style = style.add_modifier(Modifier::BOLD);
    }
    if s.font_style.contains(FontStyle::ITALIC) {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if s.font_style.contains(FontStyle::UNDERLINE) {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

/// Highlight one block. Returns false if it was already highlighted.
pub fn highlight_block(block: &mut CodeBlock) -> bool {
    if block.highlighted.is_some() {
        return false;
    }
    let assets = assets();
    let Some(theme) = &assets.theme else {
        // No theme available: keep the raw-source rendering
        return false;
    };
    let syntax = find_syntax(&assets.syntax_set, &block.lang, &block.source);
    let mut h = HighlightLines::new(syntax, theme);

    let mut lines = Vec::new();
    for src_line in LinesWithEndings::from(&block.source) {
        let spans: Vec<Span<'static>> = match h.highlight_line(src_line, &assets.syntax_set) {
            Ok(ranges) => ranges
                .into_iter()
                .map(|(style, text)| {
                    Span::styled(text.trim_end_matches(['\n', '\r']).to_string(), to_style(style))
                })
                .filter(|s| !s.content.is_empty())
                .collect(),
            Err(_) => vec![Span::raw(src_line.trim_end_matches(['\n', '\r']).to_string())],
        };
        lines.push(Line::from(spans));
    }
    block.highlighted = Some(lines);
    true
}

/// Highlight every code block in the transcript. Returns how many were newly coloured.
pub fn highlight_all(transcript: &mut Transcript) -> usize {
    transcript
        .code_blocks_mut()
        .map(highlight_block)
        .filter(|&done| done)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::line_text;

    fn block(lang: &str, source: &str) -> CodeBlock {
        CodeBlock {
            lang: lang.to_string(),
            source: source.to_string(),
            highlighted: None,
        }
    }

    #[test]
    fn test_highlight_preserves_text() {
        let mut b = block("rust", "fn main() {\n    println!(\"hi\");\n}");
        assert!(highlight_block(&mut b));
        let lines = b.highlighted.as_ref().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(line_text(&lines[0]), "fn main() {");
        assert_eq!(line_text(&lines[1]), "    println!(\"hi\");");
    }

    #[test]
    fn test_highlight_is_applied_once() {
        let mut b = block("python", "print(1)");
        assert!(highlight_block(&mut b));
        assert!(!highlight_block(&mut b));
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain() {
        let mut b = block("no-such-lang", "just text");
        assert!(highlight_block(&mut b));
        assert_eq!(line_text(&b.highlighted.unwrap()[0]), "just text");
    }

    #[test]
    fn test_rust_keywords_are_coloured() {
        let mut b = block("rs", "let x = 1;");
        highlight_block(&mut b);
        let lines = b.highlighted.unwrap();
        let colours: std::collections::HashSet<_> =
            lines[0].spans.iter().map(|s| s.style.fg).collect();
        assert!(colours.len() > 1);
    }
}

/// Ratatui-based TUI.
///
/// Architecture:
///   main thread:  event loop: crossterm keyboard events + mpsc UiEvent drain
///   ask tasks:    tokio::spawn per exchange, result sent back as UiEvent::Answered
///
/// All state lives in `AppState` and is only touched from the event loop.
///
/// Layout:
///   ┌──────────┬─────────────────────────────────────┐
///   │ sidebar  │  welcome screen / transcript        │
///   │ (toggle) ├─────────────────────────────────────┤
///   │          │  status bar (1 line)                │
///   │          ├─────────────────────────────────────┤
///   │          │  composer (grows with newlines)     │
///   └──────────┴─────────────────────────────────────┘
pub mod chat;
pub mod render;
pub mod sidebar;

use std::cell::Cell;
use std::io;

use anyhow::Result;
use crossterm::{
    event::{
        Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::{AskClient, AskError, AskResponse};
use crate::config::ResolvedConfig;
use crate::controller::{Controller, ExchangeId, ExchangeRequest, View};
use crate::conversation::ConversationId;
use crate::sidebar::Sidebar;
use crate::storage::FileStorage;
use crate::store::ConversationStore;

/// Lines moved per scroll key press
const SCROLL_STEP: usize = 3;

// ── UiEvent: results delivered back to the event loop ────────────────────────

#[derive(Debug)]
pub enum UiEvent {
    /// An ask task finished
    Answered {
        exchange: ExchangeId,
        outcome: Result<AskResponse, AskError>,
    },
    /// A sidebar entry was picked
    ConversationChosen(ConversationId),
}

// ── App state ─────────────────────────────────────────────────────────────────

pub struct AppState {
    pub controller: Controller,
    pub client: AskClient,
    pub input: String,
    pub cursor: usize, // byte offset in input
    /// Recomputed on every edit; false right after a submit
    pub send_enabled: bool,
    /// Incremented every 120ms while an answer is pending
    pub spinner_tick: u32,
    pub sidebar_visible: bool,
    /// True = arrow keys and Enter drive the sidebar instead of the composer
    pub sidebar_focused: bool,
    pub profile: String,
    pub endpoint: String,
    pub assistant_name: String,
    pub suggestions: Vec<String>,
    /// History rows hidden above the view at the bottom, as of the last draw
    pub history_overflow: Cell<usize>,
}

impl AppState {
    pub fn new(resolved: &ResolvedConfig, controller: Controller) -> Result<Self> {
        let client = AskClient::new(resolved.endpoint.clone(), resolved.timeout)?;
        Ok(Self {
            controller,
            client,
            input: String::new(),
            cursor: 0,
            send_enabled: false,
            spinner_tick: 0,
            sidebar_visible: true,
            sidebar_focused: false,
            profile: resolved.profile_name.clone(),
            endpoint: resolved.endpoint.clone(),
            assistant_name: resolved.assistant_name.clone(),
            suggestions: resolved.suggestions.clone(),
            history_overflow: Cell::new(0),
        })
    }

    fn scroll_history_up(&mut self, lines: usize) {
        let limit = self.history_overflow.get();
        self.controller.transcript_mut().scroll_up(lines, limit);
    }

    fn scroll_history_down(&mut self, lines: usize) {
        let limit = self.history_overflow.get();
        self.controller.transcript_mut().scroll_down(lines, limit);
    }

    fn input_changed(&mut self) {
        self.send_enabled = !self.input.trim().is_empty();
    }

    fn insert_str(&mut self, s: &str) {
        self.input.insert_str(self.cursor, s);
        self.cursor += s.len();
        self.input_changed();
    }

    /// Hand the composer text to the controller. On success the composer is
    /// cleared and collapsed and sending stays disabled until the next edit.
    pub fn submit(&mut self) -> Option<ExchangeRequest> {
        if !self.send_enabled {
            return None;
        }
        let request = self.controller.submit(&self.input)?;
        self.input.clear();
        self.cursor = 0;
        self.send_enabled = false;
        Some(request)
    }

    /// Pre-fill the composer with suggestion `index` and send it.
    pub fn submit_suggestion(&mut self, index: usize) -> Option<ExchangeRequest> {
        let text = self.suggestions.get(index)?.clone();
        self.input = text;
        self.cursor = self.input.len();
        self.input_changed();
        self.submit()
    }

    pub fn new_chat(&mut self) {
        self.controller.start_new_chat();
        self.sidebar_focused = false;
    }

    pub fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::Answered { exchange, outcome } => {
                self.controller.resolve(exchange, outcome);
            }
            UiEvent::ConversationChosen(id) => {
                if self.controller.load_conversation(&id) {
                    self.sidebar_focused = false;
                }
            }
        }
    }

    /// Something is animating (a typing placeholder or a pending exchange).
    pub fn busy(&self) -> bool {
        self.controller.in_flight() > 0
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// Returns the terminal and whether keyboard enhancement (needed to tell
/// Shift+Enter from Enter) was switched on.
fn setup_terminal() -> Result<(Term, bool)> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let enhanced = matches!(crossterm::terminal::supports_keyboard_enhancement(), Ok(true));
    if enhanced {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
    }
    let backend = CrosstermBackend::new(stdout);
    Ok((Terminal::new(backend)?, enhanced))
}

fn restore_terminal(terminal: &mut Term, enhanced: bool) {
    if enhanced {
        let _ = execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags);
    }
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig) -> Result<()> {
    let storage = FileStorage::new(&resolved.data_dir);
    let store = ConversationStore::restore(Box::new(storage));
    info!(
        conversations = store.conversations().len(),
        dir = %resolved.data_dir.display(),
        "conversations restored"
    );
    let controller = Controller::new(store, Sidebar::default(), resolved.apology.clone());
    let mut state = AppState::new(&resolved, controller)?;

    let (mut terminal, enhanced) = setup_terminal()?;

    // Panic hook: restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    // Hide the sidebar on narrow terminals
    if let Ok((w, _)) = crossterm::terminal::size() {
        state.sidebar_visible = w >= 80;
    }

    let result = event_loop(&mut terminal, &mut state).await;

    restore_terminal(&mut terminal, enhanced);
    result
}

async fn event_loop(terminal: &mut Term, state: &mut AppState) -> Result<()> {
    // Channel: ask tasks / sidebar → event loop
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let chosen_tx = ui_tx.clone();
    state
        .controller
        .sidebar_mut()
        .on_conversation_chosen(move |id| {
            let _ = chosen_tx.send(UiEvent::ConversationChosen(id));
        });

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.busy() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, state))?;
                }
            }

            // ── Answers and sidebar picks ─────────────────────────────────────
            Some(ev) = ui_rx.recv() => {
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if !handle_key(key, state, &ui_tx) {
                            break;
                        }
                    }
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, state))?;
            }
        }
    }

    info!(pending = state.controller.in_flight(), "exiting");
    Ok(())
}

/// Run one exchange in the background; the answer comes back as a UiEvent.
fn launch_exchange(request: ExchangeRequest, client: &AskClient, ui_tx: mpsc::UnboundedSender<UiEvent>) {
    let client = client.clone();
    debug!(conversation = %request.conversation_id, "asking");
    tokio::spawn(async move {
        let outcome = client.ask(&request.message).await;
        // Receiver gone means we are shutting down
        let _ = ui_tx.send(UiEvent::Answered {
            exchange: request.id,
            outcome,
        });
    });
}

// ── Key handler ───────────────────────────────────────────────────────────────

/// Returns false when the app should quit.
fn handle_key(key: KeyEvent, state: &mut AppState, ui_tx: &mpsc::UnboundedSender<UiEvent>) -> bool {
    // ── Global keys ───────────────────────────────────────────────────────────
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c' | 'q')) => return false,
        (KeyModifiers::CONTROL, KeyCode::Char('n')) => {
            state.new_chat();
            return true;
        }
        // Ctrl+B: toggle sidebar visible (hiding it also drops focus)
        (KeyModifiers::CONTROL, KeyCode::Char('b')) => {
            state.sidebar_visible = !state.sidebar_visible;
            if !state.sidebar_visible {
                state.sidebar_focused = false;
            }
            return true;
        }
        (_, KeyCode::PageUp) => {
            state.scroll_history_up(SCROLL_STEP * 4);
            return true;
        }
        (_, KeyCode::PageDown) => {
            state.scroll_history_down(SCROLL_STEP * 4);
            return true;
        }
        _ => {}
    }

    // ── Sidebar focused navigation ────────────────────────────────────────────
    if state.sidebar_focused && state.sidebar_visible {
        match key.code {
            KeyCode::Up => state.controller.sidebar_mut().cursor_up(),
            KeyCode::Down => state.controller.sidebar_mut().cursor_down(),
            // Fires the chosen-handler; the load happens when its event arrives
            KeyCode::Enter => {
                state.controller.sidebar_mut().choose();
            }
            KeyCode::Esc | KeyCode::Tab => state.sidebar_focused = false,
            // Typing goes back to the composer
            KeyCode::Char(_) => state.sidebar_focused = false,
            _ => {}
        }
        if state.sidebar_focused || !matches!(key.code, KeyCode::Char(_)) {
            return true;
        }
    }

    // ── Composer ──────────────────────────────────────────────────────────────
    match (key.modifiers, key.code) {
        // Enter: submit
        (KeyModifiers::NONE, KeyCode::Enter) => {
            if let Some(request) = state.submit() {
                launch_exchange(request, &state.client, ui_tx.clone());
            }
        }
        // Shift+Enter / Alt+Enter: newline
        (KeyModifiers::SHIFT | KeyModifiers::ALT, KeyCode::Enter) => {
            state.insert_str("\n");
        }
        // Tab: focus the sidebar
        (KeyModifiers::NONE, KeyCode::Tab)
            if state.sidebar_visible && !state.controller.sidebar().entries().is_empty() => {
            state.controller.sidebar_mut().reset_cursor();
            state.sidebar_focused = true;
        }
        // 1-9 on the welcome screen: send a suggestion
        (KeyModifiers::NONE, KeyCode::Char(c @ '1'..='9'))
            if state.input.is_empty()
                && state.controller.view() == View::Welcome
                && (c as usize - '1' as usize) < state.suggestions.len() => {
            if let Some(request) = state.submit_suggestion(c as usize - '1' as usize) {
                launch_exchange(request, &state.client, ui_tx.clone());
            }
        }
        (KeyModifiers::NONE, KeyCode::Esc) => {
            state.controller.clear_notice();
        }
        (KeyModifiers::NONE, KeyCode::Backspace) => {
            input_backspace(&mut state.input, &mut state.cursor);
            state.input_changed();
        }
        (KeyModifiers::NONE, KeyCode::Delete) => {
            input_delete_forward(&mut state.input, &mut state.cursor);
            state.input_changed();
        }
        // Ctrl+Backspace / Ctrl+W: delete word before cursor
        (KeyModifiers::CONTROL, KeyCode::Backspace) | (KeyModifiers::CONTROL, KeyCode::Char('w')) => {
            input_delete_word(&mut state.input, &mut state.cursor);
            state.input_changed();
        }
        (KeyModifiers::NONE, KeyCode::Left) => {
            state.cursor = prev_char_boundary(&state.input, state.cursor);
        }
        (KeyModifiers::NONE, KeyCode::Right) => {
            state.cursor = next_char_boundary(&state.input, state.cursor);
        }
        (KeyModifiers::CONTROL, KeyCode::Left) => {
            state.cursor = word_left(&state.input, state.cursor);
        }
        (KeyModifiers::CONTROL, KeyCode::Right) => {
            state.cursor = word_right(&state.input, state.cursor);
        }
        (KeyModifiers::NONE, KeyCode::Home) | (KeyModifiers::CONTROL, KeyCode::Char('a')) => {
            state.cursor = 0;
        }
        (KeyModifiers::NONE, KeyCode::End) | (KeyModifiers::CONTROL, KeyCode::Char('e')) => {
            state.cursor = state.input.len();
        }
        // Ctrl+U: clear line before cursor
        (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
            state.input.drain(..state.cursor);
            state.cursor = 0;
            state.input_changed();
        }
        // Ctrl+K: clear from cursor to end
        (KeyModifiers::CONTROL, KeyCode::Char('k')) => {
            state.input.truncate(state.cursor);
            state.input_changed();
        }
        (KeyModifiers::NONE, KeyCode::Up) => {
            state.scroll_history_up(SCROLL_STEP);
        }
        (KeyModifiers::NONE, KeyCode::Down) => {
            state.scroll_history_down(SCROLL_STEP);
        }
        // Regular char input: insert at cursor
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => {
            let mut buf = [0u8; 4];
            state.insert_str(c.encode_utf8(&mut buf));
        }
        _ => {}
    }

    true
}

// ── Input editing helpers ─────────────────────────────────────────────────────

/// Remove the character immediately before the cursor (UTF-8 safe).
fn input_backspace(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let prev = prev_char_boundary(input, *cursor);
    input.drain(prev..*cursor);
    *cursor = prev;
}

fn input_delete_forward(input: &mut String, cursor: &mut usize) {
    if *cursor >= input.len() {
        return;
    }
    let next = next_char_boundary(input, *cursor);
    input.drain(*cursor..next);
}

/// Delete the word immediately before the cursor (stops at whitespace boundary).
fn input_delete_word(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let start = word_left(input, *cursor);
    input.drain(start..*cursor);
    *cursor = start;
}

fn prev_char_boundary(s: &str, pos: usize) -> usize {
    s[..pos.min(s.len())]
        .char_indices()
        .next_back()
        .map_or(0, |(i, _)| i)
}

fn next_char_boundary(s: &str, pos: usize) -> usize {
    s[pos.min(s.len())..]
        .chars()
        .next()
        .map_or(s.len(), |c| pos + c.len_utf8())
}

/// Start of the previous word (skip whitespace, then the word).
fn word_left(s: &str, pos: usize) -> usize {
    let before = &s[..pos.min(s.len())];
    let trimmed = before.trim_end();
    trimmed
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(i, c)| i + c.len_utf8())
}

/// Past the end of the next word.
fn word_right(s: &str, pos: usize) -> usize {
    let pos = pos.min(s.len());
    let rest = &s[pos..];
    let skipped = rest.len() - rest.trim_start().len();
    let word_start = pos + skipped;
    s[word_start..]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map_or(s.len(), |(i, _)| word_start + i)
}

//! Keyboard routing
//!
//! Keys pass through a chain of handlers and the first one that claims a key wins:
//! command palette, search prompt, global shortcuts, the focused session, and
//! finally grid navigation.

use crate::config::{
    CHORD_WINDOW, CTRL, KEY_INTERRUPT, KEY_KILL_ALL_STALE, KEY_KILL_FOCUSED_STALE, KEY_PALETTE,
    KEY_QUIT, KEY_SCROLL_DOWN, KEY_SCROLL_UP, KEY_SEARCH, KEY_SEARCH_ALT, KEY_SHOW_HIDDEN,
    SCROLL_STEP,
};
use crate::model::{Command, Model};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Instant;

/// Whether `key` is `code` with no ctrl or alt held. Shift is implied by the character.
fn plain(key: &KeyEvent, code: KeyCode) -> bool {
    key.code == code && !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

fn ctrl(key: &KeyEvent, code: KeyCode) -> bool {
    key.code == code && key.modifiers.contains(CTRL)
}

fn within_chord(last: Option<Instant>, now: Instant) -> bool {
    last.is_some_and(|t| now.duration_since(t) < CHORD_WINDOW)
}

impl Model {
    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.kind != KeyEventKind::Press {
            return Vec::new();
        }
        if self.palette.open {
            return self.handle_palette_key(key);
        }
        if self.searching {
            return self.handle_search_key(key);
        }
        if let Some(cmds) = self.handle_global_key(key) {
            return cmds;
        }
        if let Some(cmds) = self.handle_focused_key(key) {
            return cmds;
        }
        self.handle_grid_key(key)
    }

    fn handle_palette_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Esc => self.palette.close(),
            _ if ctrl(&key, KEY_PALETTE) => self.palette.close(),
            KeyCode::Up => self.palette.move_selection(-1),
            KeyCode::Char('k') if !key.modifiers.contains(CTRL) => self.palette.move_selection(-1),
            KeyCode::Down => self.palette.move_selection(1),
            KeyCode::Char('j') if !key.modifiers.contains(CTRL) => self.palette.move_selection(1),
            KeyCode::Enter => return self.execute_palette_selection(),
            _ => {}
        }
        Vec::new()
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Esc => {
                self.searching = false;
                self.search_query = std::mem::take(&mut self.search_saved);
            }
            KeyCode::Enter => {
                self.searching = false;
                self.search_query = self.search.value().trim().to_string();
                self.search_saved.clear();
            }
            _ if ctrl(&key, KEY_INTERRUPT) => return vec![Command::Quit],
            _ => {
                if self.search.handle_key(key) {
                    self.search_query = self.search.value().trim().to_string();
                }
            }
        }
        Vec::new()
    }

    /// Shortcuts available whenever no prompt is open. None when the key is not one of them.
    fn handle_global_key(&mut self, key: KeyEvent) -> Option<Vec<Command>> {
        if key.code != KeyCode::Esc {
            self.last_esc = None;
        }
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Left | KeyCode::Right if shift => {
                let before = self.focused.clone();
                self.shift_active_tab(if key.code == KeyCode::Left { -1 } else { 1 });
                Some(self.vars_on_focus_change(before))
            }
            KeyCode::Esc => self.handle_escape(),
            _ if ctrl(&key, KEY_PALETTE) => {
                self.reset_ctrl_c();
                self.open_palette();
                Some(Vec::new())
            }
            _ if plain(&key, KEY_SEARCH) || ctrl(&key, KEY_SEARCH_ALT) => {
                self.start_search();
                Some(Vec::new())
            }
            _ if plain(&key, KEY_SHOW_HIDDEN) => {
                self.reset_ctrl_c();
                self.show_hidden();
                Some(Vec::new())
            }
            _ if ctrl(&key, KEY_KILL_ALL_STALE) => {
                let ids = self.stale_ids();
                if ids.is_empty() {
                    return Some(Vec::new());
                }
                self.reset_ctrl_c();
                Some(vec![Command::KillSessions { ids }])
            }
            _ if plain(&key, KEY_KILL_FOCUSED_STALE) => {
                let Some(id) = self.focused.clone().filter(|id| self.is_stale(id)) else {
                    return Some(Vec::new());
                };
                self.reset_ctrl_c();
                Some(vec![Command::KillSessions { ids: vec![id] }])
            }
            _ if plain(&key, KEY_QUIT) => {
                self.reset_ctrl_c();
                Some(vec![Command::Quit])
            }
            _ => None,
        }
    }

    /// Leave detail, then clear the filter, then the focused-session chord.
    /// Not consumed when none of those apply.
    fn handle_escape(&mut self) -> Option<Vec<Command>> {
        if self.detail_session().is_some() {
            self.leave_detail(false);
            return Some(Vec::new());
        }
        if !self.search_query.is_empty() {
            self.reset_ctrl_c();
            self.search_query.clear();
            return Some(Vec::new());
        }
        let focused = self.focused.clone()?;

        let now = Instant::now();
        if within_chord(self.last_esc, now) {
            self.unfocus();
            return Some(Vec::new());
        }
        self.last_esc = Some(now);
        let cmds = match self.previews.get(&focused) {
            Some(preview) if !preview.pane_id.is_empty() => vec![Command::SendKeys {
                pane_id: preview.pane_id.clone(),
                keys: vec!["Escape".to_string()],
            }],
            _ => Vec::new(),
        };
        Some(cmds)
    }

    /// Scrolling and key forwarding for the focused session
    fn handle_focused_key(&mut self, key: KeyEvent) -> Option<Vec<Command>> {
        let focused = self.focused.clone()?;
        let pane_alive = self.pane_for(&focused).is_some_and(|(_, pane)| !pane.dead);
        let preview = self.previews.get_mut(&focused)?;

        let scrolled = match key.code {
            KeyCode::Up => {
                preview.viewport.scroll_up(1);
                true
            }
            KeyCode::Down => {
                preview.viewport.scroll_down(1);
                true
            }
            KeyCode::PageUp => {
                preview.viewport.page_up();
                true
            }
            KeyCode::PageDown => {
                preview.viewport.page_down();
                true
            }
            KeyCode::Home => {
                preview.viewport.goto_top();
                true
            }
            KeyCode::End => {
                preview.viewport.goto_bottom();
                true
            }
            _ if ctrl(&key, KEY_SCROLL_UP) => {
                preview.viewport.scroll_up(SCROLL_STEP);
                true
            }
            _ if ctrl(&key, KEY_SCROLL_DOWN) => {
                preview.viewport.scroll_down(SCROLL_STEP);
                true
            }
            _ => false,
        };
        if scrolled {
            self.reset_ctrl_c();
            return Some(Vec::new());
        }

        let pane_id = preview.pane_id.clone();
        if ctrl(&key, KEY_INTERRUPT) {
            if !pane_alive || pane_id.is_empty() {
                return Some(vec![Command::Quit]);
            }
            let interrupt = Command::SendKeys {
                pane_id,
                keys: vec!["C-c".to_string()],
            };
            let now = Instant::now();
            if within_chord(self.last_ctrl_c, now) {
                self.reset_ctrl_c();
                return Some(vec![interrupt, Command::Quit]);
            }
            self.last_ctrl_c = Some(now);
            return Some(vec![interrupt]);
        }

        self.reset_ctrl_c();
        let keys = tmux_keys(&key)?;
        if pane_id.is_empty() {
            return None;
        }
        Some(vec![Command::SendKeys { pane_id, keys }])
    }

    /// Cursor movement across the grid while nothing is focused
    fn handle_grid_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if self.focused.is_some() {
            return Vec::new();
        }
        match key.code {
            KeyCode::Left => {
                self.move_cursor_left();
            }
            KeyCode::Right => {
                self.move_cursor_right();
            }
            KeyCode::Up => {
                self.move_cursor_up();
            }
            KeyCode::Down => {
                self.move_cursor_down();
            }
            KeyCode::Enter => match self.cursor.clone() {
                Some(id) if self.session_exists(&id) => return self.focus_session(&id),
                _ => {}
            },
            _ => {}
        }
        Vec::new()
    }
}

/// Translate a key press into tmux `send-keys` tokens. None for keys tmux cannot be sent.
pub fn tmux_keys(key: &KeyEvent) -> Option<Vec<String>> {
    let token = match key.code {
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::BackTab => "BTab".to_string(),
        KeyCode::Backspace => "BSpace".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Insert => "IC".to_string(),
        KeyCode::Esc => "Escape".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::F(n @ 1..=12) => format!("F{}", n),
        _ if key.modifiers.contains(KeyModifiers::ALT) => return None,
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if !c.is_ascii_alphabetic() {
                return None;
            }
            format!("C-{}", c.to_ascii_lowercase())
        }
        // A bare ";" ends the send-keys command
        KeyCode::Char(';') => "\\;".to_string(),
        KeyCode::Char(c) => c.to_string(),
        _ => return None,
    };
    Some(vec![token])
}

//! Single-line text editing for the search prompt

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Maximum number of characters accepted
const CHAR_LIMIT: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct LineEditor {
    chars: Vec<char>,
    /// Insertion point, in characters
    cursor: usize,
}

impl LineEditor {
    pub fn value(&self) -> String {
        self.chars.iter().collect()
    }

    /// Replace the content and move the cursor to the end
    pub fn set_value(&mut self, value: &str) {
        self.chars = value.chars().take(CHAR_LIMIT).collect();
        self.cursor = self.chars.len();
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    fn insert(&mut self, c: char) {
        if self.chars.len() >= CHAR_LIMIT {
            return;
        }
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    fn delete_word_before(&mut self) {
        let mut start = self.cursor;
        while start > 0 && self.chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !self.chars[start - 1].is_whitespace() {
            start -= 1;
        }
        self.chars.drain(start..self.cursor);
        self.cursor = start;
    }

    /// Apply an editing key. Returns false for keys the editor does not handle.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('a') if ctrl => self.cursor = 0,
            KeyCode::Char('e') if ctrl => self.cursor = self.chars.len(),
            KeyCode::Char('u') if ctrl => {
                self.chars.drain(..self.cursor);
                self.cursor = 0;
            }
            KeyCode::Char('k') if ctrl => self.chars.truncate(self.cursor),
            KeyCode::Char('w') if ctrl => self.delete_word_before(),
            KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => return false,
            KeyCode::Char(c) => self.insert(c),
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.chars.remove(self.cursor);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.chars.len() {
                    self.chars.remove(self.cursor);
                }
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.chars.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.chars.len(),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(editor: &mut LineEditor, text: &str) {
        for c in text.chars() {
            editor.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_insert_and_backspace() {
        let mut editor = LineEditor::default();
        type_str(&mut editor, "buld");
        editor.handle_key(key(KeyCode::Left));
        editor.handle_key(key(KeyCode::Left));
        type_str(&mut editor, "i");
        assert_eq!(editor.value(), "build");
        assert_eq!(editor.cursor(), 3);

        editor.handle_key(key(KeyCode::End));
        editor.handle_key(key(KeyCode::Backspace));
        assert_eq!(editor.value(), "buil");
    }

    #[test]
    fn test_control_keys() {
        let mut editor = LineEditor::default();
        editor.set_value("web server logs");
        editor.handle_key(ctrl('w'));
        assert_eq!(editor.value(), "web server ");
        editor.handle_key(ctrl('a'));
        editor.handle_key(key(KeyCode::Delete));
        assert_eq!(editor.value(), "eb server ");
        editor.handle_key(ctrl('k'));
        assert!(editor.is_empty());
        assert!(!editor.handle_key(ctrl('x')));
    }

    #[test]
    fn test_char_limit() {
        let mut editor = LineEditor::default();
        editor.set_value(&"x".repeat(300));
        assert_eq!(editor.value().len(), CHAR_LIMIT);
        type_str(&mut editor, "y");
        assert!(!editor.value().contains('y'));
    }
}

//! Tabs, detail mode, collapse toggles and grid cursor movement

use crate::model::{Command, Model, ViewMode};
use crate::tmux::session_label;

impl Model {
    /// "Overview" followed by one title per filtered session; refreshes `tab_session_ids`
    pub fn tab_titles(&mut self) -> Vec<String> {
        let sessions = self.filtered_sessions();
        let ids: Vec<String> = sessions.iter().map(|s| s.id.clone()).collect();
        let mut titles = Vec::with_capacity(sessions.len() + 1);
        titles.push("Overview".to_string());
        titles.extend(sessions.iter().map(|s| s.label().to_string()));
        self.tab_session_ids = ids;
        titles
    }

    pub fn shift_active_tab(&mut self, delta: isize) {
        let target = (self.active_tab as isize + delta).max(0) as usize;
        self.set_active_tab(target);
    }

    /// Activate a tab, clamped to range. Tab 0 is the overview, the rest enter detail mode.
    pub fn set_active_tab(&mut self, index: usize) {
        let count = self.tab_titles().len();
        let index = index.min(count.saturating_sub(1));
        if index == 0 {
            self.leave_detail(false);
            return;
        }
        match self.tab_session_ids.get(index - 1).cloned() {
            Some(id) => self.enter_detail(&id),
            None => self.leave_detail(false),
        }
    }

    /// Tab index showing `id`, or 0 when it has no tab
    pub(crate) fn tab_index_for(&self, id: &str) -> usize {
        self.tab_session_ids
            .iter()
            .position(|tab| tab == id)
            .map_or(0, |i| i + 1)
    }

    /// Show one session on its own; ignored for sessions not in the snapshot
    pub fn enter_detail(&mut self, id: &str) {
        if id.is_empty() || !self.session_exists(id) {
            return;
        }
        self.view_mode = ViewMode::Detail(id.to_string());
        self.remembered_detail = None;
        self.focused = Some(id.to_string());
        self.cursor = Some(id.to_string());
        self.reset_ctrl_c();
        self.tab_titles();
        self.active_tab = self.tab_index_for(id);
    }

    /// Back to the overview. Without `clear` the detail session is remembered for re-entry.
    pub fn leave_detail(&mut self, clear: bool) {
        let previous = std::mem::replace(&mut self.view_mode, ViewMode::Overview);
        self.active_tab = 0;
        self.remembered_detail = match previous {
            ViewMode::Detail(id) if !clear => Some(id),
            _ if clear => None,
            _ => self.remembered_detail.take(),
        };
    }

    pub fn toggle_detail(&mut self, id: &str) {
        if self.detail_session() == Some(id) {
            self.leave_detail(true);
        } else {
            self.enter_detail(id);
        }
    }

    pub fn toggle_collapsed(&mut self, id: &str) {
        if id.is_empty() {
            return;
        }
        if !self.collapsed.remove(id) {
            self.collapsed.insert(id.to_string());
        }
    }

    pub fn show_hidden(&mut self) {
        if !self.hidden.is_empty() {
            log::debug!("Showing {} hidden sessions", self.hidden.len());
            self.hidden.clear();
        }
    }

    /// Hide a session's card and drop its preview
    pub fn hide_session(&mut self, id: &str) {
        self.hidden.insert(id.to_string());
        self.previews.remove(id);
        for slot in [&mut self.focused, &mut self.cursor, &mut self.hovered] {
            if slot.as_deref() == Some(id) {
                *slot = None;
            }
        }
        if self.detail_session() == Some(id) {
            self.leave_detail(true);
        }
        if self.remembered_detail.as_deref() == Some(id) {
            self.remembered_detail = None;
        }
        self.reset_ctrl_c();
        self.show_toast(format!("Closed session {}", session_label(id)));
    }

    pub fn start_search(&mut self) {
        self.reset_ctrl_c();
        self.searching = true;
        self.search_saved = self.search_query.clone();
        self.search.set_value(&self.search_saved);
    }

    /// Give a session keyboard focus, pin its preview to the bottom and fetch its variables
    pub fn focus_session(&mut self, id: &str) -> Vec<Command> {
        self.focused = Some(id.to_string());
        self.cursor = Some(id.to_string());
        self.reset_ctrl_c();
        if let Some(preview) = self.previews.get_mut(id) {
            preview.viewport.goto_bottom();
        }
        self.fetch_focused_vars()
    }

    /// Drop focus, leaving the grid cursor on the previously focused card
    pub fn unfocus(&mut self) {
        if let Some(previous) = self.focused.take() {
            self.cursor = Some(previous);
        }
        self.last_esc = None;
        self.reset_ctrl_c();
    }

    /// Keep the cursor on a visible session, defaulting to the first one
    fn ensure_cursor(&mut self, ids: &[String]) {
        let valid = self.cursor.as_ref().is_some_and(|c| ids.contains(c));
        if !valid {
            self.cursor = ids.first().cloned();
        }
    }

    /// Move the cursor by `delta` cards. With `same_row` the move must stay within the row.
    /// Returns false when the move is rejected.
    pub fn move_cursor_by(&mut self, delta: isize, same_row: bool) -> bool {
        let ids: Vec<String> = self.filtered_sessions().iter().map(|s| s.id.clone()).collect();
        if ids.is_empty() {
            self.cursor = None;
            return false;
        }
        self.ensure_cursor(&ids);
        let cols = self.card_cols.max(1) as isize;
        let position = |c: &String| ids.iter().position(|id| id == c);
        let Some(current) = self.cursor.as_ref().and_then(position) else {
            return false;
        };
        let current = current as isize;
        let next = current + delta;
        if next < 0 || next >= ids.len() as isize {
            return false;
        }
        if same_row && current / cols != next / cols {
            return false;
        }
        self.cursor = Some(ids[next as usize].clone());
        true
    }

    pub fn move_cursor_left(&mut self) -> bool {
        self.move_cursor_by(-1, true)
    }

    pub fn move_cursor_right(&mut self) -> bool {
        self.move_cursor_by(1, true)
    }

    pub fn move_cursor_up(&mut self) -> bool {
        let cols = self.card_cols.max(1) as isize;
        self.move_cursor_by(-cols, false)
    }

    pub fn move_cursor_down(&mut self) -> bool {
        let cols = self.card_cols.max(1) as isize;
        self.move_cursor_by(cols, false)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::tests::{model_with, session};
    use crate::model::ViewMode;

    fn grid(count: usize) -> crate::model::Model {
        let sessions = (1..=count)
            .map(|i| session(&format!("${}", i), &format!("s{}", i), &format!("%{}", i)))
            .collect();
        let mut model = model_with(sessions);
        model.card_cols = 2;
        model
    }

    #[test]
    fn test_left_right_stay_in_row() {
        let mut model = grid(4);
        model.cursor = Some("$2".to_string());
        assert!(!model.move_cursor_right());
        assert_eq!(model.cursor.as_deref(), Some("$2"));
        assert!(model.move_cursor_left());
        assert_eq!(model.cursor.as_deref(), Some("$1"));
        assert!(!model.move_cursor_left());

        model.cursor = Some("$3".to_string());
        assert!(!model.move_cursor_left());
        assert_eq!(model.cursor.as_deref(), Some("$3"));
    }

    #[test]
    fn test_up_down_move_by_columns() {
        let mut model = grid(3);
        model.cursor = Some("$1".to_string());
        assert!(model.move_cursor_down());
        assert_eq!(model.cursor.as_deref(), Some("$3"));
        assert!(!model.move_cursor_down());
        assert_eq!(model.cursor.as_deref(), Some("$3"));
        assert!(model.move_cursor_up());
        assert_eq!(model.cursor.as_deref(), Some("$1"));

        model.cursor = Some("$2".to_string());
        assert!(!model.move_cursor_down());
    }

    #[test]
    fn test_missing_cursor_defaults_to_first() {
        let mut model = grid(2);
        model.cursor = Some("$9".to_string());
        assert!(model.move_cursor_right());
        assert_eq!(model.cursor.as_deref(), Some("$2"));
    }

    #[test]
    fn test_tabs_enter_and_leave_detail() {
        let mut model = grid(3);
        assert_eq!(model.tab_titles(), ["Overview", "s1", "s2", "s3"]);

        model.set_active_tab(2);
        assert_eq!(model.view_mode, ViewMode::Detail("$2".to_string()));
        assert_eq!(model.focused.as_deref(), Some("$2"));
        assert_eq!(model.active_tab, 2);

        model.shift_active_tab(5);
        assert_eq!(model.active_tab, 3);
        assert_eq!(model.detail_session(), Some("$3"));

        model.shift_active_tab(-10);
        assert_eq!(model.active_tab, 0);
        assert_eq!(model.view_mode, ViewMode::Overview);
        assert_eq!(model.remembered_detail.as_deref(), Some("$3"));
    }

    #[test]
    fn test_toggle_detail_clears() {
        let mut model = grid(2);
        model.toggle_detail("$1");
        assert_eq!(model.detail_session(), Some("$1"));
        model.toggle_detail("$1");
        assert_eq!(model.view_mode, ViewMode::Overview);
        assert!(model.remembered_detail.is_none());

        model.enter_detail("$404");
        assert_eq!(model.view_mode, ViewMode::Overview);
    }

    #[test]
    fn test_hide_session_drops_preview_and_focus() {
        let mut model = grid(2);
        model.focus_session("$1");
        assert!(model.previews.contains_key("$1"));

        model.hide_session("$1");
        assert!(model.is_hidden("$1"));
        assert!(!model.previews.contains_key("$1"));
        assert!(model.focused.is_none());
        assert!(model.cursor.is_none());
        assert_eq!(model.active_toast(), Some("Closed session 1"));
        assert!(model.filtered_sessions().iter().all(|s| s.id != "$1"));
    }

    #[test]
    fn test_collapse_toggle() {
        let mut model = grid(1);
        model.toggle_collapsed("$1");
        assert!(model.is_collapsed("$1"));
        model.toggle_collapsed("$1");
        assert!(!model.is_collapsed("$1"));
    }
}

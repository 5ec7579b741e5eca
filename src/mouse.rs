//! Mouse handling: tab clicks, card controls, focus and wheel scrolling

use crate::config::SCROLL_STEP;
use crate::model::{Command, Model};
use crate::zone::ZoneTarget;
use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

/// Log target for hit-test diagnostics
pub const TRACE_TARGET: &str = "muxwatch::trace";

fn target_session(target: &ZoneTarget) -> Option<&str> {
    match target {
        ZoneTarget::Card(id)
        | ZoneTarget::Close(id)
        | ZoneTarget::Maximize(id)
        | ZoneTarget::Collapse(id) => Some(id),
        ZoneTarget::Tab(_) => None,
    }
}

impl Model {
    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> Vec<Command> {
        let target = self.zones.hit(mouse.column, mouse.row);
        self.trace_mouse_event(&mouse, target.as_ref());
        // The palette is modal
        if self.palette.open {
            return Vec::new();
        }
        let session = target.as_ref().and_then(target_session).map(str::to_string);

        match mouse.kind {
            MouseEventKind::Moved => {
                self.hovered = session;
                Vec::new()
            }
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let preview = session.and_then(|id| self.previews.get_mut(&id));
                if let Some(preview) = preview {
                    if mouse.kind == MouseEventKind::ScrollUp {
                        preview.viewport.scroll_up(SCROLL_STEP);
                    } else {
                        preview.viewport.scroll_down(SCROLL_STEP);
                    }
                }
                Vec::new()
            }
            MouseEventKind::Down(MouseButton::Left) => match target {
                Some(target) => self.click(target),
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn click(&mut self, target: ZoneTarget) -> Vec<Command> {
        match target {
            ZoneTarget::Tab(index) => {
                self.set_active_tab(index);
                self.fetch_focused_vars()
            }
            ZoneTarget::Close(id) => {
                self.hide_session(&id);
                Vec::new()
            }
            ZoneTarget::Maximize(id) => {
                let before = self.focused.clone();
                self.toggle_detail(&id);
                self.vars_on_focus_change(before)
            }
            ZoneTarget::Collapse(id) => {
                self.toggle_collapsed(&id);
                Vec::new()
            }
            ZoneTarget::Card(id) => self.focus_session(&id),
        }
    }

    fn trace_mouse_event(&self, mouse: &MouseEvent, target: Option<&ZoneTarget>) {
        if !self.trace_mouse {
            return;
        }
        let result = match target.and_then(target_session) {
            Some(id) => match self.zones.get(&ZoneTarget::Card(id.to_string())) {
                Some(rect) => format!(
                    "session={} target={:?} bounds=[x={}..{} y={}..{}]",
                    id,
                    target,
                    rect.x,
                    rect.right(),
                    rect.y,
                    rect.bottom()
                ),
                None => format!("session={} bounds=<unknown>", id),
            },
            None => match target {
                Some(other) => format!("{:?}", other),
                None if self.zones.is_empty() => "miss (nothing rendered yet)".to_string(),
                None => "miss".to_string(),
            },
        };
        log::debug!(
            target: TRACE_TARGET,
            "[mouse] event={:?} pos=({},{}) -> {}",
            mouse.kind,
            mouse.column,
            mouse.row,
            result
        );
    }

    /// Dump the card layout of the last frame to the trace log
    pub fn log_card_layout(&self) {
        if !self.trace_mouse {
            return;
        }
        log::debug!(
            target: TRACE_TARGET,
            "[layout] {} cards, {} columns, rows {:?}",
            self.layout.cards.len(),
            self.layout.columns,
            self.layout.row_bodies
        );
        for (i, card) in self.layout.cards.iter().enumerate() {
            log::debug!(
                target: TRACE_TARGET,
                "  [{}] session={} bounds=[x={}..{} y={}..{}] close=[x={}..{} y={}]",
                i,
                card.session_id,
                card.rect.x,
                card.rect.right(),
                card.rect.y,
                card.rect.bottom(),
                card.close.x,
                card.close.right(),
                card.close.y
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Rect;
    use crate::model::tests::{model_with, session};
    use crate::model::{Message, ViewMode};
    use crossterm::event::KeyModifiers;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Message {
        Message::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn click(column: u16, row: u16) -> Message {
        mouse(MouseEventKind::Down(MouseButton::Left), column, row)
    }

    /// Two cards side by side with their controls in the header row
    fn laid_out() -> Model {
        let mut model = model_with(vec![session("$1", "a", "%1"), session("$2", "b", "%2")]);
        for (id, x) in [("$1", 0u16), ("$2", 70)] {
            model.zones.mark(ZoneTarget::Card(id.to_string()), Rect::new(x, 3, 70, 10));
            model.zones.mark(ZoneTarget::Collapse(id.to_string()), Rect::new(x + 56, 4, 3, 1));
            model.zones.mark(ZoneTarget::Maximize(id.to_string()), Rect::new(x + 60, 4, 3, 1));
            model.zones.mark(ZoneTarget::Close(id.to_string()), Rect::new(x + 64, 4, 3, 1));
        }
        model.zones.mark(ZoneTarget::Tab(0), Rect::new(0, 1, 10, 1));
        model.zones.mark(ZoneTarget::Tab(2), Rect::new(20, 1, 5, 1));
        model
    }

    #[test]
    fn test_click_focuses_card() {
        let mut model = laid_out();
        let content: Vec<String> = (0..30).map(|i| i.to_string()).collect();
        model.update(Message::PaneContent {
            session_id: "$2".to_string(),
            pane_id: "%2".to_string(),
            result: Ok(content.join("\n")),
        });
        model.previews.get_mut("$2").unwrap().viewport.goto_top();

        let cmds = model.update(click(80, 8));
        assert_eq!(model.focused.as_deref(), Some("$2"));
        assert_eq!(model.cursor.as_deref(), Some("$2"));
        assert!(model.previews["$2"].viewport.at_bottom());
        assert_eq!(
            cmds,
            [Command::FetchVars {
                session_id: "$2".to_string(),
                pane_id: "%2".to_string(),
            }]
        );
    }

    #[test]
    fn test_click_outside_cards_is_ignored() {
        let mut model = laid_out();
        assert!(model.update(click(100, 30)).is_empty());
        assert!(model.focused.is_none());
    }

    #[test]
    fn test_close_control_hides_session() {
        let mut model = laid_out();
        model.update(click(65, 4));
        assert!(model.is_hidden("$1"));
        assert!(!model.previews.contains_key("$1"));
        assert_eq!(model.active_toast(), Some("Closed session 1"));
    }

    #[test]
    fn test_maximize_and_collapse_controls() {
        let mut model = laid_out();
        model.update(click(131, 4));
        assert_eq!(model.view_mode, ViewMode::Detail("$2".to_string()));
        model.update(click(131, 4));
        assert_eq!(model.view_mode, ViewMode::Overview);

        model.update(click(57, 4));
        assert!(model.is_collapsed("$1"));
        assert_eq!(model.focused.as_deref(), Some("$2"));
    }

    #[test]
    fn test_maximize_fetches_vars_for_new_focus() {
        let mut model = laid_out();
        let cmds = model.update(click(131, 4));
        assert_eq!(model.focused.as_deref(), Some("$2"));
        assert_eq!(
            cmds,
            [Command::FetchVars {
                session_id: "$2".to_string(),
                pane_id: "%2".to_string(),
            }]
        );
        // Restoring keeps focus where it is
        assert!(model.update(click(131, 4)).is_empty());
    }

    #[test]
    fn test_open_palette_blocks_cards() {
        let mut model = laid_out();
        model.open_palette();
        assert!(model.update(click(80, 8)).is_empty());
        assert!(model.focused.is_none());
        model.update(mouse(MouseEventKind::Moved, 75, 9));
        assert!(model.hovered.is_none());
        model.update(click(65, 4));
        assert!(!model.is_hidden("$1"));
    }

    #[test]
    fn test_wheel_scrolls_card_under_pointer() {
        let mut model = laid_out();
        let content: Vec<String> = (0..30).map(|i| i.to_string()).collect();
        model.update(Message::PaneContent {
            session_id: "$1".to_string(),
            pane_id: "%1".to_string(),
            result: Ok(content.join("\n")),
        });
        let bottom = model.previews["$1"].viewport.y_offset();
        model.update(mouse(MouseEventKind::ScrollUp, 10, 6));
        assert_eq!(model.previews["$1"].viewport.y_offset(), bottom - SCROLL_STEP);
        assert_eq!(model.previews["$2"].viewport.y_offset(), 0);
    }

    #[test]
    fn test_hover_and_tab_click() {
        let mut model = laid_out();
        model.update(mouse(MouseEventKind::Moved, 75, 9));
        assert_eq!(model.hovered.as_deref(), Some("$2"));
        model.update(mouse(MouseEventKind::Moved, 75, 30));
        assert!(model.hovered.is_none());

        model.update(click(21, 1));
        assert_eq!(model.detail_session(), Some("$2"));
        model.update(click(2, 1));
        assert_eq!(model.view_mode, ViewMode::Overview);
    }
}

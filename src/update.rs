//! Message handling: snapshot reconciliation and background results

use crate::config::MIN_PREVIEW_HEIGHT;
use crate::model::{Command, ErrorOp, Message, Model};
use crate::preview::SessionPreview;
use crate::stale;
use crate::tmux::{Snapshot, TmuxError};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};

/// Preview width used before a session has been laid out
const FALLBACK_PREVIEW_WIDTH: usize = 60;

impl Model {
    pub fn update(&mut self, msg: Message) -> Vec<Command> {
        match msg {
            Message::Tick => self.on_tick(),
            Message::Snapshot(Ok(snapshot)) => self.apply_snapshot(snapshot),
            Message::Snapshot(Err(err)) => self.on_snapshot_error(err),
            Message::PaneContent {
                session_id,
                pane_id,
                result,
            } => {
                self.apply_pane_content(&session_id, &pane_id, result);
                Vec::new()
            }
            Message::PaneVars {
                session_id,
                pane_id,
                result,
            } => {
                self.apply_pane_vars(&session_id, &pane_id, result);
                Vec::new()
            }
            Message::KeysSent(result) => {
                match result {
                    Ok(()) => self.clear_error(ErrorOp::SendKeys),
                    Err(err) => self.record_error(ErrorOp::SendKeys, &err),
                }
                Vec::new()
            }
            Message::SessionsKilled { killed, error } => self.on_sessions_killed(killed, error),
            Message::Key(key) => self.handle_key(key),
            Message::Mouse(mouse) => self.handle_mouse(mouse),
            Message::Resize(width, height) => {
                self.width = width;
                self.height = height;
                Vec::new()
            }
        }
    }

    fn on_tick(&mut self) -> Vec<Command> {
        if self.inflight {
            log::trace!("Tick skipped, snapshot still in flight");
            return Vec::new();
        }
        self.inflight = true;
        vec![Command::FetchSnapshot]
    }

    /// Fetch a snapshot now, or queue one behind the fetch already in flight
    pub fn force_refresh(&mut self) -> Vec<Command> {
        if self.inflight {
            self.refetch_queued = true;
            return Vec::new();
        }
        self.inflight = true;
        vec![Command::FetchSnapshot]
    }

    /// Variable fetch for the focused session's mirrored pane
    pub fn fetch_focused_vars(&self) -> Vec<Command> {
        let Some(focused) = &self.focused else {
            return Vec::new();
        };
        match self.previews.get(focused) {
            Some(preview) if !preview.pane_id.is_empty() => vec![Command::FetchVars {
                session_id: focused.clone(),
                pane_id: preview.pane_id.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Variable fetch if focus is no longer on `before`
    pub fn vars_on_focus_change(&self, before: Option<String>) -> Vec<Command> {
        if self.focused == before {
            return Vec::new();
        }
        self.fetch_focused_vars()
    }

    /// Commands that close out a fetch: a queued refetch, then the next tick
    fn finish_fetch(&mut self, mut cmds: Vec<Command>) -> Vec<Command> {
        self.inflight = false;
        if self.refetch_queued {
            self.refetch_queued = false;
            self.inflight = true;
            cmds.push(Command::FetchSnapshot);
        }
        cmds.push(Command::ScheduleTick);
        cmds
    }

    fn on_snapshot_error(&mut self, err: TmuxError) -> Vec<Command> {
        self.record_error(ErrorOp::Snapshot, &err);
        self.finish_fetch(Vec::new())
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) -> Vec<Command> {
        self.clear_error(ErrorOp::Snapshot);
        self.last_refresh = Some(snapshot.timestamp);
        self.sessions = snapshot.sessions;

        let known: HashSet<String> = self.sessions.iter().map(|s| s.id.clone()).collect();
        self.purge_missing(&known);

        let now = Utc::now();
        self.previews.retain(|id, _| known.contains(id));
        let stale_after = self.settings.stale_after;
        self.stale = stale::stale_set(&self.sessions, &self.previews, now, stale_after);

        let mut cmds = self.reconcile_previews();
        cmds.extend(self.fetch_focused_vars());

        log::debug!(
            "Snapshot: {} sessions, {} stale, {} previews, {} captures",
            self.sessions.len(),
            self.stale.len(),
            self.previews.len(),
            cmds.len()
        );
        self.finish_fetch(cmds)
    }

    /// Drop every reference to sessions that are no longer known
    fn purge_missing(&mut self, known: &HashSet<String>) {
        self.hidden.retain(|id| known.contains(id));
        self.collapsed.retain(|id| known.contains(id));
        self.stale.retain(|id| known.contains(id));
        let slots = [
            &mut self.focused,
            &mut self.cursor,
            &mut self.hovered,
            &mut self.remembered_detail,
        ];
        for slot in slots {
            if slot.as_ref().is_some_and(|id| !known.contains(id)) {
                *slot = None;
            }
        }
        if self.detail_session().is_some_and(|id| !known.contains(id)) {
            log::debug!("Detail session vanished, back to overview");
            self.leave_detail(true);
        }
    }

    /// Viewport size for a session, taken from the last rendered layout
    fn preview_size(&self, session_id: &str) -> (usize, usize) {
        match self.layout.card(session_id) {
            Some(card) if card.body.height > 0 => {
                (card.body.width as usize, card.body.height as usize)
            }
            _ => {
                let width = if self.layout.inner_width > 0 {
                    self.layout.inner_width as usize
                } else {
                    FALLBACK_PREVIEW_WIDTH
                };
                (width, MIN_PREVIEW_HEIGHT as usize)
            }
        }
    }

    /// Create, retarget and drop previews, returning captures for the sessions on screen
    fn reconcile_previews(&mut self) -> Vec<Command> {
        let targets: Vec<(String, String)> = self
            .sessions
            .iter()
            .filter(|s| !self.is_hidden(&s.id))
            .filter_map(|s| s.active_pane().map(|(_, pane)| (s.id.clone(), pane.id.clone())))
            .collect();

        let wanted: HashSet<&str> = targets.iter().map(|(id, _)| id.as_str()).collect();
        self.previews.retain(|id, _| wanted.contains(id.as_str()));

        for (session_id, pane_id) in &targets {
            let (width, height) = self.preview_size(session_id);
            match self.previews.get_mut(session_id) {
                Some(preview) => {
                    preview.retarget(pane_id);
                    preview.viewport.set_size(width, height);
                }
                None => {
                    self.previews
                        .insert(session_id.clone(), SessionPreview::new(pane_id, width, height));
                }
            }
        }

        let on_screen: HashSet<String> =
            self.visible_sessions().iter().map(|s| s.id.clone()).collect();
        let detail = self.detail_session().map(str::to_string);
        let mut cmds = Vec::new();
        for (session_id, pane_id) in targets {
            if !on_screen.contains(&session_id) {
                continue;
            }
            let wanted = !self.is_collapsed(&session_id)
                || self.is_focused(&session_id)
                || detail.as_deref() == Some(session_id.as_str());
            if !wanted {
                continue;
            }
            let height = self.previews.get(&session_id).map_or(0, |p| p.viewport.height);
            cmds.push(Command::CapturePane {
                lines: self.settings.capture.lines_for(height),
                session_id,
                pane_id,
            });
        }
        cmds
    }

    fn apply_pane_content(
        &mut self,
        session_id: &str,
        pane_id: &str,
        result: Result<String, TmuxError>,
    ) {
        let Some(preview) = self.previews.get_mut(session_id) else {
            log::trace!("Capture for {} dropped, no preview", session_id);
            return;
        };
        if preview.pane_id != pane_id {
            log::trace!("Capture for {} dropped, now mirroring {}", pane_id, preview.pane_id);
            return;
        }
        match result {
            Ok(content) => {
                preview.apply_capture(&content, Utc::now());
                self.clear_error(ErrorOp::Capture);
            }
            Err(err) => self.record_error(ErrorOp::Capture, &err),
        }
    }

    fn apply_pane_vars(
        &mut self,
        session_id: &str,
        pane_id: &str,
        result: Result<BTreeMap<String, String>, TmuxError>,
    ) {
        let Some(preview) = self.previews.get_mut(session_id) else {
            return;
        };
        if preview.pane_id != pane_id {
            log::trace!("Variables for {} dropped, now mirroring {}", pane_id, preview.pane_id);
            return;
        }
        match result {
            Ok(vars) => {
                preview.vars = vars;
                self.clear_error(ErrorOp::Variables);
            }
            Err(err) => {
                log::warn!("Variables for {} failed: {}", pane_id, err);
                preview.vars = BTreeMap::from([("error".to_string(), err.to_string())]);
            }
        }
    }

    fn on_sessions_killed(
        &mut self,
        killed: Vec<String>,
        error: Option<TmuxError>,
    ) -> Vec<Command> {
        for id in &killed {
            self.hidden.remove(id);
            self.stale.remove(id);
            self.collapsed.remove(id);
            self.previews.remove(id);
            let slots = [
                &mut self.focused,
                &mut self.cursor,
                &mut self.hovered,
                &mut self.remembered_detail,
            ];
            for slot in slots {
                if slot.as_ref() == Some(id) {
                    *slot = None;
                }
            }
            if self.detail_session() == Some(id.as_str()) {
                self.leave_detail(true);
            }
        }
        if !killed.is_empty() {
            let noun = if killed.len() == 1 { "session" } else { "sessions" };
            self.show_toast(format!("Killed {} {}", killed.len(), noun));
        }
        match error {
            Some(err) => self.record_error(ErrorOp::Kill, &err),
            None => self.clear_error(ErrorOp::Kill),
        }
        self.force_refresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::layout::{CardSlot, Grid, GridLayout, Layout, Rect};
    use crate::model::tests::{model_with, session, snapshot};
    use crate::model::ViewMode;

    fn captures(cmds: &[Command]) -> Vec<&str> {
        cmds.iter()
            .filter_map(|c| match c {
                Command::CapturePane { pane_id, .. } => Some(pane_id.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_snapshot_issues_captures() {
        let mut model = Model::new(Settings::default(), false);
        assert_eq!(model.init(), [Command::FetchSnapshot, Command::ScheduleTick]);
        let cmds = model.update(Message::Snapshot(Ok(snapshot(vec![
            session("$1", "a", "%1"),
            session("$2", "b", "%2"),
        ]))));

        assert!(!model.inflight);
        assert_eq!(captures(&cmds), ["%1", "%2"]);
        assert!(cmds.contains(&Command::CapturePane {
            session_id: "$1".to_string(),
            pane_id: "%1".to_string(),
            lines: 120,
        }));
        assert_eq!(cmds.last(), Some(&Command::ScheduleTick));
        assert_eq!(model.previews.len(), 2);
    }

    #[test]
    fn test_preview_size_follows_layout() {
        let mut model = model_with(vec![session("$1", "a", "%1"), session("$2", "b", "%2")]);
        let slots = [
            CardSlot {
                session_id: "$1",
                collapsed: false,
            },
            CardSlot {
                session_id: "$2",
                collapsed: true,
            },
        ];
        model.layout = Grid.arrange(&slots, Rect::new(0, 3, 140, 30));

        let body = model.layout.card("$1").unwrap().body;
        assert!(body.height > 0);
        assert_eq!(model.preview_size("$1"), (body.width as usize, body.height as usize));

        // Collapsed cards have no body, so the minimum height is used
        assert_eq!(
            model.preview_size("$2"),
            (model.layout.inner_width as usize, MIN_PREVIEW_HEIGHT as usize)
        );

        model.layout = GridLayout::default();
        assert_eq!(
            model.preview_size("$1"),
            (FALLBACK_PREVIEW_WIDTH, MIN_PREVIEW_HEIGHT as usize)
        );
    }

    #[test]
    fn test_collapsed_unfocused_not_captured() {
        let mut model = model_with(vec![session("$1", "a", "%1"), session("$2", "b", "%2")]);
        model.collapsed.insert("$2".to_string());
        model.update(Message::Tick);
        let cmds = model.update(Message::Snapshot(Ok(snapshot(vec![
            session("$1", "a", "%1"),
            session("$2", "b", "%2"),
        ]))));
        assert_eq!(captures(&cmds), ["%1"]);

        model.focused = Some("$2".to_string());
        model.update(Message::Tick);
        let cmds = model.update(Message::Snapshot(Ok(snapshot(vec![
            session("$1", "a", "%1"),
            session("$2", "b", "%2"),
        ]))));
        assert_eq!(captures(&cmds), ["%1", "%2"]);
        assert!(cmds.contains(&Command::FetchVars {
            session_id: "$2".to_string(),
            pane_id: "%2".to_string(),
        }));
    }

    #[test]
    fn test_tick_is_noop_while_inflight() {
        let mut model = Model::new(Settings::default(), false);
        model.init();
        assert!(model.update(Message::Tick).is_empty());

        model.update(Message::Snapshot(Ok(snapshot(Vec::new()))));
        assert_eq!(model.update(Message::Tick), [Command::FetchSnapshot]);
        assert!(model.update(Message::Tick).is_empty());
    }

    #[test]
    fn test_snapshot_error_keeps_sessions() {
        let mut model = model_with(vec![session("$1", "a", "%1")]);
        model.update(Message::Tick);
        let cmds = model.update(Message::Snapshot(Err(TmuxError::Timeout {
            command: "list-sessions".to_string(),
            timeout: std::time::Duration::from_secs(2),
        })));

        assert_eq!(cmds, [Command::ScheduleTick]);
        assert!(!model.inflight);
        assert_eq!(model.sessions.len(), 1);
        assert_eq!(model.last_error.as_ref().map(|e| e.op), Some(ErrorOp::Snapshot));

        model.update(Message::Tick);
        model.update(Message::Snapshot(Ok(snapshot(vec![session("$1", "a", "%1")]))));
        assert!(model.last_error.is_none());
    }

    #[test]
    fn test_vanished_sessions_are_purged() {
        let mut model = model_with(vec![session("$1", "a", "%1"), session("$2", "b", "%2")]);
        model.enter_detail("$2");
        model.hidden.insert("$1".to_string());
        model.collapsed.insert("$2".to_string());
        model.hovered = Some("$2".to_string());

        model.update(Message::Tick);
        model.update(Message::Snapshot(Ok(snapshot(vec![session("$1", "a", "%1")]))));

        assert_eq!(model.view_mode, ViewMode::Overview);
        assert!(model.focused.is_none());
        assert!(model.cursor.is_none());
        assert!(model.hovered.is_none());
        assert!(model.remembered_detail.is_none());
        assert!(model.collapsed.is_empty());
        assert!(model.is_hidden("$1"));
        assert!(!model.previews.contains_key("$1"));
        assert!(!model.previews.contains_key("$2"));
    }

    #[test]
    fn test_stale_set_rebuilt_each_snapshot() {
        let mut old = session("$1", "idle", "%1");
        old.attached = false;
        old.last_activity = Some(Utc::now() - chrono::Duration::hours(3));
        old.windows[0].panes[0].last_activity = Some(Utc::now() - chrono::Duration::hours(3));
        let mut model = model_with(vec![old.clone(), session("$2", "b", "%2")]);
        assert_eq!(model.stale_ids(), ["$1"]);

        let mut revived = old;
        revived.windows[0].panes[0].last_activity = Some(Utc::now());
        model.update(Message::Tick);
        model.update(Message::Snapshot(Ok(snapshot(vec![revived, session("$2", "b", "%2")]))));
        assert!(model.stale.is_empty());
    }

    #[test]
    fn test_capture_for_old_pane_is_discarded() {
        let mut model = model_with(vec![session("$1", "a", "%2")]);
        model.update(Message::PaneContent {
            session_id: "$1".to_string(),
            pane_id: "%2".to_string(),
            result: Ok("first".to_string()),
        });

        model.update(Message::Tick);
        model.update(Message::Snapshot(Ok(snapshot(vec![session("$1", "a", "%3")]))));
        let preview = &model.previews["$1"];
        assert_eq!(preview.pane_id, "%3");
        assert_eq!(preview.viewport.line_count(), 0);

        model.update(Message::PaneContent {
            session_id: "$1".to_string(),
            pane_id: "%2".to_string(),
            result: Ok("late output from %2".to_string()),
        });
        let preview = &model.previews["$1"];
        assert_eq!(preview.viewport.line_count(), 0);
        assert!(preview.last_content.is_empty());
        assert!(model.last_error.is_none());
    }

    #[test]
    fn test_capture_preserves_manual_scroll() {
        let mut model = model_with(vec![session("$1", "a", "%1")]);
        let content: Vec<String> = (0..50).map(|i| format!("line {}", i)).collect();
        model.update(Message::PaneContent {
            session_id: "$1".to_string(),
            pane_id: "%1".to_string(),
            result: Ok(content.join("\n")),
        });
        assert!(model.previews["$1"].viewport.at_bottom());

        model.previews.get_mut("$1").unwrap().viewport.scroll_up(10);
        let offset = model.previews["$1"].viewport.y_offset();
        model.update(Message::PaneContent {
            session_id: "$1".to_string(),
            pane_id: "%1".to_string(),
            result: Ok(format!("{}\nline 50", content.join("\n"))),
        });
        assert_eq!(model.previews["$1"].viewport.y_offset(), offset);

        model.previews.get_mut("$1").unwrap().viewport.goto_bottom();
        model.update(Message::PaneContent {
            session_id: "$1".to_string(),
            pane_id: "%1".to_string(),
            result: Ok(format!("{}\nline 50\nline 51", content.join("\n"))),
        });
        assert!(model.previews["$1"].viewport.at_bottom());
    }

    #[test]
    fn test_capture_error_recorded() {
        let mut model = model_with(vec![session("$1", "a", "%1")]);
        model.update(Message::PaneContent {
            session_id: "$1".to_string(),
            pane_id: "%1".to_string(),
            result: Err(TmuxError::EmptyId("pane")),
        });
        assert_eq!(model.last_error.as_ref().map(|e| e.op), Some(ErrorOp::Capture));
    }

    #[test]
    fn test_vars_error_becomes_entry() {
        let mut model = model_with(vec![session("$1", "a", "%1")]);
        model.update(Message::PaneVars {
            session_id: "$1".to_string(),
            pane_id: "%1".to_string(),
            result: Err(TmuxError::EmptyId("pane")),
        });
        let vars = &model.previews["$1"].vars;
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["error"], "pane id cannot be empty");
        assert!(model.last_error.is_none());
    }

    #[test]
    fn test_kill_purges_and_refetches() {
        let mut model = model_with(vec![session("$1", "a", "%1"), session("$2", "b", "%2")]);
        model.stale.insert("$1".to_string());
        model.collapsed.insert("$1".to_string());
        model.enter_detail("$1");

        let cmds = model.update(Message::SessionsKilled {
            killed: vec!["$1".to_string()],
            error: None,
        });
        assert_eq!(cmds, [Command::FetchSnapshot]);
        assert!(model.inflight);
        assert!(!model.is_stale("$1"));
        assert!(!model.is_collapsed("$1"));
        assert!(model.focused.is_none());
        assert!(model.cursor.is_none());
        assert_eq!(model.view_mode, ViewMode::Overview);
        assert!(!model.previews.contains_key("$1"));
        assert_eq!(model.active_toast(), Some("Killed 1 session"));
    }

    #[test]
    fn test_kill_while_inflight_queues_refetch() {
        let mut model = model_with(vec![session("$1", "a", "%1")]);
        model.update(Message::Tick);
        assert!(model.inflight);

        let cmds = model.update(Message::SessionsKilled {
            killed: vec!["$1".to_string()],
            error: None,
        });
        assert!(cmds.is_empty());
        assert!(model.refetch_queued);

        let cmds = model.update(Message::Snapshot(Ok(snapshot(vec![session("$1", "a", "%1")]))));
        assert!(cmds.contains(&Command::FetchSnapshot));
        assert_eq!(cmds.last(), Some(&Command::ScheduleTick));
        assert!(model.inflight);
        assert!(!model.refetch_queued);
    }
}

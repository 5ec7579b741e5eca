//! Snapshot types - sessions, windows and panes as reported by tmux

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tmux session with its windows populated
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub attached: bool,
    pub created_at: Option<DateTime<Utc>>,
    /// Most recent activity timestamp reported by tmux for the session itself
    pub last_activity: Option<DateTime<Utc>>,
    pub windows: Vec<Window>,
}

/// A tmux window and its panes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Window {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub session: String,
    pub index: i64,
    pub last_flag: bool,
    /// Newest activity over the window's panes
    pub last_pane: Option<DateTime<Utc>>,
    pub panes: Vec<Pane>,
}

/// A tmux pane
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Pane {
    pub id: String,
    pub title: String,
    pub active: bool,
    pub window: String,
    pub session: String,
    pub current_cmd: String,
    pub tty: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub width: u16,
    pub height: u16,
    pub dead: bool,
    pub dead_status: i32,
}

/// State of the tmux server at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub sessions: Vec<Session>,
    pub timestamp: DateTime<Utc>,
}

impl Session {
    /// The window marked active, or the first window when none is marked
    pub fn active_window(&self) -> Option<&Window> {
        self.windows
            .iter()
            .find(|w| w.active)
            .or_else(|| self.windows.first())
    }

    /// The active pane of the active window
    pub fn active_pane(&self) -> Option<(&Window, &Pane)> {
        let window = self.active_window()?;
        let pane = window.active_pane()?;
        Some((window, pane))
    }

    /// True when the session has panes and every one of them has exited
    pub fn all_panes_dead(&self) -> bool {
        let mut found = false;
        for pane in self.windows.iter().flat_map(|w| &w.panes) {
            found = true;
            if !pane.dead {
                return false;
            }
        }
        found
    }

    /// Newest pane activity timestamp within the session
    pub fn latest_pane_activity(&self) -> Option<DateTime<Utc>> {
        self.windows
            .iter()
            .flat_map(|w| &w.panes)
            .filter_map(|p| p.last_activity)
            .max()
    }

    /// Case-insensitive substring match against the session, window and pane labels.
    /// `query` must already be lowercase.
    pub fn matches(&self, query: &str) -> bool {
        if self.name.to_lowercase().contains(query) {
            return true;
        }
        self.windows.iter().any(|window| {
            window.name.to_lowercase().contains(query)
                || window
                    .panes
                    .iter()
                    .any(|pane| pane.title_or_cmd().to_lowercase().contains(query))
        })
    }

    /// Display label: the name, or the id without its `$` sigil
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            session_label(&self.id)
        } else {
            &self.name
        }
    }
}

impl Window {
    /// The pane marked active, or the first pane when none is marked
    pub fn active_pane(&self) -> Option<&Pane> {
        self.panes
            .iter()
            .find(|p| p.active)
            .or_else(|| self.panes.first())
    }
}

impl Pane {
    /// Most descriptive label: title, then running command, then "pane"
    pub fn title_or_cmd(&self) -> &str {
        let title = self.title.trim();
        if !title.is_empty() {
            return title;
        }
        let cmd = self.current_cmd.trim();
        if !cmd.is_empty() {
            return cmd;
        }
        "pane"
    }

    /// "running", or the exit status once the pane has died
    pub fn status_string(&self) -> String {
        if !self.dead {
            "running".to_string()
        } else {
            format!("exit {}", self.dead_status)
        }
    }
}

/// Strip the leading `$` tmux puts on session ids
pub fn session_label(id: &str) -> &str {
    match id.strip_prefix('$') {
        Some(rest) if !rest.is_empty() => rest,
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pane(id: &str) -> Pane {
        Pane {
            id: id.to_string(),
            ..Default::default()
        }
    }

    fn window(name: &str, active: bool) -> Window {
        Window {
            name: name.into(),
            active,
            ..Default::default()
        }
    }

    fn with_panes(panes: Vec<Pane>) -> Session {
        Session {
            windows: vec![Window {
                panes,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_active_window_fallback() {
        let session = Session {
            windows: vec![window("first", false), window("second", true)],
            ..Default::default()
        };
        assert_eq!(session.active_window().map(|w| w.name.as_str()), Some("second"));

        let session = Session {
            windows: vec![window("first", false), window("second", false)],
            ..Default::default()
        };
        assert_eq!(session.active_window().map(|w| w.name.as_str()), Some("first"));
        assert!(Session::default().active_window().is_none());
    }

    #[test]
    fn test_active_pane() {
        let mut active = pane("%2");
        active.active = true;
        let window = Window {
            panes: vec![pane("%1"), active],
            ..Default::default()
        };
        assert_eq!(window.active_pane().map(|p| p.id.as_str()), Some("%2"));

        let window = Window {
            panes: vec![pane("%1"), pane("%2")],
            ..Default::default()
        };
        assert_eq!(window.active_pane().map(|p| p.id.as_str()), Some("%1"));
    }

    #[test]
    fn test_all_panes_dead() {
        let mut session = with_panes(vec![pane("%1"), pane("%2")]);
        for pane in &mut session.windows[0].panes {
            pane.dead = true;
        }
        assert!(session.all_panes_dead());

        session.windows[0].panes[1].dead = false;
        assert!(!session.all_panes_dead());

        // No panes at all is not "dead"
        assert!(!Session::default().all_panes_dead());
    }

    #[test]
    fn test_latest_pane_activity() {
        let now = Utc::now();
        let mut session = with_panes(vec![pane("%1"), pane("%2"), pane("%3")]);
        session.windows[0].panes[0].last_activity = Some(now - Duration::minutes(30));
        session.windows[0].panes[1].last_activity = Some(now - Duration::minutes(10));
        assert_eq!(session.latest_pane_activity(), Some(now - Duration::minutes(10)));

        let empty = with_panes(vec![pane("%1")]);
        assert!(empty.latest_pane_activity().is_none());
    }

    #[test]
    fn test_matches() {
        let mut logs = pane("%1");
        logs.title = "logs".into();
        let mut session = with_panes(vec![logs]);
        session.name = "Work".into();
        session.windows[0].name = "build".into();

        assert!(session.matches("work"));
        assert!(session.matches("build"));
        assert!(session.matches("logs"));
        assert!(!session.matches("missing"));
    }

    #[test]
    fn test_pane_labels() {
        let mut p = pane("%1");
        assert_eq!(p.title_or_cmd(), "pane");
        p.current_cmd = "vim".into();
        assert_eq!(p.title_or_cmd(), "vim");
        p.title = " htop ".into();
        assert_eq!(p.title_or_cmd(), "htop");

        let mut p = pane("%1");
        assert_eq!(p.status_string(), "running");
        p.dead = true;
        assert_eq!(p.status_string(), "exit 0");
        p.dead_status = 2;
        assert_eq!(p.status_string(), "exit 2");
    }

    #[test]
    fn test_session_label() {
        assert_eq!(session_label("$12"), "12");
        assert_eq!(session_label("$"), "$");
        assert_eq!(session_label("work"), "work");
    }
}

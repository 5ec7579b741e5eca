//! Dashboard state, the messages that change it and the commands it asks for
//!
//! Everything the dashboard knows lives in [`Model`], which is only ever touched
//! from the event loop. Work that talks to tmux is requested by returning
//! [`Command`] values from `update`; the runtime performs each one elsewhere and
//! feeds exactly one [`Message`] back.

use crate::config::{
    Settings, CLOSE_LABEL, COLLAPSE_LABEL, EXPAND_LABEL, MAXIMIZE_LABEL, RESTORE_LABEL,
    TOAST_DURATION,
};
use crate::editor::LineEditor;
use crate::layout::GridLayout;
use crate::palette::Palette;
use crate::preview::SessionPreview;
use crate::tmux::{Pane, Session, Snapshot, TmuxError, Window};
use crate::zone::ZoneMap;
use chrono::{DateTime, Utc};
use crossterm::event::{KeyEvent, MouseEvent};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Input to `Model::update`
#[derive(Debug)]
pub enum Message {
    /// The poll timer fired
    Tick,
    Snapshot(Result<Snapshot, TmuxError>),
    PaneContent {
        session_id: String,
        pane_id: String,
        result: Result<String, TmuxError>,
    },
    PaneVars {
        session_id: String,
        pane_id: String,
        result: Result<BTreeMap<String, String>, TmuxError>,
    },
    KeysSent(Result<(), TmuxError>),
    /// Sessions that were killed, and the error that stopped the batch early, if any
    SessionsKilled {
        killed: Vec<String>,
        error: Option<TmuxError>,
    },
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
}

/// Work requested by `Model::update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchSnapshot,
    /// (Re)arm the poll timer
    ScheduleTick,
    CapturePane {
        session_id: String,
        pane_id: String,
        lines: usize,
    },
    FetchVars {
        session_id: String,
        pane_id: String,
    },
    SendKeys {
        pane_id: String,
        keys: Vec<String>,
    },
    KillSessions {
        ids: Vec<String>,
    },
    Quit,
}

/// Which kind of operation produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOp {
    Snapshot,
    Capture,
    Variables,
    SendKeys,
    Kill,
}

/// The most recent recoverable failure, shown in the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub op: ErrorOp,
    pub message: String,
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    Overview,
    /// One session shown on its own
    Detail(String),
}

/// Transient footer message
#[derive(Debug, Clone)]
pub struct Toast {
    pub text: String,
    pub expires: Instant,
}

static NEXT_MODEL: AtomicUsize = AtomicUsize::new(1);

/// Application state
pub struct Model {
    pub settings: Settings,

    pub width: u16,
    pub height: u16,

    pub sessions: Vec<Session>,
    pub previews: HashMap<String, SessionPreview>,
    pub hidden: HashSet<String>,
    pub stale: HashSet<String>,
    pub collapsed: HashSet<String>,

    pub palette: Palette,

    pub search: LineEditor,
    pub searching: bool,
    pub search_query: String,
    /// Filter in effect when editing started, restored on cancel
    pub search_saved: String,
    pub toast: Option<Toast>,

    pub focused: Option<String>,
    pub cursor: Option<String>,
    pub hovered: Option<String>,

    pub view_mode: ViewMode,
    /// Detail session remembered after leaving detail mode without clearing
    pub remembered_detail: Option<String>,
    pub active_tab: usize,
    pub tab_session_ids: Vec<String>,

    /// Layout and zones of the last rendered frame
    pub layout: GridLayout,
    pub zones: ZoneMap,
    pub card_cols: usize,

    pub trace_mouse: bool,
    pub hostname: String,

    pub last_refresh: Option<DateTime<Utc>>,
    pub last_error: Option<LastError>,
    /// A snapshot fetch is outstanding
    pub inflight: bool,
    /// A forced refresh arrived while a fetch was outstanding
    pub refetch_queued: bool,

    pub last_ctrl_c: Option<Instant>,
    pub last_esc: Option<Instant>,
}

impl Model {
    pub fn new(settings: Settings, trace_mouse: bool) -> Self {
        let id = NEXT_MODEL.fetch_add(1, Ordering::Relaxed);
        Self {
            settings,
            width: 0,
            height: 0,
            sessions: Vec::new(),
            previews: HashMap::new(),
            hidden: HashSet::new(),
            stale: HashSet::new(),
            collapsed: HashSet::new(),
            palette: Palette::default(),
            search: LineEditor::default(),
            searching: false,
            search_query: String::new(),
            search_saved: String::new(),
            toast: None,
            focused: None,
            cursor: None,
            hovered: None,
            view_mode: ViewMode::Overview,
            remembered_detail: None,
            active_tab: 0,
            tab_session_ids: Vec::new(),
            layout: GridLayout::default(),
            zones: ZoneMap::new(format!("m{}-", id)),
            card_cols: 1,
            trace_mouse,
            hostname: lookup_hostname(),
            last_refresh: None,
            last_error: None,
            inflight: false,
            refetch_queued: false,
            last_ctrl_c: None,
            last_esc: None,
        }
    }

    /// Commands to run at startup: the first fetch and the poll timer
    pub fn init(&mut self) -> Vec<Command> {
        self.inflight = true;
        vec![Command::FetchSnapshot, Command::ScheduleTick]
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn session_exists(&self, id: &str) -> bool {
        self.session(id).is_some()
    }

    /// Active window and pane of a session
    pub fn pane_for(&self, session_id: &str) -> Option<(&Window, &Pane)> {
        self.session(session_id)?.active_pane()
    }

    pub fn is_hidden(&self, id: &str) -> bool {
        self.hidden.contains(id)
    }

    pub fn is_stale(&self, id: &str) -> bool {
        self.stale.contains(id)
    }

    pub fn is_collapsed(&self, id: &str) -> bool {
        self.collapsed.contains(id)
    }

    pub fn is_focused(&self, id: &str) -> bool {
        self.focused.as_deref() == Some(id)
    }

    pub fn detail_session(&self) -> Option<&str> {
        match &self.view_mode {
            ViewMode::Detail(id) => Some(id),
            ViewMode::Overview => None,
        }
    }

    /// Sessions that are neither hidden nor filtered out, in snapshot order
    pub fn filtered_sessions(&self) -> Vec<&Session> {
        let query = self.search_query.to_lowercase();
        self.sessions
            .iter()
            .filter(|s| !self.is_hidden(&s.id))
            .filter(|s| query.is_empty() || s.matches(&query))
            .collect()
    }

    /// Sessions that get a card in the current view mode
    pub fn visible_sessions(&self) -> Vec<&Session> {
        match &self.view_mode {
            ViewMode::Detail(id) => self.session(id).into_iter().collect(),
            ViewMode::Overview => self.filtered_sessions(),
        }
    }

    /// Stale session ids in snapshot order
    pub fn stale_ids(&self) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|s| self.is_stale(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn show_toast(&mut self, text: impl Into<String>) {
        self.toast = Some(Toast {
            text: text.into(),
            expires: Instant::now() + TOAST_DURATION,
        });
    }

    /// Toast text, dropping it once expired
    pub fn active_toast(&mut self) -> Option<&str> {
        if self.toast.as_ref().is_some_and(|t| Instant::now() >= t.expires) {
            self.toast = None;
        }
        self.toast.as_ref().map(|t| t.text.as_str())
    }

    pub fn record_error(&mut self, op: ErrorOp, err: &TmuxError) {
        log::warn!("{:?} failed: {}", op, err);
        self.last_error = Some(LastError {
            op,
            message: err.to_string(),
        });
    }

    /// Clear the footer error if it came from `op`
    pub fn clear_error(&mut self, op: ErrorOp) {
        if self.last_error.as_ref().is_some_and(|e| e.op == op) {
            self.last_error = None;
        }
    }

    pub fn reset_ctrl_c(&mut self) {
        self.last_ctrl_c = None;
    }

    /// Help text shown in the first footer line
    pub fn help_text(&self) -> String {
        let mouse = format!(
            "mouse: click focus, scroll, {}/{} detail, {}/{} collapse, close {}",
            MAXIMIZE_LABEL, RESTORE_LABEL, COLLAPSE_LABEL, EXPAND_LABEL, CLOSE_LABEL
        );
        let keys = "keys: / search, H show hidden, X kill stale, ctrl+x clean all, \
                    ctrl+p palette, q quit";
        format!("{} · {}", mouse, keys)
    }
}

fn lookup_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_default()
}

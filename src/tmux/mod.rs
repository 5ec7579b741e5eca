//! Thin wrapper around the tmux binary
//!
//! Every call shells out once, under the client's deadline, and parses tmux's
//! tab-separated output into typed values. A missing tmux server is reported as
//! "nothing to show" rather than as an error.

mod error;
mod exec;
mod list;
mod types;

pub use error::TmuxError;
pub use types::{session_label, Pane, Session, Snapshot, Window};

use chrono::Utc;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lines captured when the caller does not ask for a specific amount
const DEFAULT_CAPTURE_LINES: usize = 200;

/// Handle to a tmux binary
#[derive(Debug, Clone)]
pub struct Client {
    bin: PathBuf,
    timeout: Duration,
}

impl Client {
    /// Use `tmux_path` when given, otherwise search `PATH` for `tmux`
    pub fn new(tmux_path: Option<&Path>, timeout: Duration) -> Result<Self, TmuxError> {
        let bin = match tmux_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(TmuxError::MissingBinary(path.to_path_buf()));
                }
                path.to_path_buf()
            }
            None => lookup_path("tmux").ok_or(TmuxError::NotFound)?,
        };
        Ok(Self { bin, timeout })
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        exec::run(&self.bin, args, self.timeout)
    }

    /// Run an enumeration query; no server means empty output
    fn list(&self, args: &[&str]) -> Result<String, TmuxError> {
        match self.run(args) {
            Err(err) if err.is_no_server() => {
                log::debug!("tmux {}: no server running", args[0]);
                Ok(String::new())
            }
            other => other,
        }
    }

    /// Query sessions, windows and panes and join them into one tree
    pub fn snapshot(&self) -> Result<Snapshot, TmuxError> {
        let out = self.list(&["list-sessions", "-F", list::SESSION_FORMAT])?;
        let sessions = list::parse_sessions(&out)?;
        let out = self.list(&["list-windows", "-a", "-F", list::WINDOW_FORMAT])?;
        let windows = list::parse_windows(&out)?;
        let out = self.list(&["list-panes", "-a", "-F", list::PANE_FORMAT])?;
        let panes = list::parse_panes(&out)?;

        Ok(Snapshot {
            sessions: list::assemble(sessions, windows, panes),
            timestamp: Utc::now(),
        })
    }

    /// The last `lines` lines of a pane's scrollback, joined across wrapped lines
    pub fn capture_pane(&self, pane_id: &str, lines: usize) -> Result<String, TmuxError> {
        if pane_id.is_empty() {
            return Err(TmuxError::EmptyId("pane"));
        }
        let lines = if lines == 0 { DEFAULT_CAPTURE_LINES } else { lines };
        let start = format!("-{}", lines);
        self.run(&["capture-pane", "-p", "-J", "-t", pane_id, "-S", &start])
    }

    /// User-defined (`@`-prefixed) options scoped to a pane
    pub fn pane_variables(&self, pane_id: &str) -> Result<BTreeMap<String, String>, TmuxError> {
        if pane_id.is_empty() {
            return Err(TmuxError::EmptyId("pane"));
        }
        let out = self.run(&["show-options", "-p", "-t", pane_id])?;
        Ok(list::parse_variables(&out))
    }

    /// Forward key tokens (in tmux `send-keys` syntax) to a pane
    pub fn send_keys(&self, pane_id: &str, keys: &[String]) -> Result<(), TmuxError> {
        if pane_id.is_empty() {
            return Err(TmuxError::EmptyId("pane"));
        }
        if keys.is_empty() {
            return Ok(());
        }
        let mut args = vec!["send-keys", "-t", pane_id];
        args.extend(keys.iter().map(String::as_str));
        self.run(&args).map(|_| ())
    }

    pub fn kill_session(&self, session_id: &str) -> Result<(), TmuxError> {
        if session_id.is_empty() {
            return Err(TmuxError::EmptyId("session"));
        }
        self.run(&["kill-session", "-t", session_id]).map(|_| ())
    }
}

/// First executable file called `name` on `PATH`
fn lookup_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

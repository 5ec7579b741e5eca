//! Parsing of tmux's tab-separated list output into snapshot types

use super::error::TmuxError;
use super::types::{Pane, Session, Window};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

pub const SESSION_FORMAT: &str =
    "#{session_id}\t#{session_name}\t#{session_attached}\t#{session_created}\t#{session_activity}";

pub const WINDOW_FORMAT: &str = concat!(
    "#{session_id}\t#{window_id}\t#{window_index}\t#{window_name}\t",
    "#{window_active}\t#{window_last_flag}"
);

pub const PANE_FORMAT: &str = concat!(
    "#{session_id}\t#{window_id}\t#{pane_id}\t#{pane_active}\t#{pane_current_command}\t",
    "#{pane_title}\t#{pane_last_activity}\t#{pane_created}\t#{pane_width}\t#{pane_height}\t",
    "#{pane_tty}\t#{pane_dead}\t#{pane_dead_status}"
);

/// Non-blank lines split on tabs, rejecting lines with fewer than `min_fields` fields
fn records<'a>(
    out: &'a str,
    command: &'static str,
    min_fields: usize,
) -> impl Iterator<Item = Result<Vec<&'a str>, TmuxError>> + 'a {
    out.lines()
        .filter(|line| !line.trim().is_empty())
        .map(move |line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < min_fields {
                Err(TmuxError::Malformed {
                    command,
                    line: line.to_string(),
                })
            } else {
                Ok(fields)
            }
        })
}

pub fn parse_sessions(out: &str) -> Result<Vec<Session>, TmuxError> {
    records(out, "list-sessions", 5)
        .map(|fields| {
            let fields = fields?;
            Ok(Session {
                id: fields[0].to_string(),
                name: fields[1].to_string(),
                attached: fields[2] == "1",
                created_at: parse_unix("session_created", fields[3])?,
                last_activity: parse_unix("session_activity", fields[4])?,
                windows: Vec::new(),
            })
        })
        .collect()
}

pub fn parse_windows(out: &str) -> Result<Vec<Window>, TmuxError> {
    records(out, "list-windows", 6)
        .map(|fields| {
            let fields = fields?;
            Ok(Window {
                session: fields[0].to_string(),
                id: fields[1].to_string(),
                index: parse_int("window_index", fields[2])?,
                name: fields[3].to_string(),
                active: fields[4] == "1",
                last_flag: fields[5] == "1",
                last_pane: None,
                panes: Vec::new(),
            })
        })
        .collect()
}

pub fn parse_panes(out: &str) -> Result<Vec<Pane>, TmuxError> {
    records(out, "list-panes", 13)
        .map(|fields| {
            let fields = fields?;
            Ok(Pane {
                session: fields[0].to_string(),
                window: fields[1].to_string(),
                id: fields[2].to_string(),
                active: fields[3] == "1",
                current_cmd: fields[4].to_string(),
                title: fields[5].to_string(),
                last_activity: parse_unix("pane_last_activity", fields[6])?,
                created_at: parse_unix("pane_created", fields[7])?,
                width: parse_int("pane_width", fields[8])?,
                height: parse_int("pane_height", fields[9])?,
                tty: fields[10].to_string(),
                dead: fields[11] == "1",
                // tmux leaves the status empty for live panes
                dead_status: fields[12].trim().parse().unwrap_or(0),
            })
        })
        .collect()
}

/// Nest panes under their windows and windows under their sessions, preserving list order
pub fn assemble(
    mut sessions: Vec<Session>,
    windows: Vec<Window>,
    panes: Vec<Pane>,
) -> Vec<Session> {
    let mut windows = windows;
    let window_index: HashMap<String, usize> = windows
        .iter()
        .enumerate()
        .map(|(i, w)| (w.id.clone(), i))
        .collect();

    for pane in panes {
        if let Some(&i) = window_index.get(&pane.window) {
            let window = &mut windows[i];
            if pane.last_activity > window.last_pane {
                window.last_pane = pane.last_activity;
            }
            window.panes.push(pane);
        }
    }

    let session_index: HashMap<String, usize> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.clone(), i))
        .collect();

    for window in windows {
        if let Some(&i) = session_index.get(&window.session) {
            sessions[i].windows.push(window);
        }
    }

    sessions
}

/// Convert a unix epoch field; an empty field means "no timestamp"
pub fn parse_unix(field: &'static str, value: &str) -> Result<Option<DateTime<Utc>>, TmuxError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let secs: i64 = value.parse().map_err(|_| TmuxError::InvalidField {
        field,
        value: value.to_string(),
    })?;
    if secs == 0 {
        return Ok(None);
    }
    Ok(DateTime::from_timestamp(secs, 0))
}

fn parse_int<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, TmuxError> {
    value.trim().parse().map_err(|_| TmuxError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Split a `show-options` line into name and value, stripping quotes from the value
pub fn parse_option_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (name, value) = match line.split_once(' ') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (line, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim_matches(|c| c == '"' || c == '\'')))
}

/// User-defined (`@`-prefixed) options from `show-options` output
pub fn parse_variables(out: &str) -> BTreeMap<String, String> {
    out.lines()
        .filter_map(parse_option_line)
        .filter(|(name, _)| name.starts_with('@'))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
